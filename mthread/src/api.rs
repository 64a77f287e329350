//! api publica de hilos: create, join, detach, exit, self, equal, once

use std::cell::Cell;

use crate::attr::{DetachState, ThreadAttr};
use crate::error::{fatal, Error, Result};
use crate::key;
use crate::mutex::Mutex;
use crate::runtime::with_rt;
use crate::sched;
use crate::thread::{ThreadId, ThreadState, Value};

/// crea un hilo que corre `proc(arg)`. Los atributos se copian: cambiarlos
/// despues no afecta al hilo. `Again` si el pool no puede crecer
pub fn create<F>(attr: Option<&ThreadAttr>, proc: F, arg: Value) -> Result<ThreadId>
where
    F: FnOnce(Value) -> Value + 'static,
{
    let attr = attr.copied().unwrap_or_default();
    with_rt(|rt| {
        let tid = rt.allocate_thread()?;
        sched::create_thread(rt, tid, attr, Box::new(proc), arg);
        Ok(tid)
    })
}

/// termina el hilo actual con `value` como resultado.
/// Corre los destructores de keys, despierta a quien espere en join y nunca
/// vuelve. Si el hilo ya estaba saliendo no hace nada
pub fn exit(value: Value) {
    let exiting = with_rt(|rt| rt.current_tcb().state == ThreadState::Exiting);
    if exiting {
        return;
    }

    key::cleanup_values();

    let exited = with_rt(|rt| {
        let current = rt.current;
        let tcb = rt.current_tcb_mut();
        tcb.result = value;
        tcb.state = ThreadState::Exiting;
        log::debug!("[api] hilo {} termina", current);

        if tcb.attr.detach_state() == DetachState::Detached {
            rt.stop(current);
            None
        } else {
            tcb.exited
        }
    });

    // hilo joinable: avisar a quien este esperando, el limpia despues
    if let Some(exited) = exited {
        if let Err(err) = exited.signal() {
            fatal(&format!("could not signal thread exit: {}", err));
        }
    }

    sched::schedule();
}

/// espera a que `target` termine, devuelve su resultado y libera su tcb
pub fn join(target: ThreadId) -> Result<Value> {
    let exited = with_rt(|rt| {
        if !rt.pool.is_ok_id(target) {
            return Err(Error::NoSuchThread);
        }
        if target == rt.current {
            return Err(Error::Deadlock);
        }
        let tcb = rt.pool.find(target);
        if tcb.state == ThreadState::Dead {
            return Err(Error::NoSuchThread);
        }
        if tcb.attr.detach_state() == DetachState::Detached {
            return Err(Error::Invalid);
        }
        match tcb.exited {
            Some(exited) => Ok(exited),
            None => fatal(&format!("joinable thread {} has no exit condition", target)),
        }
    })?;

    let exiting = || with_rt(|rt| rt.pool.find(target).state == ThreadState::Exiting);
    if !exiting() {
        // mutex privado solo para la disciplina de la condicion
        let guard = match Mutex::new() {
            Ok(m) => m,
            Err(err) => fatal(&format!("could not initialize join mutex: {}", err)),
        };
        if let Err(err) = guard.lock() {
            fatal(&format!("could not lock join mutex: {}", err));
        }
        while !exiting() {
            if let Err(err) = exited.wait(&guard) {
                fatal(&format!("could not wait for thread exit: {}", err));
            }
        }
        if guard.unlock().and_then(|_| guard.destroy()).is_err() {
            fatal("could not release join mutex");
        }
    }

    Ok(with_rt(|rt| {
        let value = rt.pool.find(target).result;
        rt.stop(target);
        log::debug!("[api] join de hilo {} por {}", target, rt.current);
        value
    }))
}

/// marca el hilo como detached. Si ya termino y nadie lo va a esperar, se libera ahora
pub fn detach(target: ThreadId) -> Result<()> {
    with_rt(|rt| {
        if !rt.pool.is_ok_id(target) {
            return Err(Error::NoSuchThread);
        }
        let tcb = rt.pool.find_mut(target);
        if tcb.state == ThreadState::Dead {
            return Err(Error::NoSuchThread);
        }
        if tcb.attr.detach_state() == DetachState::Detached {
            return Ok(());
        }

        tcb.attr.set_detach_state(DetachState::Detached);
        if tcb.state == ThreadState::Exiting {
            rt.stop(target);
        }
        Ok(())
    })
}

/// id del hilo que esta corriendo
pub fn current() -> ThreadId {
    with_rt(|rt| rt.current)
}

pub fn equal(a: ThreadId, b: ThreadId) -> bool {
    a == b
}

/// estado actual de un hilo, para diagnostico
pub fn state_of(tid: ThreadId) -> Result<ThreadState> {
    with_rt(|rt| {
        if !rt.pool.is_ok_id(tid) {
            return Err(Error::NoSuchThread);
        }
        Ok(rt.pool.find(tid).state)
    })
}

/// bandera de una sola ejecucion. No hay atomicos: solo es correcta porque un
/// hilo nunca es interrumpido entre la lectura y la escritura de la bandera
#[derive(Debug, Default)]
pub struct Once {
    done: Cell<bool>,
}

impl Once {
    pub const fn new() -> Self {
        Self {
            done: Cell::new(false),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.done.get()
    }

    pub fn call_once(&self, proc: impl FnOnce()) {
        if !self.done.get() {
            self.done.set(true);
            proc();
        }
    }
}

/// corre `proc` solo la primera vez que se ve `flag`
pub fn once(flag: &Once, proc: impl FnOnce()) {
    flag.call_once(proc)
}
