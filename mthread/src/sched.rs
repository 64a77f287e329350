//! nucleo del scheduler: eleccion del siguiente hilo y cambio de contexto real
//!
//! regla de oro: nunca se cambia de contexto con el runtime prestado. Cada
//! cambio pasa en `Transfer::data` el id del hilo que se abandona, y el hilo que
//! retoma guarda ese contexto en el tcb correspondiente antes de hacer cualquier
//! otra cosa.

use std::panic::{self, AssertUnwindSafe};

use context::Transfer;

use crate::attr::ThreadAttr;
use crate::context_wrapper::ThreadContext;
use crate::error::fatal;
use crate::queue::ThreadQueue;
use crate::runtime::{with_rt, Runtime};
use crate::thread::{ThreadId, ThreadProc, ThreadState, Value};

/// politica de la cola ready: fifo estricto
#[cfg(not(feature = "random-schedule"))]
pub(crate) fn select_next(ready: &mut ThreadQueue) -> Option<ThreadId> {
    ready.remove()
}

/// politica de la cola ready: un hilo cualquiera; solo garantiza que eventualmente corre
#[cfg(feature = "random-schedule")]
pub(crate) fn select_next(ready: &mut ThreadQueue) -> Option<ThreadId> {
    use rand::Rng;

    if ready.is_empty() {
        return None;
    }
    let index = rand::rng().random_range(0..ready.len());
    ready.remove_at(index)
}

fn encode(tid: ThreadId) -> usize {
    tid as isize as usize
}

fn decode(data: usize) -> ThreadId {
    data as isize as ThreadId
}

/// prepara un tcb recien sacado del pool y lo deja en la cola ready
pub(crate) fn create_thread(
    rt: &mut Runtime,
    tid: ThreadId,
    attr: ThreadAttr,
    proc: ThreadProc,
    arg: Value,
) {
    let exited = match rt.cond_init() {
        Ok(cond) => cond,
        Err(err) => fatal(&format!("could not initialize exit condition: {}", err)),
    };

    let tcb = rt.pool.find_mut(tid);
    tcb.attr = attr;
    tcb.context = ThreadContext::new(&attr, trampoline);
    tcb.proc = Some(proc);
    tcb.arg = arg;
    tcb.result = Value::NULL;
    tcb.exited = Some(exited);
    tcb.cond = None;
    tcb.state = ThreadState::Runnable;

    rt.run_queue.add(tid);
    rt.check();
    log::debug!("[sched] creado hilo {} ({:?})", tid, attr.detach_state());
}

// punto de entrada de todo hilo nuevo; no recibe closure, lee todo del tcb actual
extern "C" fn trampoline(transfer: Transfer) -> ! {
    park(transfer);

    let result = {
        let (proc, arg) = with_rt(|rt| {
            let tcb = rt.current_tcb_mut();
            (tcb.proc.take(), tcb.arg)
        });
        let Some(proc) = proc else {
            fatal("thread started without a procedure");
        };
        // un panic no puede cruzar el borde extern "C" del trampolin
        match panic::catch_unwind(AssertUnwindSafe(move || proc(arg))) {
            Ok(result) => result,
            Err(_) => fatal("thread procedure panicked"),
        }
    };

    crate::api::exit(result);
    fatal("exited thread was resumed")
}

/// guarda el contexto del hilo que acabamos de dejar y limpia los pendientes
fn park(transfer: Transfer) {
    let prev = decode(transfer.data);
    with_rt(|rt| {
        rt.pool.find_mut(prev).context.park(transfer.context);
        rt.reap_deferred();
    });
}

fn switch_to(next: ThreadId) {
    let (prev, target) = with_rt(|rt| {
        let prev = rt.current;
        rt.current = next;
        match rt.pool.find_mut(next).context.take() {
            Some(target) => (prev, target),
            None => fatal(&format!("thread {} has no saved context", next)),
        }
    });

    log::trace!("[sched] cambio de contexto {} -> {}", prev, next);
    // safety: el contexto destino se guardo con park y su pila sigue viva
    let transfer = unsafe { target.resume(encode(prev)) };
    park(transfer);
}

/// cede el control al siguiente hilo ready.
/// Si no hay ninguno y el actual puede seguir, retorna sin cambiar de contexto.
/// Retorna true si hubo cambio de contexto
pub(crate) fn schedule() -> bool {
    let next = with_rt(|rt| {
        if let Some(next) = select_next(&mut rt.run_queue) {
            if next == rt.current {
                return None;
            }
            return Some(next);
        }

        let state = rt.current_tcb().state;
        if state == ThreadState::Runnable {
            return None;
        }
        if rt.has_blocked_threads() {
            fatal(&format!(
                "deadlock: thread {} is {:?} and no thread is runnable",
                rt.current, state
            ));
        }
        // no queda nadie que pueda correr ni despertar: el ultimo hilo se fue
        log::debug!("[sched] no quedan hilos, fin del proceso");
        std::process::exit(0)
    });

    match next {
        Some(next) => {
            switch_to(next);
            true
        }
        None => false,
    }
}

/// marca al hilo actual con el estado de bloqueo y cede el control.
/// Retorna cuando alguien lo vuelve a poner en la cola ready y el scheduler lo elige
pub(crate) fn suspend(state: ThreadState) {
    with_rt(|rt| {
        if state == ThreadState::Dead || state == ThreadState::Runnable {
            fatal(&format!("cannot suspend into state {:?}", state));
        }
        let tcb = rt.current_tcb_mut();
        tcb.state = state;
        log::trace!("[sched] hilo {} suspendido ({:?})", tcb.id, state);
    });
    schedule();
}

/// cede el procesador si hay otro hilo listo.
/// Retorna true si hubo cambio de contexto
pub fn yield_now() -> bool {
    let others_ready = with_rt(|rt| {
        rt.reap_deferred();
        if rt.run_queue.is_empty() {
            return false;
        }
        let current = rt.current;
        rt.run_queue.add(current);
        true
    });
    // con la cola aleatoria el scheduler puede volver a elegir al mismo hilo
    others_ready && schedule()
}

/// cede hasta que no quede ningun otro hilo listo.
/// Dos hilos haciendo yield_all a la vez nunca terminarian: eso es fatal
pub fn yield_all() {
    with_rt(|rt| {
        if rt.yielding_all {
            fatal("deadlock: two threads in yield_all");
        }
        rt.yielding_all = true;
    });
    loop {
        yield_now();
        if with_rt(|rt| rt.run_queue.is_empty()) {
            break;
        }
    }
    with_rt(|rt| rt.yielding_all = false);
}
