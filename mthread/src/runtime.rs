//! estado global del scheduler: un solo `Runtime` por hilo del kernel
//!
//! todo lo que antes eran variables globales sueltas (hilo actual, colas, pool,
//! tablas de mutex, condiciones y keys) vive aqui. Solo un hilo logico ejecuta a
//! la vez, asi que el acceso es exclusivo por construccion; `with_rt` lo hace
//! explicito con un `RefCell` que nunca se mantiene prestado a traves de un
//! cambio de contexto.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::cond::{Cond, CondState};
use crate::error::{fatal, Error, Result};
use crate::key::KeyTable;
use crate::mutex::MutexState;
use crate::pool::ThreadPool;
use crate::queue::ThreadQueue;
use crate::thread::{Tcb, ThreadId, ThreadState, MAIN_THREAD};

pub(crate) struct Runtime {
    pub current: ThreadId,
    pub run_queue: ThreadQueue,
    pub pool: ThreadPool,
    pub mutexes: HashMap<u64, MutexState>,
    pub conds: HashMap<u64, CondState>,
    pub keys: KeyTable,
    pub yielding_all: bool,
    next_object: u64,
}

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new());
}

// helper para acceder mut al runtime
pub(crate) fn with_rt<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|rc| {
        let mut rt = match rc.try_borrow_mut() {
            Ok(rt) => rt,
            Err(_) => fatal("scheduler state re-entered"),
        };
        f(&mut rt)
    })
}

impl Runtime {
    fn new() -> Self {
        let mut conds = HashMap::new();
        let main_exited = Cond::from_raw(1);
        conds.insert(main_exited.id(), CondState::new());

        log::debug!("[runtime] inicializado");
        Self {
            current: MAIN_THREAD,
            run_queue: ThreadQueue::new(),
            pool: ThreadPool::new(main_exited),
            mutexes: HashMap::new(),
            conds,
            keys: KeyTable::new(),
            yielding_all: false,
            next_object: 2,
        }
    }

    /// ids de mutex y condiciones; nunca se reusan
    pub fn next_object_id(&mut self) -> u64 {
        let id = self.next_object;
        self.next_object += 1;
        id
    }

    pub fn current_tcb(&self) -> &Tcb {
        self.pool.find(self.current)
    }

    pub fn current_tcb_mut(&mut self) -> &mut Tcb {
        let current = self.current;
        self.pool.find_mut(current)
    }

    /// saca un tcb de la cola de libres, creciendo el pool si hace falta
    pub fn allocate_thread(&mut self) -> Result<ThreadId> {
        self.reap_deferred();

        if self.pool.free.is_empty() {
            self.pool.increase().map_err(|err| {
                log::warn!("[runtime] no hay tcbs libres: {}", err);
                Error::Again
            })?;
        }

        let tid = match self.pool.free.remove() {
            Some(tid) => tid,
            None => fatal("free queue empty after pool growth"),
        };
        if self.pool.find(tid).state != ThreadState::Dead {
            fatal(&format!("thread {} on the free queue is not dead", tid));
        }
        self.pool.used += 1;
        Ok(tid)
    }

    /// pasa un hilo bloqueado a la cola ready; no cambia de contexto
    pub fn unsuspend(&mut self, tid: ThreadId) {
        let tcb = self.pool.find_mut(tid);
        if !tcb.state.is_blocked() {
            fatal(&format!("unsuspending thread {} in state {:?}", tid, tcb.state));
        }
        tcb.state = ThreadState::Runnable;
        self.run_queue.add(tid);
        log::trace!("[runtime] hilo {} vuelve a ready", tid);
    }

    /// transicion final a muerto. Un hilo no puede liberar la pila sobre la que
    /// esta corriendo: si es el actual queda en NeedsReset y otro lo limpia
    pub fn stop(&mut self, tid: ThreadId) {
        let tcb = self.pool.find_mut(tid);
        if tcb.state == ThreadState::Dead {
            return;
        }
        if let Some(exited) = tcb.exited.take() {
            if self.cond_destroy(exited).is_err() {
                fatal(&format!("could not destroy exit condition of thread {}", tid));
            }
        }

        if tid == MAIN_THREAD {
            // la pila de main es la del proceso, no hay nada que devolver
            self.pool.find_mut(tid).state = ThreadState::Dead;
        } else if tid == self.current {
            self.pool.find_mut(tid).state = ThreadState::NeedsReset;
            self.pool.need_reset += 1;
            log::debug!("[runtime] hilo {} se limpiara despues", tid);
        } else {
            self.pool.reset(tid);
            self.release_used(tid);
            log::debug!("[runtime] hilo {} liberado", tid);
        }
        self.check();
    }

    /// limpia los hilos que quedaron en NeedsReset, menos el actual
    pub fn reap_deferred(&mut self) {
        if self.pool.need_reset == 0 {
            return;
        }
        for tid in 0..self.pool.capacity() as ThreadId {
            if self.pool.need_reset == 0 {
                break;
            }
            if tid == self.current || self.pool.find(tid).state != ThreadState::NeedsReset {
                continue;
            }
            self.pool.reset(tid);
            self.pool.need_reset -= 1;
            self.release_used(tid);
            log::debug!("[runtime] reset diferido de hilo {}", tid);
        }
        self.check();
    }

    fn release_used(&mut self, tid: ThreadId) {
        if self.pool.used == 0 {
            fatal("used thread counter underflow");
        }
        self.pool.used -= 1;
        self.pool.free.add(tid);
    }

    /// algun hilo (main incluido) esperando un mutex o una condicion
    pub fn has_blocked_threads(&self) -> bool {
        self.pool.iter().any(|t| t.state.is_blocked())
    }

    #[cfg(feature = "strict")]
    pub fn check(&self) {
        self.verify();
    }

    #[cfg(not(feature = "strict"))]
    pub fn check(&self) {}

    /// revisa la consistencia del pool y las colas; cualquier falla es fatal
    pub fn verify(&self) {
        let capacity = self.pool.capacity();
        let live = self.pool.pooled().filter(|t| t.state != ThreadState::Dead).count();
        if live != self.pool.used {
            fatal(&format!(
                "used counter is {} but {} threads are alive",
                self.pool.used, live
            ));
        }
        if self.pool.free.len() + self.pool.used != capacity {
            fatal(&format!(
                "{} free + {} used does not match capacity {}",
                self.pool.free.len(),
                self.pool.used,
                capacity
            ));
        }
        if self.pool.count_in(ThreadState::NeedsReset) != self.pool.need_reset {
            fatal("pending reset counter out of sync");
        }

        for tcb in self.pool.iter() {
            let parked = tcb.context.is_parked();
            if tcb.id == self.current && parked {
                fatal(&format!("running thread {} has a parked context", tcb.id));
            }
            if tcb.id != self.current && tcb.state != ThreadState::Dead && !parked {
                fatal(&format!("suspended thread {} lost its context", tcb.id));
            }
        }

        let mut seen = vec![false; capacity + 1];
        let mut mark = |tid: ThreadId, what: &str| {
            let slot = (tid + 1) as usize;
            if seen[slot] {
                fatal(&format!("thread {} found twice ({})", tid, what));
            }
            seen[slot] = true;
        };
        for tid in self.pool.free.iter() {
            if self.pool.find(tid).state != ThreadState::Dead {
                fatal(&format!("free thread {} is not dead", tid));
            }
            mark(tid, "free queue");
        }
        for tid in self.run_queue.iter() {
            if self.pool.find(tid).state != ThreadState::Runnable {
                fatal(&format!("queued thread {} is not runnable", tid));
            }
            mark(tid, "run queue");
        }
        for m in self.mutexes.values() {
            for tid in m.queue.iter() {
                mark(tid, "mutex queue");
            }
        }
        for c in self.conds.values() {
            for tid in c.queue.iter() {
                mark(tid, "condition queue");
            }
        }
        mark(self.current, "current thread");
    }
}

/// revisa los invariantes internos del scheduler del hilo del kernel actual.
/// Una inconsistencia aborta el proceso
pub fn verify() {
    with_rt(|rt| rt.verify())
}
