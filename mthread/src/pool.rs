//! pool de tcbs: arreglo creciente de hilos mas la cola de libres

use crate::config::{INITIAL_POOL_SIZE, MAX_POOL_SIZE};
use crate::cond::Cond;
use crate::error::{fatal, Error, Result};
use crate::queue::ThreadQueue;
use crate::thread::{Tcb, ThreadId, ThreadState, MAIN_THREAD};

pub(crate) struct ThreadPool {
    tcbs: Vec<Tcb>,
    main: Tcb,
    /// ids libres, listos para create
    pub free: ThreadQueue,
    /// tcbs fuera de la cola de libres
    pub used: usize,
    /// hilos que terminaron sobre su propia pila y esperan que otro los limpie
    pub need_reset: usize,
}

impl ThreadPool {
    pub fn new(main_exited: Cond) -> Self {
        Self {
            tcbs: Vec::new(),
            main: Tcb::main(main_exited),
            free: ThreadQueue::new(),
            used: 0,
            need_reset: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.tcbs.len()
    }

    /// duplica la capacidad (o arranca en el tamano inicial) y encola los ids nuevos.
    /// es todo o nada: si falla el pool queda como estaba
    pub fn increase(&mut self) -> Result<()> {
        let old = self.tcbs.len();
        let new = if old == 0 { INITIAL_POOL_SIZE } else { old * 2 };
        if new > MAX_POOL_SIZE {
            log::warn!("[pool] no se puede crecer de {} a {} (max {})", old, new, MAX_POOL_SIZE);
            return Err(Error::Again);
        }

        self.tcbs.try_reserve_exact(new - old)?;
        for tid in old..new {
            self.tcbs.push(Tcb::virgin(tid as ThreadId));
        }
        for tid in old..new {
            self.free.add(tid as ThreadId);
        }

        log::debug!("[pool] crecio de {} a {} tcbs", old, new);
        Ok(())
    }

    /// id sintacticamente valido: main o un indice dentro del pool
    pub fn is_ok_id(&self, tid: ThreadId) -> bool {
        tid == MAIN_THREAD || (tid >= 0 && (tid as usize) < self.tcbs.len())
    }

    pub fn find(&self, tid: ThreadId) -> &Tcb {
        if tid == MAIN_THREAD {
            return &self.main;
        }
        if !self.is_ok_id(tid) {
            fatal(&format!("lookup of invalid thread id {}", tid));
        }
        &self.tcbs[tid as usize]
    }

    pub fn find_mut(&mut self, tid: ThreadId) -> &mut Tcb {
        if tid == MAIN_THREAD {
            return &mut self.main;
        }
        if !self.is_ok_id(tid) {
            fatal(&format!("lookup of invalid thread id {}", tid));
        }
        &mut self.tcbs[tid as usize]
    }

    /// deja el tcb virgen; libera la pila solo si la reservo la libreria
    pub fn reset(&mut self, tid: ThreadId) {
        let tcb = self.find_mut(tid);
        log::trace!(
            "[pool] reset de hilo {} (pila propia: {})",
            tid,
            tcb.context.owns_stack()
        );
        tcb.reset();
    }

    /// main primero, despues el pool en orden de id
    pub fn iter(&self) -> impl Iterator<Item = &Tcb> + '_ {
        std::iter::once(&self.main).chain(self.tcbs.iter())
    }

    /// solo los tcbs del pool, sin main
    pub fn pooled(&self) -> impl Iterator<Item = &Tcb> + '_ {
        self.tcbs.iter()
    }

    pub fn count_in(&self, state: ThreadState) -> usize {
        self.tcbs.iter().filter(|t| t.state == state).count()
    }
}
