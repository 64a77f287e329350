//! variables de condicion: cola fifo de espera y el mutex con el que se espera

use std::marker::PhantomData;

use crate::error::{fatal, Error, Result};
use crate::mutex::Mutex;
use crate::queue::ThreadQueue;
use crate::runtime::{with_rt, Runtime};
use crate::sched;
use crate::thread::ThreadState;

/// handle de una condicion; valido solo en el hilo del kernel que la creo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Cond {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

pub(crate) struct CondState {
    // mutex usado por los hilos que esperan ahora
    pub mutex: Option<Mutex>,
    pub queue: ThreadQueue,
}

impl CondState {
    pub fn new() -> Self {
        Self {
            mutex: None,
            queue: ThreadQueue::new(),
        }
    }
}

impl Runtime {
    pub(crate) fn cond_init(&mut self) -> Result<Cond> {
        self.conds.try_reserve(1)?;
        let cond = Cond::from_raw(self.next_object_id());
        self.conds.insert(cond.id, CondState::new());
        Ok(cond)
    }

    pub(crate) fn cond_destroy(&mut self, cond: Cond) -> Result<()> {
        let c = self.conds.get(&cond.id).ok_or(Error::Invalid)?;
        if !c.queue.is_empty() {
            return Err(Error::Busy);
        }
        self.conds.remove(&cond.id);
        Ok(())
    }

    /// encola al hilo actual y suelta el mutex en un solo paso
    pub(crate) fn cond_enqueue(&mut self, cond: Cond, mutex: Mutex) -> Result<()> {
        let current = self.current;
        if !self.conds.contains_key(&cond.id) {
            return Err(Error::Invalid);
        }
        let owner = self.mutexes.get(&mutex.id()).ok_or(Error::Invalid)?.owner;
        if owner != Some(current) {
            return Err(Error::NotPermitted);
        }

        if let Some(c) = self.conds.get_mut(&cond.id) {
            c.mutex = Some(mutex);
            c.queue.add(current);
        }
        self.current_tcb_mut().cond = Some(cond);
        self.mutex_release(mutex)
    }

    pub(crate) fn cond_signal(&mut self, cond: Cond) -> Result<()> {
        let c = self.conds.get_mut(&cond.id).ok_or(Error::Invalid)?;
        if let Some(tid) = c.queue.remove() {
            self.unsuspend(tid);
        }
        Ok(())
    }

    pub(crate) fn cond_broadcast(&mut self, cond: Cond) -> Result<()> {
        let c = self.conds.get_mut(&cond.id).ok_or(Error::Invalid)?;
        let waiters: Vec<_> = std::iter::from_fn(|| c.queue.remove()).collect();
        for tid in waiters {
            self.unsuspend(tid);
        }
        Ok(())
    }

    /// el hilo actual ya desperto: deja de contar como emparejado al mutex
    fn cond_leave(&mut self, cond: Cond) {
        self.current_tcb_mut().cond = None;
        if let Some(c) = self.conds.get_mut(&cond.id) {
            if c.queue.is_empty() {
                c.mutex = None;
            }
        }
    }
}

impl Cond {
    pub(crate) fn from_raw(id: u64) -> Self {
        Self {
            id,
            _not_send: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn new() -> Result<Cond> {
        with_rt(|rt| rt.cond_init())
    }

    /// `Busy` si hay hilos esperando
    pub fn destroy(&self) -> Result<()> {
        with_rt(|rt| rt.cond_destroy(*self))
    }

    /// suelta `mutex`, espera un signal o broadcast y lo vuelve a tomar.
    /// El llamador debe ser dueno del mutex (`NotPermitted` si no)
    pub fn wait(&self, mutex: &Mutex) -> Result<()> {
        with_rt(|rt| rt.cond_enqueue(*self, *mutex))?;
        sched::suspend(ThreadState::BlockedOnCondition);
        with_rt(|rt| rt.cond_leave(*self));

        if let Err(err) = mutex.lock() {
            fatal(&format!("could not reacquire mutex after condition wait: {}", err));
        }
        Ok(())
    }

    /// despierta al hilo que lleva mas tiempo esperando, si hay alguno
    pub fn signal(&self) -> Result<()> {
        with_rt(|rt| rt.cond_signal(*self))
    }

    /// despierta a todos los que esperan
    pub fn broadcast(&self) -> Result<()> {
        with_rt(|rt| rt.cond_broadcast(*self))
    }
}
