//! mutex cooperativo: un dueno y una cola fifo de espera
//! la propiedad se entrega en unlock, el que despierta ya es dueno

use std::marker::PhantomData;

use crate::error::{Error, Result};
use crate::queue::ThreadQueue;
use crate::runtime::{with_rt, Runtime};
use crate::sched;
use crate::thread::{ThreadId, ThreadState};

/// handle de un mutex; valido solo en el hilo del kernel que lo creo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Mutex {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

pub(crate) struct MutexState {
    pub owner: Option<ThreadId>,
    pub queue: ThreadQueue,
}

impl Runtime {
    pub(crate) fn mutex_init(&mut self) -> Result<Mutex> {
        self.mutexes.try_reserve(1)?;
        let mutex = Mutex::from_raw(self.next_object_id());
        self.mutexes.insert(
            mutex.id,
            MutexState {
                owner: None,
                queue: ThreadQueue::new(),
            },
        );
        Ok(mutex)
    }

    /// toma el mutex si esta libre; Ok(true) si el llamador quedo encolado y debe suspenderse
    pub(crate) fn mutex_acquire(&mut self, mutex: Mutex) -> Result<bool> {
        let current = self.current;
        let m = self.mutexes.get_mut(&mutex.id).ok_or(Error::Invalid)?;
        match m.owner {
            None => {
                m.owner = Some(current);
                Ok(false)
            }
            Some(owner) if owner == current => Err(Error::Deadlock),
            Some(_) => {
                m.queue.add(current);
                Ok(true)
            }
        }
    }

    pub(crate) fn mutex_try_acquire(&mut self, mutex: Mutex) -> Result<()> {
        let current = self.current;
        let m = self.mutexes.get_mut(&mutex.id).ok_or(Error::Invalid)?;
        match m.owner {
            None => {
                m.owner = Some(current);
                Ok(())
            }
            Some(owner) if owner == current => Err(Error::Deadlock),
            Some(_) => Err(Error::Busy),
        }
    }

    /// suelta el mutex y se lo pasa directo al primero en la cola
    pub(crate) fn mutex_release(&mut self, mutex: Mutex) -> Result<()> {
        let current = self.current;
        let m = self.mutexes.get_mut(&mutex.id).ok_or(Error::Invalid)?;
        if m.owner != Some(current) {
            return Err(Error::NotPermitted);
        }

        let next = m.queue.remove();
        m.owner = next;
        if let Some(next) = next {
            log::trace!("[mutex] {} pasa de {} a {}", mutex.id, current, next);
            self.unsuspend(next);
        }
        Ok(())
    }

    pub(crate) fn mutex_destroy(&mut self, mutex: Mutex) -> Result<()> {
        let m = self.mutexes.get(&mutex.id).ok_or(Error::Invalid)?;
        if m.owner.is_some() {
            return Err(Error::Busy);
        }

        // ningun hilo puede estar esperando una condicion emparejada con este mutex
        let paired = self.pool.iter().any(|tcb| {
            tcb.cond
                .and_then(|c| self.conds.get(&c.id()))
                .is_some_and(|c| c.mutex == Some(mutex))
        });
        if paired {
            return Err(Error::Busy);
        }

        self.mutexes.remove(&mutex.id);
        Ok(())
    }
}

impl Mutex {
    pub(crate) fn from_raw(id: u64) -> Self {
        Self {
            id,
            _not_send: PhantomData,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// crea un mutex libre y sin hilos esperando
    pub fn new() -> Result<Mutex> {
        with_rt(|rt| rt.mutex_init())
    }

    /// bloquea hasta ser dueno. Pedirlo de nuevo siendo dueno es `Deadlock`
    pub fn lock(&self) -> Result<()> {
        let must_wait = with_rt(|rt| rt.mutex_acquire(*self))?;
        if must_wait {
            sched::suspend(ThreadState::BlockedOnMutex);
            // quien hizo unlock ya nos dejo como duenos
            debug_assert!(with_rt(|rt| rt
                .mutexes
                .get(&self.id)
                .is_some_and(|m| m.owner == Some(rt.current))));
        }
        Ok(())
    }

    /// como lock pero nunca espera: `Busy` si otro hilo es dueno
    pub fn try_lock(&self) -> Result<()> {
        with_rt(|rt| rt.mutex_try_acquire(*self))
    }

    /// `NotPermitted` si el llamador no es el dueno
    pub fn unlock(&self) -> Result<()> {
        with_rt(|rt| rt.mutex_release(*self))
    }

    /// falla con `Busy` si tiene dueno o si hay hilos esperando una condicion con el
    pub fn destroy(&self) -> Result<()> {
        with_rt(|rt| rt.mutex_destroy(*self))
    }

    /// dueno actual, `Err(Invalid)` si el mutex no existe
    pub fn owner(&self) -> Result<Option<ThreadId>> {
        with_rt(|rt| {
            rt.mutexes
                .get(&self.id)
                .map(|m| m.owner)
                .ok_or(Error::Invalid)
        })
    }
}
