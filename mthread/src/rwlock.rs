//! lock de lectores/escritor sobre un mutex y un evento
//!
//! el escritor se queda con el mutex `queue` mientras escribe, asi que los
//! lectores nuevos se encolan ahi. Si quedan lectores adentro, el escritor
//! espera el evento `drain` que dispara el ultimo lector al salir.

use std::cell::Cell;

use crate::error::{Error, Result};
use crate::event::Event;
use crate::mutex::Mutex;
use crate::runtime::with_rt;
use crate::thread::ThreadId;

#[derive(Debug)]
pub struct RwLock {
    queue: Mutex,
    drain: Event,
    readers: Cell<u32>,
    writer: Cell<Option<ThreadId>>,
}

impl RwLock {
    pub fn new() -> Result<RwLock> {
        let queue = Mutex::new()?;
        let drain = match Event::new() {
            Ok(event) => event,
            Err(err) => {
                let _ = queue.destroy();
                return Err(err);
            }
        };
        Ok(RwLock {
            queue,
            drain,
            readers: Cell::new(0),
            writer: Cell::new(None),
        })
    }

    /// `Busy` si hay lectores o un escritor adentro
    pub fn destroy(&self) -> Result<()> {
        if self.readers.get() > 0 || self.writer.get().is_some() {
            return Err(Error::Busy);
        }
        self.drain.destroy()?;
        self.queue.destroy()
    }

    /// entra como lector; espera solo si hay un escritor
    pub fn read_lock(&self) -> Result<()> {
        self.queue.lock()?;
        self.readers.set(self.readers.get() + 1);
        self.queue.unlock()
    }

    /// entra como escritor y espera a que salgan los lectores.
    /// `Deadlock` si el llamador ya es el escritor
    pub fn write_lock(&self) -> Result<()> {
        self.queue.lock()?;
        self.writer.set(Some(current()));
        while self.readers.get() > 0 {
            if let Err(err) = self.drain.wait() {
                // no quedarse como escritor si no se llego a entrar
                self.writer.set(None);
                self.queue.unlock()?;
                return Err(err);
            }
        }
        Ok(())
    }

    /// sale, como escritor o como lector segun quien llame
    pub fn unlock(&self) -> Result<()> {
        if self.writer.get() == Some(current()) {
            self.writer.set(None);
            return self.queue.unlock();
        }

        let readers = self.readers.get();
        if readers == 0 {
            return Err(Error::NotPermitted);
        }
        self.readers.set(readers - 1);
        if readers == 1 && self.writer.get().is_some() {
            self.drain.fire()?;
        }
        Ok(())
    }

    pub fn readers(&self) -> u32 {
        self.readers.get()
    }

    pub fn writer(&self) -> Option<ThreadId> {
        self.writer.get()
    }
}

fn current() -> ThreadId {
    with_rt(|rt| rt.current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_writer_wait_leaves_the_lock_free() {
        let rw = RwLock::new().unwrap();
        // un lector adentro y el evento ya destruido: la espera del escritor falla
        rw.readers.set(1);
        rw.drain.destroy().unwrap();

        assert_eq!(rw.write_lock(), Err(Error::Invalid));
        assert_eq!(rw.writer(), None);
        rw.queue.try_lock().unwrap();
        rw.queue.unlock().unwrap();

        rw.readers.set(0);
        rw.queue.destroy().unwrap();
    }
}
