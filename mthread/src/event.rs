//! eventos: un mutex y una condicion juntos.
//! `fire` sin nadie esperando se pierde, no queda guardado

use crate::cond::Cond;
use crate::error::Result;
use crate::mutex::Mutex;

#[derive(Debug)]
pub struct Event {
    mutex: Mutex,
    cond: Cond,
}

impl Event {
    pub fn new() -> Result<Event> {
        let mutex = Mutex::new()?;
        let cond = match Cond::new() {
            Ok(cond) => cond,
            Err(err) => {
                let _ = mutex.destroy();
                return Err(err);
            }
        };
        Ok(Event { mutex, cond })
    }

    /// `Busy` si hay hilos esperando
    pub fn destroy(&self) -> Result<()> {
        self.cond.destroy()?;
        self.mutex.destroy()
    }

    /// bloquea hasta el proximo fire
    pub fn wait(&self) -> Result<()> {
        self.mutex.lock()?;
        let waited = self.cond.wait(&self.mutex);
        self.mutex.unlock()?;
        waited
    }

    /// despierta al que lleva mas tiempo esperando
    pub fn fire(&self) -> Result<()> {
        self.mutex.lock()?;
        let fired = self.cond.signal();
        self.mutex.unlock()?;
        fired
    }

    /// despierta a todos los que esperan
    pub fn fire_all(&self) -> Result<()> {
        self.mutex.lock()?;
        let fired = self.cond.broadcast();
        self.mutex.unlock()?;
        fired
    }
}
