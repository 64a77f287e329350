//! atributos de creacion de hilos
//! se copian por valor al crear el hilo, cambiarlos despues no afecta hilos ya creados

use std::ptr::NonNull;

use crate::config::{DEFAULT_STACK_SIZE, STACK_MIN};
use crate::error::{Error, Result};

/// si el hilo se puede esperar con join o se limpia solo al terminar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetachState {
    #[default]
    Joinable,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAttr {
    detach_state: DetachState,
    stack_size: usize,
    // pila dada por el usuario; la libreria nunca la libera
    stack_addr: Option<NonNull<u8>>,
}

impl Default for ThreadAttr {
    fn default() -> Self {
        Self {
            detach_state: DetachState::Joinable,
            stack_size: DEFAULT_STACK_SIZE,
            stack_addr: None,
        }
    }
}

impl ThreadAttr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detach_state(&self) -> DetachState {
        self.detach_state
    }

    pub fn set_detach_state(&mut self, state: DetachState) {
        self.detach_state = state;
    }

    pub fn stack_size(&self) -> usize {
        self.stack_size
    }

    /// falla con `Invalid` si el tamano es menor al minimo de pila
    pub fn set_stack_size(&mut self, size: usize) -> Result<()> {
        if size < *STACK_MIN {
            return Err(Error::Invalid);
        }
        self.stack_size = size;
        Ok(())
    }

    /// la pila de usuario, si hay una: (base, tamano)
    pub fn stack(&self) -> Option<(NonNull<u8>, usize)> {
        self.stack_addr.map(|addr| (addr, self.stack_size))
    }

    /// usa memoria del llamador como pila del hilo.
    ///
    /// # Safety
    ///
    /// `addr..addr + size` debe ser memoria escribible que siga viva mientras
    /// cualquier hilo creado con estos atributos exista.
    pub unsafe fn set_stack(&mut self, addr: *mut u8, size: usize) -> Result<()> {
        let addr = NonNull::new(addr).ok_or(Error::Invalid)?;
        if size < *STACK_MIN {
            return Err(Error::Invalid);
        }
        self.stack_addr = Some(addr);
        self.stack_size = size;
        Ok(())
    }
}
