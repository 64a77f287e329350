use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

use crate::error::Result;
use crate::mutex::Mutex;

/// Datos protegidos por un `Mutex` de la libreria.
///
/// A diferencia de usar `Mutex` a mano, el guard suelta el lock en `Drop`.
/// Si otro hilo cooperativo tiene el lock, `lock()` suspende al llamador hasta
/// que se lo entreguen.
pub struct MutexCell<T> {
    mtx: Mutex,
    data: UnsafeCell<T>,
}

impl<T> MutexCell<T> {
    /// Crea un nuevo MutexCell con el valor dado
    pub fn new(value: T) -> Result<Self> {
        Ok(Self {
            mtx: Mutex::new()?,
            data: UnsafeCell::new(value),
        })
    }

    /// Espera hasta tener el lock.
    ///
    /// Pedirlo dos veces desde el mismo hilo devuelve `Error::Deadlock`.
    pub fn lock(&self) -> Result<MutexGuard<'_, T>> {
        self.mtx.lock()?;
        Ok(MutexGuard { cell: self })
    }

    /// Intenta adquirir el lock sin bloquearse.
    ///
    /// - `Ok(guard)`: el lock fue adquirido
    /// - `Err(Error::Busy)`: otro hilo lo tiene
    pub fn try_lock(&self) -> Result<MutexGuard<'_, T>> {
        self.mtx.try_lock()?;
        Ok(MutexGuard { cell: self })
    }

    /// El mutex de abajo, para usarlo con una `Cond`
    pub fn raw(&self) -> &Mutex {
        &self.mtx
    }

    pub fn into_inner(self) -> T {
        if let Err(err) = self.mtx.destroy() {
            log::warn!("[sync] mutex de MutexCell no se pudo destruir en into_inner: {}", err);
        }
        let this = std::mem::ManuallyDrop::new(self);
        // SAFETY: `this` no se vuelve a usar ni se dropea
        unsafe { std::ptr::read(this.data.get()) }
    }
}

impl<T> Drop for MutexCell<T> {
    fn drop(&mut self) {
        // Destruir el mutex cuando se destruye el cell
        if let Err(err) = self.mtx.destroy() {
            log::warn!("[sync] mutex de MutexCell no se pudo destruir: {}", err);
        }
    }
}

/// Guard que proporciona acceso a los datos protegidos; suelta el lock al salir de scope.
pub struct MutexGuard<'a, T> {
    cell: &'a MutexCell<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: El guard solo existe cuando tenemos el lock
        unsafe { &*self.cell.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: El guard solo existe cuando tenemos el lock
        unsafe { &mut *self.cell.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(err) = self.cell.mtx.unlock() {
            log::warn!("[sync] unlock en drop fallo: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_basic_creation() {
        let cell = MutexCell::new(42).unwrap();

        {
            let mut guard = cell.lock().unwrap();
            assert_eq!(*guard, 42);
            *guard = 100;
        }

        assert_eq!(*cell.try_lock().unwrap(), 100);
        assert_eq!(cell.into_inner(), 100);
    }

    #[test]
    fn test_into_inner_with_paired_waiter_keeps_the_mutex() {
        use crate::cond::Cond;
        use crate::thread::Value;

        let cell = MutexCell::new(7).unwrap();
        let raw = *cell.raw();
        let cond = Cond::new().unwrap();
        let waiter = crate::api::create(
            None,
            move |_| {
                raw.lock().unwrap();
                cond.wait(&raw).unwrap();
                raw.unlock().unwrap();
                Value::NULL
            },
            Value::NULL,
        )
        .unwrap();
        crate::sched::yield_all();

        // el mutex sigue emparejado con la condicion: no se puede destruir
        assert_eq!(cell.into_inner(), 7);
        assert_eq!(raw.owner(), Ok(None));

        cond.signal().unwrap();
        crate::api::join(waiter).unwrap();
        raw.destroy().unwrap();
        cond.destroy().unwrap();
    }

    #[test]
    fn test_relock_is_deadlock() {
        let cell = MutexCell::new(vec![1, 2, 3]).unwrap();

        let guard = cell.lock().unwrap();
        assert_eq!(guard.len(), 3);
        assert_eq!(cell.lock().err(), Some(Error::Deadlock));
        assert_eq!(cell.try_lock().err(), Some(Error::Deadlock));
        drop(guard);

        assert!(cell.try_lock().is_ok());
    }
}
