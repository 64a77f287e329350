//! almacenamiento por hilo (keys)
//!
//! cada key guarda un valor aparte para main y un vector indexado por id de
//! hilo que crece solo al escribir. Leer mas alla del vector da `Value::NULL`.
//! Borrar una key libera sus valores sin llamar al destructor.

use std::rc::Rc;

use crate::config::KEYS_MAX;
use crate::error::{Error, Result};
use crate::runtime::with_rt;
use crate::thread::{ThreadId, Value, MAIN_THREAD};

/// destructor que corre al salir un hilo con valor no nulo en la key
pub type KeyDestructor = Rc<dyn Fn(Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key(usize);

#[derive(Default)]
struct KeySlot {
    in_use: bool,
    destructor: Option<KeyDestructor>,
    values: Vec<Value>,
    main_value: Value,
}

pub(crate) struct KeyTable {
    slots: Vec<KeySlot>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self {
            slots: (0..KEYS_MAX).map(|_| KeySlot::default()).collect(),
        }
    }

    pub fn create(&mut self, destructor: Option<KeyDestructor>) -> Result<Key> {
        let index = self
            .slots
            .iter()
            .position(|slot| !slot.in_use)
            .ok_or(Error::Again)?;
        self.slots[index] = KeySlot {
            in_use: true,
            destructor,
            values: Vec::new(),
            main_value: Value::NULL,
        };
        Ok(Key(index))
    }

    pub fn delete(&mut self, key: Key) -> Result<()> {
        let slot = self.slot_mut(key)?;
        *slot = KeySlot::default();
        Ok(())
    }

    pub fn get(&self, key: Key, tid: ThreadId) -> Value {
        let Some(slot) = self.slots.get(key.0).filter(|slot| slot.in_use) else {
            return Value::NULL;
        };
        if tid == MAIN_THREAD {
            return slot.main_value;
        }
        slot.values.get(tid as usize).copied().unwrap_or(Value::NULL)
    }

    /// escribe el valor del hilo; el vector crece hasta `capacity` (o mas si el id lo exige)
    pub fn set(&mut self, key: Key, tid: ThreadId, value: Value, capacity: usize) -> Result<()> {
        let slot = self.slot_mut(key)?;
        if tid == MAIN_THREAD {
            slot.main_value = value;
            return Ok(());
        }

        let index = tid as usize;
        if index >= slot.values.len() {
            let len = capacity.max(index + 1);
            slot.values.try_reserve_exact(len - slot.values.len())?;
            slot.values.resize(len, Value::NULL);
        }
        slot.values[index] = value;
        Ok(())
    }

    /// siguiente valor a destruir para `tid` desde la key `from`.
    /// El slot queda en NULL antes de devolver el destructor
    fn take_pending(&mut self, tid: ThreadId, from: usize) -> Option<(usize, KeyDestructor, Value)> {
        for (index, slot) in self.slots.iter_mut().enumerate().skip(from) {
            if !slot.in_use {
                continue;
            }
            let Some(destructor) = slot.destructor.clone() else {
                continue;
            };
            let cell = if tid == MAIN_THREAD {
                &mut slot.main_value
            } else {
                match slot.values.get_mut(tid as usize) {
                    Some(cell) => cell,
                    None => continue,
                }
            };
            if cell.is_null() {
                continue;
            }
            let value = std::mem::replace(cell, Value::NULL);
            return Some((index, destructor, value));
        }
        None
    }

    fn slot_mut(&mut self, key: Key) -> Result<&mut KeySlot> {
        self.slots
            .get_mut(key.0)
            .filter(|slot| slot.in_use)
            .ok_or(Error::Invalid)
    }
}

impl Key {
    /// `Again` si la tabla esta llena
    pub fn create(destructor: Option<KeyDestructor>) -> Result<Key> {
        with_rt(|rt| rt.keys.create(destructor))
    }

    /// libera los valores de todos los hilos sin llamar al destructor
    pub fn delete(self) -> Result<()> {
        with_rt(|rt| rt.keys.delete(self))
    }

    /// valor del hilo actual; NULL si nunca se escribio o la key no existe
    pub fn get(self) -> Value {
        with_rt(|rt| rt.keys.get(self, rt.current))
    }

    pub fn set(self, value: Value) -> Result<()> {
        with_rt(|rt| {
            let capacity = rt.pool.capacity();
            rt.keys.set(self, rt.current, value, capacity)
        })
    }

    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn from_index(index: usize) -> Key {
        Key(index)
    }
}

/// corre los destructores del hilo actual. Un destructor puede volver a escribir
/// keys ya visitadas, asi que se repite desde el principio hasta una pasada limpia.
/// Un destructor que siempre se re-escribe a si mismo nunca termina
pub(crate) fn cleanup_values() {
    loop {
        let mut found = false;
        let mut from = 0;
        while let Some((index, destructor, value)) =
            with_rt(|rt| rt.keys.take_pending(rt.current, from))
        {
            found = true;
            from = index + 1;
            destructor(value);
        }
        if !found {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn reads_past_the_end_do_not_grow() {
        let mut table = KeyTable::new();
        let key = table.create(None).unwrap();
        assert_eq!(table.get(key, 7), Value::NULL);
        assert!(table.slots[key.0].values.is_empty());

        table.set(key, 2, Value::new(5), 4).unwrap();
        assert_eq!(table.slots[key.0].values.len(), 4);
        assert_eq!(table.get(key, 2), Value::new(5));
        assert_eq!(table.get(key, 3), Value::NULL);

        table.set(key, 9, Value::new(6), 4).unwrap();
        assert_eq!(table.slots[key.0].values.len(), 10);
    }

    #[test]
    fn main_has_its_own_slot() {
        let mut table = KeyTable::new();
        let key = table.create(None).unwrap();
        table.set(key, MAIN_THREAD, Value::new(1), 4).unwrap();
        table.set(key, 0, Value::new(2), 4).unwrap();
        assert_eq!(table.get(key, MAIN_THREAD), Value::new(1));
        assert_eq!(table.get(key, 0), Value::new(2));
    }

    #[test]
    fn table_runs_out_of_slots() {
        let mut table = KeyTable::new();
        for _ in 0..KEYS_MAX {
            table.create(None).unwrap();
        }
        assert_eq!(table.create(None).err(), Some(Error::Again));

        table.delete(Key(3)).unwrap();
        assert_eq!(table.create(None), Ok(Key(3)));
    }

    #[test]
    fn deleted_keys_reject_writes() {
        let mut table = KeyTable::new();
        let key = table.create(None).unwrap();
        table.set(key, 0, Value::new(1), 4).unwrap();
        table.delete(key).unwrap();
        assert_eq!(table.set(key, 0, Value::new(1), 4), Err(Error::Invalid));
        assert_eq!(table.delete(key), Err(Error::Invalid));
        assert_eq!(table.get(key, 0), Value::NULL);
    }

    #[test]
    fn pending_values_are_cleared_before_handing_out() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let destructor: KeyDestructor = Rc::new(move |v| log.borrow_mut().push(v));

        let mut table = KeyTable::new();
        let plain = table.create(None).unwrap();
        let with_dtor = table.create(Some(destructor)).unwrap();
        table.set(plain, 1, Value::new(10), 4).unwrap();
        table.set(with_dtor, 1, Value::new(20), 4).unwrap();

        let (index, dtor, value) = table.take_pending(1, 0).unwrap();
        assert_eq!(index, with_dtor.index());
        assert_eq!(value, Value::new(20));
        assert_eq!(table.get(with_dtor, 1), Value::NULL);
        dtor(value);

        assert!(table.take_pending(1, 0).is_none());
        // sin destructor el valor se queda
        assert_eq!(table.get(plain, 1), Value::new(10));
        assert_eq!(*seen.borrow(), vec![Value::new(20)]);
    }
}
