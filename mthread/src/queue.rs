//! cola fifo de ids de hilo
//! la usan la cola ready y las colas de espera de mutex y condiciones

use std::collections::VecDeque;

use crate::thread::ThreadId;

#[derive(Debug, Default)]
pub struct ThreadQueue {
    items: VecDeque<ThreadId>,
}

impl ThreadQueue {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// agrega al final; el llamador garantiza que el id no esta en otra cola
    pub fn add(&mut self, tid: ThreadId) {
        #[cfg(feature = "strict")]
        if self.items.contains(&tid) {
            crate::error::fatal("thread enqueued twice on the same queue");
        }
        self.items.push_back(tid);
    }

    /// saca el primero, o None si esta vacia
    pub fn remove(&mut self) -> Option<ThreadId> {
        self.items.pop_front()
    }

    /// saca el elemento en la posicion dada (lo usa el scheduler aleatorio)
    #[allow(dead_code)]
    pub(crate) fn remove_at(&mut self, index: usize) -> Option<ThreadId> {
        self.items.remove(index)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, tid: ThreadId) -> bool {
        self.items.contains(&tid)
    }

    pub fn iter(&self) -> impl Iterator<Item = ThreadId> + '_ {
        self.items.iter().copied()
    }
}
