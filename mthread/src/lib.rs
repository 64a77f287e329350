//! mthread: hilos cooperativos en espacio de usuario sobre un solo hilo del kernel
//!
//! semantica estilo pthreads (create/join/detach/exit, mutex, condiciones,
//! keys) sin apropiacion: un hilo corre hasta que se bloquea, cede o termina.
//! Cada hilo del kernel que use la libreria tiene su propio scheduler.
//! expone api rust y api ffi con firmas tipo pthreads

pub mod api;
pub mod attr;
pub mod cond;
pub mod config;
mod context_wrapper;
pub mod error;
pub mod event;
pub mod ffi;
pub mod key;
pub mod mutex;
mod pool;
pub mod queue;
mod runtime;
pub mod rwlock;
pub mod sched;
pub mod sync;
pub mod thread;

pub use api::{create, current, detach, equal, exit, join, once, state_of, Once};
pub use attr::{DetachState, ThreadAttr};
pub use cond::Cond;
pub use error::{Error, Result};
pub use event::Event;
pub use key::{Key, KeyDestructor};
pub use mutex::Mutex;
pub use runtime::verify;
pub use rwlock::RwLock;
pub use sched::{yield_all, yield_now};
pub use sync::{MutexCell, MutexGuard};
pub use thread::{ThreadId, ThreadState, Value, MAIN_THREAD};
