//! tipos basicos y el bloque de control de hilo (tcb)

use std::ffi::c_void;

use crate::attr::ThreadAttr;
use crate::cond::Cond;
use crate::context_wrapper::ThreadContext;

/// identificador de hilo: indice en el pool, o `MAIN_THREAD`
pub type ThreadId = i32;

/// id reservado para el hilo inicial del proceso, que no vive en el pool
pub const MAIN_THREAD: ThreadId = -1;

// estados del hilo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Runnable,
    Dead,
    Exiting,
    BlockedOnMutex,
    BlockedOnCondition,
    NeedsReset,
}

impl ThreadState {
    pub fn is_blocked(self) -> bool {
        matches!(self, ThreadState::BlockedOnMutex | ThreadState::BlockedOnCondition)
    }
}

/// valor opaco del tamano de un puntero: argumento, resultado y valores de keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Value(usize);

impl Value {
    pub const NULL: Value = Value(0);

    pub const fn new(raw: usize) -> Self {
        Value(raw)
    }

    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        Value(ptr as usize)
    }

    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<usize> for Value {
    fn from(raw: usize) -> Self {
        Value(raw)
    }
}

impl From<*mut c_void> for Value {
    fn from(ptr: *mut c_void) -> Self {
        Value::from_ptr(ptr)
    }
}

// el procedimiento que corre el hilo; el trampolin lo saca del tcb
pub(crate) type ThreadProc = Box<dyn FnOnce(Value) -> Value + 'static>;

pub(crate) struct Tcb {
    pub id: ThreadId,
    pub state: ThreadState,
    pub attr: ThreadAttr,
    pub context: ThreadContext,
    pub proc: Option<ThreadProc>,
    pub arg: Value,
    pub result: Value,
    // condicion privada que senala la salida del hilo a quien hace join
    pub exited: Option<Cond>,
    // condicion en la que esta esperando ahora mismo, si hay una
    pub cond: Option<Cond>,
}

impl Tcb {
    /// tcb recien salido del pool, sin pila ni procedimiento
    pub fn virgin(id: ThreadId) -> Self {
        Self {
            id,
            state: ThreadState::Dead,
            attr: ThreadAttr::default(),
            context: ThreadContext::empty(),
            proc: None,
            arg: Value::NULL,
            result: Value::NULL,
            exited: None,
            cond: None,
        }
    }

    /// el hilo inicial ya esta corriendo sobre la pila del proceso
    pub fn main(exited: Cond) -> Self {
        Self {
            state: ThreadState::Runnable,
            exited: Some(exited),
            ..Self::virgin(MAIN_THREAD)
        }
    }

    /// vuelve al estado virgen; si la pila era de la libreria se libera aqui
    pub fn reset(&mut self) {
        *self = Self::virgin(self.id);
    }
}

impl std::fmt::Debug for Tcb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tcb")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("attr", &self.attr)
            .field("context", &self.context)
            .field("result", &self.result)
            .finish()
    }
}
