// wrapper minimalista sobre el crate context
// guarda el contexto suspendido de un hilo y la pila sobre la que corre

use std::ffi::c_void;

use context::stack::{ProtectedFixedSizeStack, Stack};
use context::{Context, Transfer};

use crate::attr::ThreadAttr;
use crate::config::STACK_MIN;
use crate::error::fatal;

// de quien es la pila del hilo
enum ThreadStack {
    // tcb virgen, o el hilo main que usa la pila del proceso
    None,
    // reservada por la libreria con pagina de guarda debajo; se libera en drop
    Owned(ProtectedFixedSizeStack),
    // memoria del usuario, nunca se libera aqui
    Borrowed(Stack),
}

pub struct ThreadContext {
    // solo existe mientras el hilo no esta ejecutando
    context: Option<Context>,
    stack: ThreadStack,
}

impl ThreadContext {
    /// contexto vacio: tcb sin pila, o el hilo main antes de ceder por primera vez
    pub fn empty() -> Self {
        Self {
            context: None,
            stack: ThreadStack::None,
        }
    }

    // crea un nuevo contexto con su propia pila
    // entry: trampolin sin argumentos, lee proc y arg del tcb actual
    pub fn new(attr: &ThreadAttr, entry: extern "C" fn(Transfer) -> !) -> Self {
        let stack = match attr.stack() {
            Some((base, size)) => {
                let bottom = base.as_ptr();
                // safety: set_stack exige que base..base+size sea memoria valida
                let stack = unsafe {
                    let top = bottom.add(size);
                    Stack::new(top as *mut c_void, bottom as *mut c_void)
                };
                ThreadStack::Borrowed(stack)
            }
            None => {
                let size = attr.stack_size().max(*STACK_MIN);
                match ProtectedFixedSizeStack::new(size) {
                    Ok(stack) => ThreadStack::Owned(stack),
                    Err(err) => fatal(&format!("could not allocate thread stack: {:?}", err)),
                }
            }
        };

        let context = {
            let raw: &Stack = match &stack {
                ThreadStack::Owned(s) => &**s,
                ThreadStack::Borrowed(s) => s,
                ThreadStack::None => fatal("thread context without a stack"),
            };
            // safety: la pila vive en este struct mientras el contexto exista
            unsafe { Context::new(raw, entry) }
        };

        Self {
            context: Some(context),
            stack,
        }
    }

    /// saca el contexto guardado para reanudarlo
    pub fn take(&mut self) -> Option<Context> {
        self.context.take()
    }

    /// guarda el contexto que devolvio un cambio de contexto
    pub fn park(&mut self, context: Context) {
        if self.context.is_some() {
            fatal("parking a context over another saved context");
        }
        self.context = Some(context);
    }

    pub fn is_parked(&self) -> bool {
        self.context.is_some()
    }

    /// true si la pila la reservo la libreria y se libera en reset
    pub fn owns_stack(&self) -> bool {
        matches!(self.stack, ThreadStack::Owned(_))
    }
}

// necesitamos que threadcontext se pueda debuggear para facilitar desarrollo
impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stack = match self.stack {
            ThreadStack::None => "none",
            ThreadStack::Owned(_) => "owned",
            ThreadStack::Borrowed(_) => "borrowed",
        };
        f.debug_struct("ThreadContext")
            .field("has_context", &self.context.is_some())
            .field("stack", &stack)
            .finish()
    }
}
