//! constantes de compilacion del runtime

use context::stack::Stack;
use once_cell::sync::Lazy;

/// tamano inicial del pool de tcbs
pub const INITIAL_POOL_SIZE: usize = 4;

/// tope duro del pool; crecer mas alla falla con `Error::Again`
pub const MAX_POOL_SIZE: usize = 1024;

/// cantidad de slots en la tabla de keys
pub const KEYS_MAX: usize = 128;

/// pila por defecto cuando los atributos no piden otra cosa
pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;

const STACK_FLOOR: usize = 16 * 1024;

/// minimo aceptado para pilas, propias o del usuario
pub static STACK_MIN: Lazy<usize> = Lazy::new(|| STACK_FLOOR.max(Stack::min_size()));
