//! errores recuperables y el camino fatal

use thiserror::Error;

/// errores que la api devuelve al llamador
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid argument")]
    Invalid,

    #[error("no such thread")]
    NoSuchThread,

    #[error("operation would deadlock")]
    Deadlock,

    #[error("resource busy")]
    Busy,

    #[error("resource temporarily unavailable")]
    Again,

    #[error("out of memory")]
    NoMemory,

    #[error("operation not permitted")]
    NotPermitted,

    #[error("operation not supported")]
    Unsupported,
}

impl Error {
    /// codigo errno equivalente, para la capa ffi
    pub fn errno(self) -> i32 {
        match self {
            Error::Invalid => libc::EINVAL,
            Error::NoSuchThread => libc::ESRCH,
            Error::Deadlock => libc::EDEADLK,
            Error::Busy => libc::EBUSY,
            Error::Again => libc::EAGAIN,
            Error::NoMemory => libc::ENOMEM,
            Error::NotPermitted => libc::EPERM,
            Error::Unsupported => libc::ENOSYS,
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Error::NoMemory
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// violacion de un invariante interno: no hay forma de seguir
#[cold]
pub(crate) fn fatal(msg: &str) -> ! {
    log::error!("[mthread] fatal: {}", msg);
    eprintln!("mthread: fatal: {}", msg);
    std::process::abort()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(Error::Invalid.errno(), libc::EINVAL);
        assert_eq!(Error::NoSuchThread.errno(), libc::ESRCH);
        assert_eq!(Error::Deadlock.errno(), libc::EDEADLK);
        assert_eq!(Error::Busy.errno(), libc::EBUSY);
        assert_eq!(Error::Unsupported.errno(), libc::ENOSYS);
    }
}
