//! capa con firmas equivalentes a pthreads
//! expone funciones extern c que operan sobre el runtime del hilo del kernel actual
//! todas devuelven 0 o un codigo errno

use std::ffi::{c_int, c_void};
use std::ptr;
use std::rc::Rc;

use crate::api;
use crate::attr::{DetachState, ThreadAttr};
use crate::cond::Cond;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::key::{Key, KeyDestructor};
use crate::mutex::Mutex;
use crate::rwlock::RwLock;
use crate::sched;
use crate::thread::{ThreadId, Value};

// tipos opacos equivalentes
#[allow(non_camel_case_types)]
pub type mthread_t = ThreadId;
#[allow(non_camel_case_types)]
pub type mthread_attr_t = ThreadAttr;
#[allow(non_camel_case_types)]
pub type mthread_mutex_t = Mutex;
#[allow(non_camel_case_types)]
pub type mthread_cond_t = Cond;
#[allow(non_camel_case_types)]
pub type mthread_key_t = c_int;
#[allow(non_camel_case_types)]
pub type mthread_once_t = api::Once;
#[allow(non_camel_case_types)]
pub type mthread_rwlock_t = RwLock;
#[allow(non_camel_case_types)]
pub type mthread_event_t = Event;

pub const MTHREAD_CREATE_JOINABLE: c_int = 1;
pub const MTHREAD_CREATE_DETACHED: c_int = 2;

fn code(r: Result<()>) -> c_int {
    match r {
        Ok(()) => 0,
        Err(err) => err.errno(),
    }
}

/// escribe el resultado en `out` si no es nulo
unsafe fn store<T>(out: *mut T, r: Result<T>) -> c_int {
    if out.is_null() {
        return Error::Invalid.errno();
    }
    match r {
        Ok(value) => {
            ptr::write(out, value);
            0
        }
        Err(err) => err.errno(),
    }
}

fn key_from(key: mthread_key_t) -> Option<Key> {
    usize::try_from(key).ok().map(Key::from_index)
}

// ---------------------------------------------------------------------------
// hilos
// ---------------------------------------------------------------------------

/// crea un hilo con firma equivalente a pthread_create
///
/// # Safety
///
/// `thread` debe apuntar a memoria escribible; `attr` debe ser nulo o apuntar a
/// atributos inicializados con `mthread_attr_init`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_create(
    thread: *mut mthread_t,
    attr: *const mthread_attr_t,
    start_routine: Option<extern "C" fn(*mut c_void) -> *mut c_void>,
    arg: *mut c_void,
) -> c_int {
    let Some(start_routine) = start_routine else {
        return Error::Invalid.errno();
    };
    if thread.is_null() {
        return Error::Invalid.errno();
    }

    // wrapper de una sola ejecucion estilo pthread
    let proc = move |arg: Value| Value::from_ptr(start_routine(arg.as_ptr()));
    store(thread, api::create(attr.as_ref(), proc, Value::from_ptr(arg)))
}

/// join bloqueante con firma equivalente a pthread_join
///
/// # Safety
///
/// `value` debe ser nulo o apuntar a memoria escribible.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_join(thread: mthread_t, value: *mut *mut c_void) -> c_int {
    match api::join(thread) {
        Ok(result) => {
            if !value.is_null() {
                *value = result.as_ptr();
            }
            0
        }
        Err(err) => err.errno(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mthread_detach(thread: mthread_t) -> c_int {
    code(api::detach(thread))
}

/// termina el hilo actual guardando el valor opaco de retorno
#[unsafe(no_mangle)]
pub extern "C" fn mthread_exit(value: *mut c_void) {
    api::exit(Value::from_ptr(value))
}

#[unsafe(no_mangle)]
pub extern "C" fn mthread_self() -> mthread_t {
    api::current()
}

#[unsafe(no_mangle)]
pub extern "C" fn mthread_equal(a: mthread_t, b: mthread_t) -> c_int {
    api::equal(a, b) as c_int
}

/// 0 si cedio el control, -1 si no habia otro hilo listo
#[unsafe(no_mangle)]
pub extern "C" fn mthread_yield() -> c_int {
    if sched::yield_now() {
        0
    } else {
        -1
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mthread_yield_all() {
    sched::yield_all()
}

/// # Safety
///
/// `once` debe apuntar a un `mthread_once_t` valido.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_once(
    once: *const mthread_once_t,
    proc: Option<extern "C" fn()>,
) -> c_int {
    let (Some(once), Some(proc)) = (once.as_ref(), proc) else {
        return Error::Invalid.errno();
    };
    api::once(once, || proc());
    0
}

// ---------------------------------------------------------------------------
// atributos
// ---------------------------------------------------------------------------

/// # Safety
///
/// `attr` debe apuntar a memoria escribible para un `mthread_attr_t`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_attr_init(attr: *mut mthread_attr_t) -> c_int {
    store(attr, Ok(ThreadAttr::new()))
}

/// # Safety
///
/// `attr` debe ser nulo o apuntar a atributos inicializados.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_attr_destroy(attr: *mut mthread_attr_t) -> c_int {
    if attr.is_null() {
        return Error::Invalid.errno();
    }
    0
}

/// # Safety
///
/// `attr` debe ser nulo o apuntar a atributos inicializados.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_attr_setdetachstate(
    attr: *mut mthread_attr_t,
    state: c_int,
) -> c_int {
    let Some(attr) = attr.as_mut() else {
        return Error::Invalid.errno();
    };
    match state {
        MTHREAD_CREATE_JOINABLE => attr.set_detach_state(DetachState::Joinable),
        MTHREAD_CREATE_DETACHED => attr.set_detach_state(DetachState::Detached),
        _ => return Error::Invalid.errno(),
    }
    0
}

/// # Safety
///
/// `attr` debe ser nulo o apuntar a atributos inicializados; `state` debe ser
/// nulo o escribible.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_attr_getdetachstate(
    attr: *const mthread_attr_t,
    state: *mut c_int,
) -> c_int {
    let Some(attr) = attr.as_ref() else {
        return Error::Invalid.errno();
    };
    let value = match attr.detach_state() {
        DetachState::Joinable => MTHREAD_CREATE_JOINABLE,
        DetachState::Detached => MTHREAD_CREATE_DETACHED,
    };
    store(state, Ok(value))
}

/// # Safety
///
/// `attr` debe ser nulo o apuntar a atributos inicializados.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_attr_setstacksize(attr: *mut mthread_attr_t, size: usize) -> c_int {
    match attr.as_mut() {
        Some(attr) => code(attr.set_stack_size(size)),
        None => Error::Invalid.errno(),
    }
}

/// # Safety
///
/// `attr` debe ser nulo o apuntar a atributos inicializados; `size` debe ser
/// nulo o escribible.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_attr_getstacksize(
    attr: *const mthread_attr_t,
    size: *mut usize,
) -> c_int {
    match attr.as_ref() {
        Some(attr) => store(size, Ok(attr.stack_size())),
        None => Error::Invalid.errno(),
    }
}

/// # Safety
///
/// ademas de lo de `ThreadAttr::set_stack`, `attr` debe ser nulo o apuntar a
/// atributos inicializados.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_attr_setstack(
    attr: *mut mthread_attr_t,
    addr: *mut c_void,
    size: usize,
) -> c_int {
    match attr.as_mut() {
        Some(attr) => code(attr.set_stack(addr.cast(), size)),
        None => Error::Invalid.errno(),
    }
}

// ---------------------------------------------------------------------------
// mutex y condiciones
// ---------------------------------------------------------------------------

/// mutex init equivalente a pthread_mutex_init; no hay atributos soportados
///
/// # Safety
///
/// `mutex` debe ser nulo o escribible.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_mutex_init(
    mutex: *mut mthread_mutex_t,
    attr: *const c_void,
) -> c_int {
    if !attr.is_null() {
        return Error::Unsupported.errno();
    }
    store(mutex, Mutex::new())
}

/// # Safety
///
/// `mutex` debe ser nulo o apuntar a un mutex inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_mutex_destroy(mutex: *mut mthread_mutex_t) -> c_int {
    with_ref(mutex, |m| m.destroy())
}

/// # Safety
///
/// `mutex` debe ser nulo o apuntar a un mutex inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_mutex_lock(mutex: *mut mthread_mutex_t) -> c_int {
    with_ref(mutex, |m| m.lock())
}

/// # Safety
///
/// `mutex` debe ser nulo o apuntar a un mutex inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_mutex_trylock(mutex: *mut mthread_mutex_t) -> c_int {
    with_ref(mutex, |m| m.try_lock())
}

/// # Safety
///
/// `mutex` debe ser nulo o apuntar a un mutex inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_mutex_unlock(mutex: *mut mthread_mutex_t) -> c_int {
    with_ref(mutex, |m| m.unlock())
}

/// # Safety
///
/// `cond` debe ser nulo o escribible.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_cond_init(cond: *mut mthread_cond_t, attr: *const c_void) -> c_int {
    if !attr.is_null() {
        return Error::Unsupported.errno();
    }
    store(cond, Cond::new())
}

/// # Safety
///
/// `cond` debe ser nulo o apuntar a una condicion inicializada.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_cond_destroy(cond: *mut mthread_cond_t) -> c_int {
    with_ref(cond, |c| c.destroy())
}

/// # Safety
///
/// `cond` y `mutex` deben ser nulos o apuntar a objetos inicializados.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_cond_wait(
    cond: *mut mthread_cond_t,
    mutex: *mut mthread_mutex_t,
) -> c_int {
    match (cond.as_ref(), mutex.as_ref()) {
        (Some(c), Some(m)) => code(c.wait(m)),
        _ => Error::Invalid.errno(),
    }
}

/// # Safety
///
/// `cond` debe ser nulo o apuntar a una condicion inicializada.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_cond_signal(cond: *mut mthread_cond_t) -> c_int {
    with_ref(cond, |c| c.signal())
}

/// # Safety
///
/// `cond` debe ser nulo o apuntar a una condicion inicializada.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_cond_broadcast(cond: *mut mthread_cond_t) -> c_int {
    with_ref(cond, |c| c.broadcast())
}

// ---------------------------------------------------------------------------
// keys
// ---------------------------------------------------------------------------

/// # Safety
///
/// `key` debe ser nulo o escribible.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_key_create(
    key: *mut mthread_key_t,
    destructor: Option<extern "C" fn(*mut c_void)>,
) -> c_int {
    if key.is_null() {
        return Error::Invalid.errno();
    }
    let destructor =
        destructor.map(|f| Rc::new(move |v: Value| f(v.as_ptr())) as KeyDestructor);
    store(key, Key::create(destructor).map(|k| k.index() as mthread_key_t))
}

#[unsafe(no_mangle)]
pub extern "C" fn mthread_key_delete(key: mthread_key_t) -> c_int {
    match key_from(key) {
        Some(key) => code(key.delete()),
        None => Error::Invalid.errno(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mthread_getspecific(key: mthread_key_t) -> *mut c_void {
    match key_from(key) {
        Some(key) => key.get().as_ptr(),
        None => ptr::null_mut(),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mthread_setspecific(key: mthread_key_t, value: *const c_void) -> c_int {
    match key_from(key) {
        Some(key) => code(key.set(Value::from_ptr(value.cast_mut()))),
        None => Error::Invalid.errno(),
    }
}

// ---------------------------------------------------------------------------
// rwlock y eventos
// ---------------------------------------------------------------------------

/// # Safety
///
/// `rwlock` debe ser nulo o escribible.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_rwlock_init(rwlock: *mut mthread_rwlock_t) -> c_int {
    store(rwlock, RwLock::new())
}

/// # Safety
///
/// `rwlock` debe ser nulo o apuntar a un rwlock inicializado; despues de un
/// destroy exitoso no se puede volver a usar sin init.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_rwlock_destroy(rwlock: *mut mthread_rwlock_t) -> c_int {
    with_ref(rwlock, |l| l.destroy())
}

/// # Safety
///
/// `rwlock` debe ser nulo o apuntar a un rwlock inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_rwlock_rdlock(rwlock: *mut mthread_rwlock_t) -> c_int {
    with_ref(rwlock, |l| l.read_lock())
}

/// # Safety
///
/// `rwlock` debe ser nulo o apuntar a un rwlock inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_rwlock_wrlock(rwlock: *mut mthread_rwlock_t) -> c_int {
    with_ref(rwlock, |l| l.write_lock())
}

/// # Safety
///
/// `rwlock` debe ser nulo o apuntar a un rwlock inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_rwlock_unlock(rwlock: *mut mthread_rwlock_t) -> c_int {
    with_ref(rwlock, |l| l.unlock())
}

/// # Safety
///
/// `event` debe ser nulo o escribible.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_event_init(event: *mut mthread_event_t) -> c_int {
    store(event, Event::new())
}

/// # Safety
///
/// `event` debe ser nulo o apuntar a un evento inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_event_destroy(event: *mut mthread_event_t) -> c_int {
    with_ref(event, |e| e.destroy())
}

/// # Safety
///
/// `event` debe ser nulo o apuntar a un evento inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_event_wait(event: *mut mthread_event_t) -> c_int {
    with_ref(event, |e| e.wait())
}

/// # Safety
///
/// `event` debe ser nulo o apuntar a un evento inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_event_fire(event: *mut mthread_event_t) -> c_int {
    with_ref(event, |e| e.fire())
}

/// # Safety
///
/// `event` debe ser nulo o apuntar a un evento inicializado.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mthread_event_fire_all(event: *mut mthread_event_t) -> c_int {
    with_ref(event, |e| e.fire_all())
}

unsafe fn with_ref<T>(obj: *const T, f: impl FnOnce(&T) -> Result<()>) -> c_int {
    match obj.as_ref() {
        Some(obj) => code(f(obj)),
        None => Error::Invalid.errno(),
    }
}
