//! variables de condicion: signal, broadcast y errores de uso

use mthread::{create, current, join, state_of, yield_all, Cond, Error, Mutex, ThreadState, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn spawn_waiters(
    count: usize,
    m: Mutex,
    c: Cond,
    woke: &Rc<RefCell<Vec<i32>>>,
) -> Vec<i32> {
    (0..count)
        .map(|_| {
            let woke = woke.clone();
            create(
                None,
                move |_| {
                    m.lock().unwrap();
                    c.wait(&m).unwrap();
                    woke.borrow_mut().push(current());
                    m.unlock().unwrap();
                    Value::NULL
                },
                Value::NULL,
            )
            .unwrap()
        })
        .collect()
}

#[test]
#[cfg(not(feature = "random-schedule"))]
fn test_signal_wakes_one_in_fifo_order() {
    println!("\n=== TEST: signal despierta de a uno ===");

    let m = Mutex::new().unwrap();
    let c = Cond::new().unwrap();
    let woke = Rc::new(RefCell::new(Vec::new()));
    let tids = spawn_waiters(3, m, c, &woke);

    yield_all();
    for &tid in &tids {
        assert_eq!(state_of(tid), Ok(ThreadState::BlockedOnCondition));
    }

    c.signal().unwrap();
    yield_all();
    assert_eq!(*woke.borrow(), vec![tids[0]], "solo el primero deberia despertar");
    assert_eq!(state_of(tids[1]), Ok(ThreadState::BlockedOnCondition));

    c.signal().unwrap();
    c.signal().unwrap();
    for &tid in &tids {
        join(tid).unwrap();
    }
    assert_eq!(*woke.borrow(), tids);

    // signal sin nadie esperando no hace nada
    c.signal().unwrap();
    c.destroy().unwrap();
    m.destroy().unwrap();
}

#[test]
#[cfg(not(feature = "random-schedule"))]
fn test_broadcast_wakes_everyone() {
    let m = Mutex::new().unwrap();
    let c = Cond::new().unwrap();
    let woke = Rc::new(RefCell::new(Vec::new()));
    let tids = spawn_waiters(4, m, c, &woke);

    yield_all();
    c.broadcast().unwrap();
    for &tid in &tids {
        join(tid).unwrap();
    }
    assert_eq!(*woke.borrow(), tids);
}

#[test]
fn test_predicate_loop_with_producer() {
    println!("\n=== TEST: productor y consumidor ===");

    let m = Mutex::new().unwrap();
    let c = Cond::new().unwrap();
    let ready = Rc::new(Cell::new(false));

    let flag = ready.clone();
    let consumer = create(
        None,
        move |_| {
            m.lock().unwrap();
            while !flag.get() {
                c.wait(&m).unwrap();
            }
            m.unlock().unwrap();
            Value::new(1)
        },
        Value::NULL,
    )
    .unwrap();

    // un signal sin el predicado listo: el consumidor vuelve a esperar
    yield_all();
    c.signal().unwrap();
    yield_all();
    assert_eq!(state_of(consumer), Ok(ThreadState::BlockedOnCondition));

    m.lock().unwrap();
    ready.set(true);
    c.signal().unwrap();
    m.unlock().unwrap();
    assert_eq!(join(consumer), Ok(Value::new(1)));
}

#[test]
fn test_wait_requires_owning_the_mutex() {
    let m = Mutex::new().unwrap();
    let c = Cond::new().unwrap();
    assert_eq!(c.wait(&m), Err(Error::NotPermitted));

    let holder = create(None, move |_| { m.lock().unwrap(); Value::NULL }, Value::NULL).unwrap();
    join(holder).unwrap();
    // el dueno termino sin soltarlo
    assert_eq!(c.wait(&m), Err(Error::NotPermitted));

    let other = Mutex::new().unwrap();
    other.destroy().unwrap();
    assert_eq!(c.wait(&other), Err(Error::Invalid));
}

#[test]
fn test_destroy_with_waiters_is_busy() {
    let m = Mutex::new().unwrap();
    let c = Cond::new().unwrap();
    let woke = Rc::new(RefCell::new(Vec::new()));
    let tids = spawn_waiters(1, m, c, &woke);

    yield_all();
    assert_eq!(c.destroy(), Err(Error::Busy));

    c.signal().unwrap();
    join(tids[0]).unwrap();
    c.destroy().unwrap();
    assert_eq!(c.signal(), Err(Error::Invalid));
    assert_eq!(c.broadcast(), Err(Error::Invalid));
    assert_eq!(c.destroy(), Err(Error::Invalid));
}
