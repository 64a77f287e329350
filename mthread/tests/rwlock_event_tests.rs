//! rwlock y eventos construidos sobre mutex y condiciones

use mthread::{create, current, join, state_of, yield_all, yield_now, Error, Event, RwLock, ThreadState, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[test]
#[cfg(not(feature = "random-schedule"))]
fn test_writer_waits_for_readers_and_blocks_new_ones() {
    println!("\n=== TEST: lectores y escritor ===");

    let rw = Rc::new(RwLock::new().unwrap());
    let log = Rc::new(RefCell::new(Vec::new()));
    let max_readers = Rc::new(Cell::new(0));

    let reader = |name: &'static str| {
        let rw = rw.clone();
        let log = log.clone();
        let max_readers = max_readers.clone();
        move |_: Value| {
            rw.read_lock().unwrap();
            log.borrow_mut().push(format!("{} entra", name));
            max_readers.set(max_readers.get().max(rw.readers()));
            yield_now();
            log.borrow_mut().push(format!("{} sale", name));
            rw.unlock().unwrap();
            Value::NULL
        }
    };

    let r1 = create(None, reader("R1"), Value::NULL).unwrap();
    let r2 = create(None, reader("R2"), Value::NULL).unwrap();

    let writer_rw = rw.clone();
    let writer_log = log.clone();
    let w = create(
        None,
        move |_| {
            writer_rw.write_lock().unwrap();
            assert_eq!(writer_rw.readers(), 0);
            assert_eq!(writer_rw.writer(), Some(current()));
            writer_log.borrow_mut().push("W entra".to_string());
            yield_now();
            writer_log.borrow_mut().push("W sale".to_string());
            writer_rw.unlock().unwrap();
            Value::NULL
        },
        Value::NULL,
    )
    .unwrap();
    let r3 = create(None, reader("R3"), Value::NULL).unwrap();

    for tid in [r1, r2, w, r3] {
        join(tid).unwrap();
    }

    assert_eq!(max_readers.get(), 2, "los dos lectores deberian estar adentro a la vez");
    let log = log.borrow();
    let pos = |entry: &str| log.iter().position(|e| e == entry).unwrap();
    assert!(pos("W entra") > pos("R1 sale"));
    assert!(pos("W entra") > pos("R2 sale"));
    assert!(pos("R3 entra") > pos("W sale"), "un lector nuevo espera al escritor");

    assert_eq!(rw.readers(), 0);
    assert_eq!(rw.writer(), None);
    rw.destroy().unwrap();
}

#[test]
fn test_rwlock_misuse() {
    let rw = RwLock::new().unwrap();
    assert_eq!(rw.unlock(), Err(Error::NotPermitted));

    rw.write_lock().unwrap();
    assert_eq!(rw.write_lock(), Err(Error::Deadlock));
    assert_eq!(rw.destroy(), Err(Error::Busy));
    rw.unlock().unwrap();

    rw.read_lock().unwrap();
    assert_eq!(rw.destroy(), Err(Error::Busy));
    rw.unlock().unwrap();
    rw.destroy().unwrap();
}

#[test]
#[cfg(not(feature = "random-schedule"))]
fn test_event_fire_and_fire_all() {
    println!("\n=== TEST: eventos ===");

    let event = Event::new().unwrap();
    // sin nadie esperando el fire se pierde
    event.fire().unwrap();

    let woke = Rc::new(RefCell::new(Vec::new()));
    let e = Rc::new(event);
    let mut tids = Vec::new();
    for _ in 0..3 {
        let e = e.clone();
        let woke = woke.clone();
        tids.push(
            create(
                None,
                move |_| {
                    e.wait().unwrap();
                    woke.borrow_mut().push(current());
                    Value::NULL
                },
                Value::NULL,
            )
            .unwrap(),
        );
    }

    yield_all();
    assert!(woke.borrow().is_empty());
    for &tid in &tids {
        assert_eq!(state_of(tid), Ok(ThreadState::BlockedOnCondition));
    }
    assert_eq!(e.destroy(), Err(Error::Busy));

    e.fire().unwrap();
    yield_all();
    assert_eq!(*woke.borrow(), vec![tids[0]]);

    e.fire_all().unwrap();
    for &tid in &tids {
        join(tid).unwrap();
    }
    assert_eq!(*woke.borrow(), tids);
    e.destroy().unwrap();
}
