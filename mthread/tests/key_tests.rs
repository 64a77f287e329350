//! keys por hilo y sus destructores

use mthread::{create, join, yield_all, Error, Key, KeyDestructor, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn recording(log: &Rc<RefCell<Vec<(usize, Value)>>>, tag: usize) -> KeyDestructor {
    let log = log.clone();
    Rc::new(move |v| log.borrow_mut().push((tag, v)))
}

#[test]
fn test_values_are_per_thread() {
    println!("\n=== TEST: cada hilo ve su propio valor ===");

    let key = Key::create(None).unwrap();
    key.set(Value::new(100)).unwrap();

    let mut tids = Vec::new();
    for i in 1..=3usize {
        tids.push(
            create(
                None,
                move |_| {
                    assert!(key.get().is_null(), "un hilo nuevo empieza en NULL");
                    key.set(Value::new(i)).unwrap();
                    mthread::yield_now();
                    key.get()
                },
                Value::NULL,
            )
            .unwrap(),
        );
    }

    for (i, tid) in tids.into_iter().enumerate() {
        assert_eq!(join(tid), Ok(Value::new(i + 1)));
    }
    assert_eq!(key.get(), Value::new(100), "main tiene su propio valor");
    key.delete().unwrap();
}

#[test]
fn test_destructor_runs_once_with_slot_cleared() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let slot_during = Rc::new(Cell::new(None));

    let key_cell: Rc<Cell<Option<Key>>> = Rc::new(Cell::new(None));
    let inner = key_cell.clone();
    let seen = slot_during.clone();
    let rec = recording(&log, 0);
    let destructor: KeyDestructor = Rc::new(move |v| {
        if let Some(key) = inner.get() {
            seen.set(Some(key.get()));
        }
        rec(v);
    });
    let key = Key::create(Some(destructor)).unwrap();
    key_cell.set(Some(key));

    let tid = create(None, move |_| { key.set(Value::new(42)).unwrap(); Value::NULL }, Value::NULL).unwrap();
    join(tid).unwrap();

    assert_eq!(*log.borrow(), vec![(0, Value::new(42))]);
    assert_eq!(slot_during.get(), Some(Value::NULL), "el slot se limpia antes del destructor");
}

#[test]
fn test_null_values_skip_the_destructor() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let key = Key::create(Some(recording(&log, 0))).unwrap();

    let tid = create(None, move |_| { key.set(Value::NULL).unwrap(); Value::NULL }, Value::NULL).unwrap();
    join(tid).unwrap();
    let untouched = create(None, |_| Value::NULL, Value::NULL).unwrap();
    join(untouched).unwrap();

    assert!(log.borrow().is_empty());
}

#[test]
fn test_destructor_setting_an_earlier_key_causes_another_pass() {
    println!("\n=== TEST: destructores en varias pasadas ===");

    let log = Rc::new(RefCell::new(Vec::new()));
    let first = Key::create(Some(recording(&log, 1))).unwrap();

    let rec = recording(&log, 2);
    let second_dtor: KeyDestructor = Rc::new(move |v| {
        rec(v);
        // vuelve a escribir una key ya visitada en esta pasada
        first.set(Value::new(77)).unwrap();
    });
    let second = Key::create(Some(second_dtor)).unwrap();
    assert!(first.index() < second.index());

    let tid = create(
        None,
        move |_| {
            first.set(Value::new(1)).unwrap();
            second.set(Value::new(2)).unwrap();
            Value::NULL
        },
        Value::NULL,
    )
    .unwrap();
    join(tid).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![(1, Value::new(1)), (2, Value::new(2)), (1, Value::new(77))]
    );
}

#[test]
fn test_delete_does_not_call_destructors() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let key = Key::create(Some(recording(&log, 0))).unwrap();

    let gate = mthread::Mutex::new().unwrap();
    gate.lock().unwrap();
    let tid = create(
        None,
        move |_| {
            key.set(Value::new(5)).unwrap();
            gate.lock().unwrap();
            gate.unlock().unwrap();
            Value::NULL
        },
        Value::NULL,
    )
    .unwrap();

    yield_all();
    key.delete().unwrap();
    gate.unlock().unwrap();
    join(tid).unwrap();

    assert!(log.borrow().is_empty(), "borrar la key no llama al destructor");
    assert_eq!(key.set(Value::new(1)), Err(Error::Invalid));
    assert_eq!(key.delete(), Err(Error::Invalid));
    assert!(key.get().is_null());
}

#[test]
fn test_main_values_survive_thread_cleanup() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let key = Key::create(Some(recording(&log, 0))).unwrap();
    key.set(Value::new(9)).unwrap();

    let tid = create(None, |_| Value::NULL, Value::NULL).unwrap();
    join(tid).unwrap();

    assert!(log.borrow().is_empty());
    assert_eq!(key.get(), Value::new(9));
}

#[test]
fn test_key_table_exhaustion() {
    let mut keys = Vec::new();
    let err = loop {
        match Key::create(None) {
            Ok(key) => keys.push(key),
            Err(err) => break err,
        }
    };
    assert_eq!(err, Error::Again);
    assert_eq!(keys.len(), mthread::config::KEYS_MAX);

    let freed = keys.pop().unwrap();
    freed.delete().unwrap();
    assert_eq!(Key::create(None).map(Key::index), Ok(freed.index()));
}
