//! Integration tests for the iterative async combinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use weft_runtime::scheduler::{Scheduler, SchedulerConfig};
use weft_runtime::{invoke_iteratively, FunctionValue, RuntimeError, Value};

fn scheduler(carriers: usize) -> Arc<Scheduler> {
    let _ = env_logger::builder().is_test(true).try_init();
    Scheduler::new(SchedulerConfig {
        carrier_threads: carriers,
        ..Default::default()
    })
}

#[test]
fn each_element_dispatched_once_in_increasing_order() {
    let scheduler = scheduler(2);
    let double = FunctionValue::native("double", |_cx, args| match args {
        [Value::Int(n)] => Ok(Value::Int(n * 2)),
        _ => Err(RuntimeError::Application("expected one int".into())),
    });

    let accessed = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let a = accessed.clone();
    let results = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let r = results.clone();
    let (done_tx, done_rx) = mpsc::channel();

    invoke_iteratively(
        &scheduler,
        &double,
        5,
        Box::new(move |i| {
            a.lock().push(i);
            vec![Value::Int(i as i64)]
        }),
        Box::new(move |i, outcome| {
            r.lock().push((i, outcome.clone()));
        }),
        Box::new(move |result| {
            done_tx.send(result).unwrap();
        }),
        false,
    );

    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(Ok(())));
    assert_eq!(*accessed.lock(), vec![0, 1, 2, 3, 4]);
    let results = results.lock();
    assert_eq!(results.len(), 5);
    for (i, outcome) in results.iter() {
        assert_eq!(outcome, &Ok(Value::Int(*i as i64 * 2)));
    }
    // Sink saw the indexes in dispatch order: completion chains dispatch.
    let order: Vec<_> = results.iter().map(|(i, _)| *i).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    scheduler.shutdown();
}

#[test]
fn fail_fast_stops_dispatch_after_first_error() {
    let scheduler = scheduler(2);
    let flaky = FunctionValue::native("flaky", |_cx, args| match args {
        [Value::Int(2)] => Err(RuntimeError::Application("element 2 refused".into())),
        [Value::Int(n)] => Ok(Value::Int(*n)),
        _ => Err(RuntimeError::Application("expected one int".into())),
    });

    let dispatched = Arc::new(AtomicUsize::new(0));
    let d = dispatched.clone();
    let outcomes = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let o = outcomes.clone();
    let (done_tx, done_rx) = mpsc::channel();

    invoke_iteratively(
        &scheduler,
        &flaky,
        5,
        Box::new(move |i| {
            d.fetch_add(1, Ordering::SeqCst);
            vec![Value::Int(i as i64)]
        }),
        Box::new(move |i, outcome| {
            o.lock().push((i, outcome.clone()));
        }),
        Box::new(move |result| {
            done_tx.send(result).unwrap();
        }),
        true,
    );

    assert_eq!(
        done_rx.recv_timeout(Duration::from_secs(5)),
        Ok(Err(RuntimeError::Application("element 2 refused".into())))
    );
    // A little grace so that any stray dispatch would have happened.
    thread::sleep(Duration::from_millis(100));
    let outcomes = outcomes.lock();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0], (0, Ok(Value::Int(0))));
    assert_eq!(outcomes[1], (1, Ok(Value::Int(1))));
    assert_eq!(
        outcomes[2],
        (2, Err(RuntimeError::Application("element 2 refused".into())))
    );
    // Elements 3 and 4 were never invoked.
    assert_eq!(dispatched.load(Ordering::SeqCst), 3);
    scheduler.shutdown();
}

#[test]
fn collect_all_dispatches_every_element_despite_failures() {
    let scheduler = scheduler(2);
    let flaky = FunctionValue::native("flaky", |_cx, args| match args {
        [Value::Int(n)] if n % 2 == 1 => {
            Err(RuntimeError::Application(format!("odd {}", n)))
        }
        [Value::Int(n)] => Ok(Value::Int(*n)),
        _ => Err(RuntimeError::Application("expected one int".into())),
    });

    let outcomes = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let o = outcomes.clone();
    let (done_tx, done_rx) = mpsc::channel();

    invoke_iteratively(
        &scheduler,
        &flaky,
        4,
        Box::new(|i| vec![Value::Int(i as i64)]),
        Box::new(move |i, outcome| {
            o.lock().push((i, outcome.is_ok()));
        }),
        Box::new(move |result| {
            done_tx.send(result).unwrap();
        }),
        false,
    );

    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(Ok(())));
    assert_eq!(
        *outcomes.lock(),
        vec![(0, true), (1, false), (2, true), (3, false)]
    );
    scheduler.shutdown();
}
