//! Iterative async combinator: element-wise asynchronous invocation of a
//! function value over a fixed-size collection.
//!
//! Used by forEach/map/filter-style operators. Instead of eagerly
//! spawning N child strands, it chains one in-flight invocation at a
//! time: element i's completion dispatches element i+1. That bounds
//! strand creation regardless of collection size, at the cost of
//! serializing completion latency. Elements are dispatched in strictly
//! increasing index order and every outcome is attributed to its
//! originating index.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;

use crate::error::RuntimeError;
use crate::scheduler::Scheduler;
use crate::strand::StrandId;
use crate::value::{FunctionValue, Outcome, Value};

/// Synchronously computes the invocation arguments for one element.
pub type ElementAccessor = Box<dyn FnMut(usize) -> Vec<Value> + Send>;

/// Receives each element's outcome, keyed by its index.
pub type ElementSink = Box<dyn FnMut(usize, &Outcome) + Send>;

/// Terminal callback; invoked exactly once. Receives the aborting error
/// in fail-fast mode, `Ok(())` otherwise.
pub type IterComplete = Box<dyn FnOnce(Result<(), RuntimeError>) + Send>;

struct IterState {
    scheduler: Arc<Scheduler>,
    func: Arc<FunctionValue>,
    count: usize,
    /// Strand that started the iteration, captured at entry; each
    /// element invocation is spawned on its behalf.
    parent: Option<StrandId>,
    fail_fast: bool,
    /// Next element to invoke; monotonically increasing, at most count.
    next: AtomicUsize,
    completed: AtomicUsize,
    aborted: AtomicBool,
    accessor: Mutex<ElementAccessor>,
    sink: Mutex<ElementSink>,
    /// Taken exactly once, by whichever completion finishes the run.
    terminal: Mutex<Option<IterComplete>>,
}

/// Drive `func` over `count` elements with bounded concurrency.
///
/// For each index the accessor computes the arguments synchronously,
/// then the function value is invoked asynchronously on a fresh child
/// strand; the element's outcome goes to the sink before the next
/// element is dispatched. In fail-fast mode the first error outcome
/// aborts further dispatch and surfaces through `on_complete`; in
/// collect-all mode every element is dispatched regardless of
/// individual failures.
pub fn invoke_iteratively(
    scheduler: &Arc<Scheduler>,
    func: &Arc<FunctionValue>,
    count: usize,
    accessor: ElementAccessor,
    sink: ElementSink,
    on_complete: IterComplete,
    fail_fast: bool,
) {
    if count == 0 {
        on_complete(Ok(()));
        return;
    }
    let state = Arc::new(IterState {
        scheduler: Arc::clone(scheduler),
        func: Arc::clone(func),
        count,
        parent: Scheduler::current_strand(),
        fail_fast,
        next: AtomicUsize::new(0),
        completed: AtomicUsize::new(0),
        aborted: AtomicBool::new(false),
        accessor: Mutex::new(accessor),
        sink: Mutex::new(sink),
        terminal: Mutex::new(Some(on_complete)),
    });
    state.dispatch();
}

impl IterState {
    /// Invoke the next element, if any remain.
    fn dispatch(self: &Arc<Self>) {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        if index >= self.count {
            return;
        }
        let args = (self.accessor.lock())(index);
        trace!("{}: dispatching element {}", self.func.name, index);
        let future = self.scheduler.submit_inner(
            &self.func,
            args,
            Some(format!("{}-iter-{}", self.func.name, index)),
            self.parent,
        );
        let state = Arc::clone(self);
        future.on_complete(move |outcome| state.element_done(index, outcome));
    }

    fn element_done(self: &Arc<Self>, index: usize, outcome: &Outcome) {
        (self.sink.lock())(index, outcome);
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_fast {
            if let Err(err) = outcome {
                if !self.aborted.swap(true, Ordering::SeqCst) {
                    self.finish(Err(err.clone()));
                }
                return;
            }
        }

        if done == self.count {
            self.finish(Ok(()));
        } else if !self.aborted.load(Ordering::SeqCst) {
            self.dispatch();
        }
    }

    fn finish(&self, result: Result<(), RuntimeError>) {
        if let Some(terminal) = self.terminal.lock().take() {
            terminal(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerConfig;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn zero_elements_completes_immediately() {
        let scheduler = Scheduler::new(SchedulerConfig {
            carrier_threads: 1,
            ..Default::default()
        });
        let noop = FunctionValue::native("noop", |_cx, _args| Ok(Value::Unit));
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        invoke_iteratively(
            &scheduler,
            &noop,
            0,
            Box::new(|_| Vec::new()),
            Box::new(|_, _| panic!("no elements should be dispatched")),
            Box::new(move |result| {
                assert_eq!(result, Ok(()));
                f.fetch_add(1, Ordering::SeqCst);
            }),
            false,
        );
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        scheduler.shutdown();
    }
}
