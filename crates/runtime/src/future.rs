//! Futures: join points for asynchronously spawned strands.
//!
//! A future completes exactly once, at the false-to-true transition of
//! its completion flag; waiters, completion callbacks and blocking host
//! threads are all released at that single transition. Cancellation is
//! advisory: it freezes the future with a cancellation error and any
//! late completion from the still-running strand is discarded.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use log::debug;
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;

use crate::error::RuntimeError;
use crate::scheduler::Scheduler;
use crate::strand::StrandId;
use crate::value::Outcome;

/// Callback invoked exactly once when the future freezes.
pub type CompletionCallback = Box<dyn FnOnce(&Outcome) + Send>;

/// Result of a wait issued from strand context.
#[derive(Debug)]
pub enum WaitStatus<T> {
    /// Every awaited future was already complete; the strand continues
    /// on its carrier without being re-enqueued.
    Ready(T),
    /// The strand parked; the body must return `StepResult::Pending`
    /// and pick the outcome up from its resumption on the next step.
    Parked,
}

/// A parked strand waiting on this future.
pub(crate) enum Waiter {
    One { strand: StrandId },
    All { set: Arc<WaitAllState>, index: usize },
    Any { set: Arc<WaitAnyState>, index: usize },
}

/// Shared state of one wait-all operation across its futures.
pub(crate) struct WaitAllState {
    pub strand: StrandId,
    remaining: AtomicUsize,
    slots: Mutex<Vec<Option<Outcome>>>,
}

impl WaitAllState {
    pub fn new(strand: StrandId, count: usize) -> Self {
        WaitAllState {
            strand,
            remaining: AtomicUsize::new(count),
            slots: Mutex::new(vec![None; count]),
        }
    }

    /// Record one future's outcome at its call-order position.
    pub fn fill(&self, index: usize, outcome: Outcome) {
        self.slots.lock()[index] = Some(outcome);
    }

    /// Count one completion; true when this was the last one. The
    /// fetch_sub makes resolution exactly-once even when registration
    /// races with concurrent completions.
    pub fn complete_one(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::SeqCst) == 1
    }

    /// Drain the aggregated outcomes in call order.
    pub fn collect(&self) -> Vec<Outcome> {
        self.slots
            .lock()
            .iter_mut()
            .map(|slot| {
                slot.take().unwrap_or_else(|| {
                    Err(RuntimeError::Trapped {
                        message: "wait-all slot missing at resolution".to_string(),
                    })
                })
            })
            .collect()
    }
}

/// Shared state of one wait-any operation across its futures.
pub(crate) struct WaitAnyState {
    pub strand: StrandId,
    won: AtomicBool,
}

impl WaitAnyState {
    pub fn new(strand: StrandId) -> Self {
        WaitAnyState {
            strand,
            won: AtomicBool::new(false),
        }
    }

    /// Claim the single resumption; false if another future already won.
    pub fn try_win(&self) -> bool {
        !self.won.swap(true, Ordering::SeqCst)
    }
}

struct FutureInner {
    completed: bool,
    cancelled: bool,
    outcome: Option<Outcome>,
    waiters: SmallVec<[Waiter; 2]>,
    callbacks: SmallVec<[CompletionCallback; 2]>,
}

pub(crate) struct FutureState {
    target: StrandId,
    scheduler: Weak<Scheduler>,
    shared: Mutex<FutureInner>,
    cond: Condvar,
}

/// Drained effects of the completion transition, routed outside the lock.
pub(crate) struct FrozenFuture {
    pub waiters: SmallVec<[Waiter; 2]>,
    pub callbacks: SmallVec<[CompletionCallback; 2]>,
    pub outcome: Outcome,
}

/// Handle to the eventual result of an asynchronously spawned strand.
#[derive(Clone)]
pub struct FutureHandle {
    inner: Arc<FutureState>,
}

impl FutureHandle {
    pub(crate) fn new(scheduler: Weak<Scheduler>, target: StrandId) -> FutureHandle {
        FutureHandle {
            inner: Arc::new(FutureState {
                target,
                scheduler,
                shared: Mutex::new(FutureInner {
                    completed: false,
                    cancelled: false,
                    outcome: None,
                    waiters: SmallVec::new(),
                    callbacks: SmallVec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Id of the strand this future joins.
    pub fn strand_id(&self) -> StrandId {
        self.inner.target
    }

    pub fn is_completed(&self) -> bool {
        self.inner.shared.lock().completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.shared.lock().cancelled
    }

    /// The frozen outcome, if complete.
    pub fn peek(&self) -> Option<Outcome> {
        self.inner.shared.lock().outcome.clone()
    }

    /// Flip the completion flag false-to-true and drain the release
    /// effects. Returns `None` if already complete: a late completion
    /// (after cancellation, or a protocol slip) is discarded here.
    pub(crate) fn freeze(&self, outcome: Outcome, cancelled: bool) -> Option<FrozenFuture> {
        let mut shared = self.inner.shared.lock();
        if shared.completed {
            debug!("{}: late completion discarded", self.inner.target);
            return None;
        }
        shared.completed = true;
        shared.cancelled = cancelled;
        shared.outcome = Some(outcome.clone());
        let waiters = std::mem::take(&mut shared.waiters);
        let callbacks = std::mem::take(&mut shared.callbacks);
        drop(shared);
        self.inner.cond.notify_all();
        Some(FrozenFuture {
            waiters,
            callbacks,
            outcome,
        })
    }

    /// Register a completion callback, invoked exactly once. If the
    /// future is already frozen the callback runs immediately on the
    /// calling thread.
    pub fn on_complete(&self, cb: impl FnOnce(&Outcome) + Send + 'static) {
        let mut pending: Option<CompletionCallback> = Some(Box::new(cb));
        let ready = {
            let mut shared = self.inner.shared.lock();
            if shared.completed {
                shared.outcome.clone()
            } else {
                if let Some(cb) = pending.take() {
                    shared.callbacks.push(cb);
                }
                None
            }
        };
        if let (Some(outcome), Some(cb)) = (ready, pending) {
            cb(&outcome);
        }
    }

    /// Register a single-strand waiter; returns the outcome instead if
    /// the future is already complete.
    pub(crate) fn register_one(&self, strand: StrandId) -> Option<Outcome> {
        let mut shared = self.inner.shared.lock();
        if shared.completed {
            return shared.outcome.clone();
        }
        shared.waiters.push(Waiter::One { strand });
        None
    }

    /// Register a wait-all participant; returns the outcome instead if
    /// the future is already complete.
    pub(crate) fn register_all(&self, set: Arc<WaitAllState>, index: usize) -> Option<Outcome> {
        let mut shared = self.inner.shared.lock();
        if shared.completed {
            return shared.outcome.clone();
        }
        shared.waiters.push(Waiter::All { set, index });
        None
    }

    /// Register a wait-any participant; returns the outcome instead if
    /// the future is already complete.
    pub(crate) fn register_any(&self, set: Arc<WaitAnyState>, index: usize) -> Option<Outcome> {
        let mut shared = self.inner.shared.lock();
        if shared.completed {
            return shared.outcome.clone();
        }
        shared.waiters.push(Waiter::Any { set, index });
        None
    }

    /// Cancel this future. Current and future waiters observe a
    /// cancellation error; the spawned strand itself keeps running and
    /// its eventual completion is discarded. Returns false if the
    /// future had already completed.
    pub fn cancel(&self) -> bool {
        match self.inner.scheduler.upgrade() {
            Some(scheduler) => scheduler.cancel_future(self),
            // Scheduler gone: freeze locally so blocking waiters and
            // callbacks still observe the cancellation.
            None => match self.freeze(Err(RuntimeError::Cancelled), true) {
                Some(frozen) => {
                    for cb in frozen.callbacks {
                        cb(&frozen.outcome);
                    }
                    true
                }
                None => false,
            },
        }
    }

    /// Block the calling host thread until completion. For code running
    /// outside any strand (tests, embedders); strand code waits through
    /// its context instead.
    pub fn wait_blocking(&self) -> Outcome {
        let mut shared = self.inner.shared.lock();
        while !shared.completed {
            self.inner.cond.wait(&mut shared);
        }
        shared.outcome.clone().unwrap_or_else(|| {
            Err(RuntimeError::Trapped {
                message: "completed future with empty outcome".to_string(),
            })
        })
    }

    /// Like `wait_blocking` with a deadline; `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome> {
        let deadline = Instant::now() + timeout;
        let mut shared = self.inner.shared.lock();
        while !shared.completed {
            if self.inner.cond.wait_until(&mut shared, deadline).timed_out() {
                return None;
            }
        }
        shared.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::atomic::AtomicUsize;

    fn detached_future() -> FutureHandle {
        FutureHandle::new(Weak::new(), StrandId(1))
    }

    #[test]
    fn completion_flag_transitions_once() {
        let fut = detached_future();
        assert!(fut.freeze(Ok(Value::Int(1)), false).is_some());
        assert!(fut.freeze(Ok(Value::Int(2)), false).is_none());
        assert_eq!(fut.peek(), Some(Ok(Value::Int(1))));
    }

    #[test]
    fn callback_runs_immediately_when_already_complete() {
        let fut = detached_future();
        fut.freeze(Ok(Value::Unit), false);
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        fut.on_complete(move |outcome| {
            assert_eq!(outcome, &Ok(Value::Unit));
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_fires_once_at_freeze() {
        let fut = detached_future();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        fut.on_complete(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let frozen = fut.freeze(Err(RuntimeError::Application("e".into())), false).unwrap();
        for cb in frozen.callbacks {
            cb(&frozen.outcome);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_freezes_with_cancellation_error() {
        let fut = detached_future();
        assert!(fut.cancel());
        assert!(fut.is_cancelled());
        assert_eq!(fut.peek(), Some(Err(RuntimeError::Cancelled)));
        // late completion from the running strand is discarded
        assert!(fut.freeze(Ok(Value::Int(9)), false).is_none());
        assert_eq!(fut.wait_blocking(), Err(RuntimeError::Cancelled));
    }

    #[test]
    fn cancel_after_completion_is_a_noop() {
        let fut = detached_future();
        fut.freeze(Ok(Value::Int(3)), false);
        assert!(!fut.cancel());
        assert_eq!(fut.peek(), Some(Ok(Value::Int(3))));
    }

    #[test]
    fn wait_timeout_expires_on_incomplete_future() {
        let fut = detached_future();
        assert!(fut.wait_timeout(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn wait_all_state_resolves_exactly_once() {
        let set = WaitAllState::new(StrandId(1), 3);
        set.fill(0, Ok(Value::Int(0)));
        assert!(!set.complete_one());
        set.fill(1, Ok(Value::Int(1)));
        assert!(!set.complete_one());
        set.fill(2, Ok(Value::Int(2)));
        assert!(set.complete_one());
        let outcomes = set.collect();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[2], Ok(Value::Int(2)));
    }

    #[test]
    fn wait_any_state_single_winner() {
        let set = WaitAnyState::new(StrandId(1));
        assert!(set.try_win());
        assert!(!set.try_win());
    }
}
