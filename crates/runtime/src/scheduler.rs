//! The scheduler: a fixed pool of carrier threads running strands
//! cooperatively.
//!
//! The scheduler manages:
//! - Strand registry (id -> handle arena)
//! - Ready queue (global injector + per-carrier deques with stealing)
//! - Spawning, terminal completion and future/waiter notification
//! - The blocking-bridge resume path
//!
//! Scheduling is cooperative and non-preemptive: a dequeued strand runs
//! uninterrupted to its next explicit suspension point (a wait, a bridge
//! park, a voluntary yield or completion). Each handle's mutex makes
//! dequeue-and-execute mutually exclusive per strand, and a strand is
//! enqueued only on its transition to `Runnable`, so it appears in the
//! ready queue at most once.
//!
//! There is no process-wide instance: schedulers are constructed
//! explicitly and `Arc`-shared, so tests can run several side by side.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::deque::{Injector, Steal, Stealer, Worker as WorkQueue};
use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::bridge::{NativeDriver, ResumeHandle};
use crate::error::{self, RuntimeError};
use crate::events::{EventSink, StrandEvent};
use crate::future::{FrozenFuture, FutureHandle, WaitAllState, WaitAnyState, WaitStatus, Waiter};
use crate::strand::{Resumption, Strand, StrandId, StrandState};
use crate::value::{FunctionValue, Outcome, StepResult, Value};

thread_local! {
    /// Strand bound to the current carrier thread while a step runs.
    static CURRENT_STRAND: Cell<Option<StrandId>> = const { Cell::new(None) };
}

/// Shared handle to a registered strand.
pub(crate) type StrandHandle = Arc<Mutex<Strand>>;

/// Configuration for a scheduler instance.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Number of carrier threads (0 = use available CPUs).
    pub carrier_threads: usize,
    /// Sleep between polls when a carrier finds no work.
    pub idle_poll: Duration,
    /// Name prefix for carrier threads.
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            carrier_threads: 0, // auto-detect
            idle_poll: Duration::from_micros(100),
            thread_name_prefix: "weft-carrier".to_string(),
        }
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    /// Arena of live strands; entries are reclaimed at the terminal
    /// transition.
    registry: Mutex<HashMap<StrandId, StrandHandle>>,
    /// Global ready queue (FIFO).
    injector: Injector<StrandId>,
    /// Stealers for each carrier's local deque.
    stealers: Vec<Stealer<StrandId>>,
    /// Carrier thread handles, taken by `shutdown`.
    carriers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: AtomicBool,
    next_id: AtomicU64,
    driver: NativeDriver,
    events: EventSink,
}

impl Scheduler {
    /// Create a scheduler with its carrier pool started.
    pub fn new(config: SchedulerConfig) -> Arc<Scheduler> {
        Self::with_events(config, EventSink::disabled())
    }

    /// Create a scheduler that reports strand events to `events`.
    pub fn with_events(config: SchedulerConfig, events: EventSink) -> Arc<Scheduler> {
        let carrier_count = if config.carrier_threads == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        } else {
            config.carrier_threads
        };

        let mut locals = Vec::with_capacity(carrier_count);
        let mut stealers = Vec::with_capacity(carrier_count);
        for _ in 0..carrier_count {
            let queue = WorkQueue::new_fifo();
            stealers.push(queue.stealer());
            locals.push(queue);
        }

        let scheduler = Arc::new(Scheduler {
            config: config.clone(),
            registry: Mutex::new(HashMap::new()),
            injector: Injector::new(),
            stealers,
            carriers: Mutex::new(Vec::new()),
            shutdown: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            driver: NativeDriver::new(),
            events,
        });

        let mut handles = Vec::with_capacity(carrier_count);
        for (index, local) in locals.into_iter().enumerate() {
            let carrier = Carrier {
                index,
                local,
                scheduler: Arc::clone(&scheduler),
            };
            let handle = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || carrier.run())
                .expect("failed to spawn carrier thread");
            handles.push(handle);
        }
        *scheduler.carriers.lock() = handles;

        scheduler
    }

    /// Spawn a new strand running `func` and return its join future
    /// without blocking the caller. When invoked from inside a strand,
    /// the new strand records the caller as its parent.
    pub fn submit(self: &Arc<Self>, func: &Arc<FunctionValue>, args: Vec<Value>) -> FutureHandle {
        self.submit_inner(func, args, None, Scheduler::current_strand())
    }

    /// `submit` with an explicit strand name.
    pub fn submit_named(
        self: &Arc<Self>,
        func: &Arc<FunctionValue>,
        args: Vec<Value>,
        name: impl Into<String>,
    ) -> FutureHandle {
        self.submit_inner(func, args, Some(name.into()), Scheduler::current_strand())
    }

    pub(crate) fn submit_inner(
        self: &Arc<Self>,
        func: &Arc<FunctionValue>,
        args: Vec<Value>,
        name: Option<String>,
        parent: Option<StrandId>,
    ) -> FutureHandle {
        let id = StrandId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let future = FutureHandle::new(Arc::downgrade(self), id);

        if self.shutdown.load(Ordering::SeqCst) {
            warn!("submit of {} rejected: scheduler is shutting down", func.name);
            if let Some(frozen) = future.freeze(Err(RuntimeError::ShuttingDown), false) {
                self.release_frozen(frozen);
            }
            return future;
        }

        let mut strand = Strand::new(id, name, parent, func.instantiate(args));
        strand.future = Some(future.clone());
        let strand_name = strand.name.clone();
        self.registry.lock().insert(id, Arc::new(Mutex::new(strand)));
        self.injector.push(id);
        trace!("{} spawned ({})", id, strand_name);
        self.events.emit(StrandEvent::Spawned {
            id,
            name: strand_name,
            parent,
        });
        future
    }

    /// The strand bound to the calling carrier thread. `None` when
    /// invoked outside any strand context; that is a legitimate state,
    /// not a fault.
    pub fn current_strand() -> Option<StrandId> {
        CURRENT_STRAND.with(|c| c.get())
    }

    /// Number of live (non-terminal) strands.
    pub fn strand_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Whether the given strand is still live.
    pub fn is_live(&self, id: StrandId) -> bool {
        self.registry.lock().contains_key(&id)
    }

    /// Number of carrier threads in the pool.
    pub fn carrier_count(&self) -> usize {
        self.stealers.len()
    }

    /// Stop the carrier pool and the native driver. Strands still
    /// blocked on a never-firing bridge callback stay in the registry;
    /// pending ready strands are not drained. Must be called from a
    /// host thread, never from a carrier.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let carriers = std::mem::take(&mut *self.carriers.lock());
        for handle in carriers {
            let _ = handle.join();
        }
        self.driver.shutdown();
    }

    pub(crate) fn strand_handle(&self, id: StrandId) -> Option<StrandHandle> {
        self.registry.lock().get(&id).cloned()
    }

    pub(crate) fn driver(&self) -> &NativeDriver {
        &self.driver
    }

    // ------------------------------------------------------------------
    // Terminal completion and waiter routing
    // ------------------------------------------------------------------

    /// Move a strand to `Done`, notify its future and parent, and
    /// reclaim its registry entry.
    pub(crate) fn finish_strand(&self, handle: &StrandHandle, outcome: Outcome) {
        let (id, parent, future, success) = {
            let mut strand = handle.lock();
            let success = outcome.is_ok();
            strand.complete(outcome.clone());
            (strand.id, strand.parent, strand.future.clone(), success)
        };
        if let Some(future) = future {
            // Discarded silently if the future was cancelled first.
            if let Some(frozen) = future.freeze(outcome, false) {
                self.release_frozen(frozen);
            }
        }
        if let Some(parent_id) = parent {
            if let Some(parent) = self.strand_handle(parent_id) {
                parent.lock().children.remove(&id);
            }
        }
        self.registry.lock().remove(&id);
        debug!("{} done (success: {})", id, success);
        self.events.emit(StrandEvent::Completed { id, success });
    }

    /// Cancel a future: freeze it with a cancellation error and release
    /// its waiters with that error. Returns false if it had already
    /// completed.
    pub(crate) fn cancel_future(&self, future: &FutureHandle) -> bool {
        match future.freeze(Err(RuntimeError::Cancelled), true) {
            Some(frozen) => {
                debug!("future for {} cancelled", future.strand_id());
                self.release_frozen(frozen);
                true
            }
            None => false,
        }
    }

    /// Run completion callbacks and route waiters after a freeze. Runs
    /// outside the future's lock.
    pub(crate) fn release_frozen(&self, frozen: FrozenFuture) {
        for cb in frozen.callbacks {
            cb(&frozen.outcome);
        }
        for waiter in frozen.waiters {
            self.route_waiter(waiter, &frozen.outcome);
        }
    }

    fn route_waiter(&self, waiter: Waiter, outcome: &Outcome) {
        match waiter {
            Waiter::One { strand } => {
                self.deliver_wait(strand, Resumption::WaitOne(outcome.clone()));
            }
            Waiter::All { set, index } => {
                set.fill(index, outcome.clone());
                if set.complete_one() {
                    let outcomes = set.collect();
                    self.deliver_wait(set.strand, Resumption::WaitAll(outcomes));
                }
            }
            Waiter::Any { set, index } => {
                if set.try_win() {
                    self.deliver_wait(
                        set.strand,
                        Resumption::WaitAny {
                            index,
                            outcome: outcome.clone(),
                        },
                    );
                }
            }
        }
    }

    /// Re-enqueue a strand parked on a wait, with its resumption
    /// attached.
    fn deliver_wait(&self, id: StrandId, resumption: Resumption) {
        let Some(handle) = self.strand_handle(id) else {
            warn!("{}: wait delivery to reclaimed strand", id);
            return;
        };
        {
            let mut strand = handle.lock();
            if strand.state != StrandState::Blocked {
                warn!(
                    "{}: wait delivery to non-blocked strand (state {:?})",
                    id, strand.state
                );
                return;
            }
            strand.attach_resumption(resumption);
        }
        self.injector.push(id);
        self.events.emit(StrandEvent::Resumed { id });
    }

    /// Bridge resume path: re-enqueue a strand parked by `park`. The
    /// park sequence ties the resume to one specific park; a stale or
    /// misdirected resume is a protocol violation.
    pub(crate) fn resume_parked(
        &self,
        id: StrandId,
        seq: u64,
        resumption: Resumption,
    ) -> Result<(), RuntimeError> {
        let Some(handle) = self.strand_handle(id) else {
            warn!("{}: resume of unknown or reclaimed strand", id);
            self.events.emit(StrandEvent::Violation {
                detail: format!("{}: resume of unknown or reclaimed strand", id),
            });
            return Err(RuntimeError::StrandNotFound(id));
        };
        {
            let mut strand = handle.lock();
            if strand.state != StrandState::Blocked || strand.park_seq != seq {
                let detail = format!(
                    "{}: resume of a strand that is not parked (state {:?})",
                    id, strand.state
                );
                warn!("{}", detail);
                self.events.emit(StrandEvent::Violation {
                    detail: detail.clone(),
                });
                return Err(RuntimeError::ProtocolViolation(detail));
            }
            strand.attach_resumption(resumption);
        }
        self.injector.push(id);
        self.events.emit(StrandEvent::Resumed { id });
        Ok(())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Carriers hold Arcs, so by the time this runs they are gone;
        // make sure the driver runtime is released as well.
        self.driver.shutdown();
    }
}

// ----------------------------------------------------------------------
// Carrier threads
// ----------------------------------------------------------------------

/// A single carrier thread.
struct Carrier {
    index: usize,
    /// Local ready deque (FIFO).
    local: WorkQueue<StrandId>,
    scheduler: Arc<Scheduler>,
}

impl Carrier {
    fn run(self) {
        trace!("carrier {} started", self.index);
        while !self.scheduler.shutdown.load(Ordering::Relaxed) {
            match self.find_work() {
                Some(id) => self.execute_strand(id),
                None => thread::sleep(self.scheduler.config.idle_poll),
            }
        }
        trace!("carrier {} stopped", self.index);
    }

    /// Find work: local deque -> global injector -> steal from siblings.
    fn find_work(&self) -> Option<StrandId> {
        if let Some(id) = self.local.pop() {
            return Some(id);
        }

        loop {
            match self.scheduler.injector.steal_batch_and_pop(&self.local) {
                Steal::Success(id) => return Some(id),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        let count = self.scheduler.stealers.len();
        for i in 0..count {
            let idx = (self.index + i + 1) % count;
            if idx == self.index {
                continue;
            }
            loop {
                match self.scheduler.stealers[idx].steal() {
                    Steal::Success(id) => return Some(id),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }

    /// Run one step of a strand: from here to its next suspension point,
    /// yield, or completion. The handle lock is held for the whole step.
    fn execute_strand(&self, id: StrandId) {
        let Some(handle) = self.scheduler.strand_handle(id) else {
            // Reclaimed between enqueue and dequeue (e.g. cancelled out).
            return;
        };
        let mut strand = handle.lock();
        if strand.state != StrandState::Runnable {
            warn!("{}: dequeued in state {:?}, skipping", id, strand.state);
            return;
        }
        let Some(mut body) = strand.body.take() else {
            drop(strand);
            self.scheduler.finish_strand(
                &handle,
                Err(RuntimeError::Trapped {
                    message: "strand body missing at dispatch".to_string(),
                }),
            );
            return;
        };

        CURRENT_STRAND.with(|c| c.set(Some(id)));
        let step = {
            let mut cx = StrandCtx {
                scheduler: &self.scheduler,
                strand: &mut strand,
            };
            // The error trap: a panic anywhere in the step becomes the
            // strand's terminal error instead of unwinding the carrier.
            error::catch(|| body.step(&mut cx)).unwrap_or_else(|err| StepResult::Done(Err(err)))
        };
        CURRENT_STRAND.with(|c| c.set(None));

        match step {
            StepResult::Done(outcome) => {
                drop(strand);
                self.scheduler.finish_strand(&handle, outcome);
            }
            StepResult::Yielded => {
                // Yielded is transient: straight back to Runnable at the
                // tail of the local queue.
                body_back(&mut strand, body);
                strand.state = StrandState::Runnable;
                drop(strand);
                self.scheduler.events.emit(StrandEvent::Yielded { id });
                self.local.push(id);
            }
            StepResult::Pending => {
                // The step parked the strand (wait or bridge). A racing
                // completion may already have flipped it back to
                // Runnable and enqueued it; either way the carrier just
                // lets go.
                body_back(&mut strand, body);
                drop(strand);
                self.scheduler.events.emit(StrandEvent::Parked { id });
            }
        }
    }
}

fn body_back(strand: &mut Strand, body: Box<dyn crate::value::StrandBody>) {
    strand.body = Some(body);
}

// ----------------------------------------------------------------------
// Strand execution context
// ----------------------------------------------------------------------

/// The surface a strand body executes against: spawn, wait, park, and
/// resumption access. Borrows the strand exclusively for the duration of
/// one step.
pub struct StrandCtx<'a> {
    pub(crate) scheduler: &'a Arc<Scheduler>,
    pub(crate) strand: &'a mut Strand,
}

impl<'a> StrandCtx<'a> {
    pub fn strand_id(&self) -> StrandId {
        self.strand.id
    }

    pub fn strand_name(&self) -> &str {
        &self.strand.name
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        self.scheduler
    }

    /// Outcome attached by the resume that woke this strand, if any.
    /// Taken once; the slot is cleared.
    pub fn take_resumption(&mut self) -> Option<Resumption> {
        self.strand.take_resumption()
    }

    /// Async-call: spawn a child strand and return its future
    /// immediately without blocking.
    pub fn spawn(&mut self, func: &Arc<FunctionValue>, args: Vec<Value>) -> FutureHandle {
        let future = self
            .scheduler
            .submit_inner(func, args, None, Some(self.strand.id));
        self.strand.children.insert(future.strand_id());
        future
    }

    /// Wait on a single future. If it is already complete the outcome
    /// comes back `Ready` and the strand continues without ever leaving
    /// its carrier; otherwise the strand parks and the body must return
    /// [`StepResult::Pending`].
    pub fn wait_one(&mut self, future: &FutureHandle) -> WaitStatus<Outcome> {
        match future.register_one(self.strand.id) {
            Some(outcome) => WaitStatus::Ready(outcome),
            None => {
                self.strand.state = StrandState::Blocked;
                WaitStatus::Parked
            }
        }
    }

    /// Wait until every future completes; outcomes aggregate in call
    /// order. Resolution is exactly-once even when completions race the
    /// registration scan.
    pub fn wait_all(&mut self, futures: &[FutureHandle]) -> WaitStatus<Vec<Outcome>> {
        if futures.is_empty() {
            return WaitStatus::Ready(Vec::new());
        }
        let set = Arc::new(WaitAllState::new(self.strand.id, futures.len()));
        self.strand.state = StrandState::Blocked;
        for (index, future) in futures.iter().enumerate() {
            if let Some(outcome) = future.register_all(set.clone(), index) {
                set.fill(index, outcome);
                if set.complete_one() {
                    // Every future was already complete; no park needed.
                    self.strand.state = StrandState::Runnable;
                    return WaitStatus::Ready(set.collect());
                }
            }
        }
        WaitStatus::Parked
    }

    /// Wait until the first future completes; the rest keep running
    /// detached.
    pub fn wait_any(&mut self, futures: &[FutureHandle]) -> WaitStatus<(usize, Outcome)> {
        if futures.is_empty() {
            return WaitStatus::Ready((
                0,
                Err(RuntimeError::Trapped {
                    message: "wait-any over zero futures".to_string(),
                }),
            ));
        }
        let set = Arc::new(WaitAnyState::new(self.strand.id));
        self.strand.state = StrandState::Blocked;
        for (index, future) in futures.iter().enumerate() {
            if let Some(outcome) = future.register_any(set.clone(), index) {
                if set.try_win() {
                    self.strand.state = StrandState::Runnable;
                    return WaitStatus::Ready((index, outcome));
                }
            }
        }
        WaitStatus::Parked
    }

    /// Park this strand for a blocking-bridge operation and get the
    /// resume handle the native layer must fire exactly once. The body
    /// must return [`StepResult::Pending`] after arming the operation.
    pub fn park(&mut self) -> ResumeHandle {
        let seq = self.strand.park();
        ResumeHandle::new(Arc::clone(self.scheduler), self.strand.id, seq)
    }

    /// Park and ship a native operation to the scheduler's native
    /// driver. The operation receives the resume handle and runs off the
    /// carrier pool.
    pub fn block_on_native(&mut self, op: impl FnOnce(ResumeHandle) + Send + 'static) {
        let handle = self.park();
        self.scheduler.driver().dispatch(Box::new(op), handle);
    }

    /// Synchronously invoke a native function from inside this strand,
    /// checkpointing the scheduling state around the nested call. The
    /// checkpoint is restored on every exit path, including panic, so a
    /// failing nested call can never leave the strand inconsistent.
    pub fn invoke_sync(&mut self, func: &Arc<FunctionValue>, args: &[Value]) -> Outcome {
        let Some(native) = func.as_native() else {
            return Err(RuntimeError::Trapped {
                message: format!("{}: nested call target must be a native function", func.name),
            });
        };
        self.with_extern_scope(|cx| {
            error::catch(|| native(cx, args)).unwrap_or_else(|trapped| Err(trapped))
        })
    }

    /// Guaranteed-cleanup scope for a nested native call: pushes an
    /// extern checkpoint, runs `f`, and restores the checkpoint when the
    /// scope ends, panicking or not.
    fn with_extern_scope<R>(&mut self, f: impl FnOnce(&mut StrandCtx<'a>) -> R) -> R {
        struct Restore<'g, 'a> {
            cx: &'g mut StrandCtx<'a>,
        }
        impl Drop for Restore<'_, '_> {
            fn drop(&mut self) {
                self.cx.strand.pop_extern_checkpoint();
            }
        }
        self.strand.push_extern_checkpoint();
        let mut guard = Restore { cx: self };
        f(&mut *guard.cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_scheduler() -> Arc<Scheduler> {
        Scheduler::new(SchedulerConfig {
            carrier_threads: 2,
            ..Default::default()
        })
    }

    #[test]
    fn submit_runs_a_native_function() {
        let scheduler = small_scheduler();
        let double = FunctionValue::native("double", |_cx, args| match args {
            [Value::Int(n)] => Ok(Value::Int(n * 2)),
            _ => Err(RuntimeError::Application("expected one int".into())),
        });
        let fut = scheduler.submit(&double, vec![Value::Int(21)]);
        assert_eq!(fut.wait_blocking(), Ok(Value::Int(42)));
        scheduler.shutdown();
    }

    #[test]
    fn strand_ids_are_unique_and_monotonic() {
        let scheduler = small_scheduler();
        let noop = FunctionValue::native("noop", |_cx, _args| Ok(Value::Unit));
        let a = scheduler.submit(&noop, vec![]);
        let b = scheduler.submit(&noop, vec![]);
        assert!(a.strand_id() < b.strand_id());
        a.wait_blocking().unwrap();
        b.wait_blocking().unwrap();
        scheduler.shutdown();
    }

    #[test]
    fn current_strand_is_none_outside_strand_context() {
        assert_eq!(Scheduler::current_strand(), None);
    }

    #[test]
    fn current_strand_is_set_inside_a_step() {
        let scheduler = small_scheduler();
        let observe = FunctionValue::native("observe", |cx, _args| {
            assert_eq!(Scheduler::current_strand(), Some(cx.strand_id()));
            Ok(Value::Unit)
        });
        scheduler.submit(&observe, vec![]).wait_blocking().unwrap();
        scheduler.shutdown();
    }

    #[test]
    fn registry_is_reclaimed_after_completion() {
        let scheduler = small_scheduler();
        let noop = FunctionValue::native("noop", |_cx, _args| Ok(Value::Unit));
        let fut = scheduler.submit(&noop, vec![]);
        fut.wait_blocking().unwrap();
        // finish_strand removes the entry before completing the future,
        // so by now the arena must be empty.
        assert_eq!(scheduler.strand_count(), 0);
        assert!(!scheduler.is_live(fut.strand_id()));
        scheduler.shutdown();
    }

    #[test]
    fn submit_after_shutdown_fails_fast() {
        let scheduler = small_scheduler();
        scheduler.shutdown();
        let noop = FunctionValue::native("noop", |_cx, _args| Ok(Value::Unit));
        let fut = scheduler.submit(&noop, vec![]);
        assert_eq!(fut.wait_blocking(), Err(RuntimeError::ShuttingDown));
    }

    #[test]
    fn nested_invoke_sync_restores_scheduling_state() {
        let scheduler = small_scheduler();
        let inner = FunctionValue::native("inner", |_cx, _args| {
            Err(RuntimeError::Application("inner failed".into()))
        });
        let panicking = FunctionValue::native("panicking", |_cx, _args| panic!("inner blew up"));
        let outer = FunctionValue::native("outer", move |cx, _args| {
            assert!(!cx.strand.blocked_on_extern);
            let err = cx.invoke_sync(&inner, &[]).unwrap_err();
            assert_eq!(err, RuntimeError::Application("inner failed".into()));
            assert!(!cx.strand.blocked_on_extern);
            // A panicking nested call must restore state too.
            let trapped = cx.invoke_sync(&panicking, &[]).unwrap_err();
            assert!(matches!(trapped.root(), RuntimeError::Trapped { .. }));
            assert!(!cx.strand.blocked_on_extern);
            Ok(Value::Unit)
        });
        scheduler.submit(&outer, vec![]).wait_blocking().unwrap();
        scheduler.shutdown();
    }
}
