//! Blocking bridge: suspend/resume glue for asynchronous native
//! operations.
//!
//! A strand that invokes a native operation parks itself, releasing its
//! carrier thread, and hands the operation a [`ResumeHandle`]. The native
//! layer must fire the handle exactly once, from any thread, with the
//! operation's outcome; the strand is then re-enqueued with that outcome
//! attached. Never firing leaks the strand permanently; firing twice is
//! a protocol violation and the second call is rejected.
//!
//! The [`NativeDriver`] runs the native side: a dedicated tokio runtime
//! fed through an unbounded request channel, so native work never
//! occupies a carrier thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::error::RuntimeError;
use crate::scheduler::Scheduler;
use crate::strand::{Resumption, StrandId};
use crate::value::Outcome;

/// One-shot resume callback bound to a parked strand.
///
/// Cloneable so a connector can thread it through its own callbacks; all
/// clones share the same once-flag.
#[derive(Clone)]
pub struct ResumeHandle {
    scheduler: Arc<Scheduler>,
    strand: StrandId,
    seq: u64,
    fired: Arc<AtomicBool>,
}

impl ResumeHandle {
    pub(crate) fn new(scheduler: Arc<Scheduler>, strand: StrandId, seq: u64) -> Self {
        ResumeHandle {
            scheduler,
            strand,
            seq,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The strand this handle resumes.
    pub fn strand_id(&self) -> StrandId {
        self.strand
    }

    /// Re-enqueue the parked strand with the native operation's outcome.
    ///
    /// Must be called exactly once. A second call is rejected with
    /// `ProtocolViolation` and leaves scheduler state untouched.
    pub fn resume(&self, outcome: Outcome) -> Result<(), RuntimeError> {
        if self.fired.swap(true, Ordering::SeqCst) {
            let detail = format!("{}: resume handle fired twice", self.strand);
            warn!("{}", detail);
            return Err(RuntimeError::ProtocolViolation(detail));
        }
        self.scheduler
            .resume_parked(self.strand, self.seq, Resumption::Native(outcome))
    }

    /// Convenience for the failure path of a native operation.
    pub fn resume_error(&self, error: RuntimeError) -> Result<(), RuntimeError> {
        self.resume(Err(error))
    }
}

/// A native operation: receives the resume handle and arranges for it to
/// fire when the operation completes.
pub type NativeOp = Box<dyn FnOnce(ResumeHandle) + Send + 'static>;

enum DriverRequest {
    Run { op: NativeOp, handle: ResumeHandle },
    Shutdown,
}

/// Executes native operations off the carrier pool.
pub struct NativeDriver {
    runtime: Mutex<Option<Runtime>>,
    request_tx: mpsc::UnboundedSender<DriverRequest>,
}

impl NativeDriver {
    pub(crate) fn new() -> Self {
        let runtime = Runtime::new().expect("failed to create native driver runtime");
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        runtime.spawn(Self::run_handler(request_rx));
        NativeDriver {
            runtime: Mutex::new(Some(runtime)),
            request_tx,
        }
    }

    /// The request handler loop running on the driver runtime. Each
    /// operation runs on the blocking pool: operations are allowed to
    /// block, only carriers are not.
    async fn run_handler(mut request_rx: mpsc::UnboundedReceiver<DriverRequest>) {
        while let Some(request) = request_rx.recv().await {
            match request {
                DriverRequest::Run { op, handle } => {
                    tokio::task::spawn_blocking(move || op(handle));
                }
                DriverRequest::Shutdown => break,
            }
        }
    }

    /// Ship a native operation to the driver.
    pub(crate) fn dispatch(&self, op: NativeOp, handle: ResumeHandle) {
        if self
            .request_tx
            .send(DriverRequest::Run { op, handle })
            .is_err()
        {
            warn!("native driver is gone; dropping operation");
        }
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.request_tx.send(DriverRequest::Shutdown);
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}
