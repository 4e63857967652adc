//! Weft runtime execution core.
//!
//! A cooperative scheduler designed for:
//! - Many lightweight strands over a bounded carrier-thread pool
//! - Non-blocking async invocation and join of function values
//! - Bridging asynchronous native operations without occupying carriers
//! - One uniform propagation path for native and language-level errors
//!
//! Parsing, type checking, code generation and concrete stdlib
//! connectors live elsewhere; they consume the contract exposed here
//! (submit, park/resume, wait, iterate).

pub mod bridge;
pub mod combinator;
pub mod error;
pub mod events;
pub mod future;
pub mod scheduler;
pub mod strand;
pub mod value;

pub use bridge::{NativeOp, ResumeHandle};
pub use combinator::{invoke_iteratively, ElementAccessor, ElementSink, IterComplete};
pub use error::{ErrorOrigin, RuntimeError};
pub use events::{EventSink, StrandEvent};
pub use future::{FutureHandle, WaitStatus};
pub use scheduler::{Scheduler, SchedulerConfig, StrandCtx};
pub use strand::{ExitKind, Resumption, StrandId, StrandState};
pub use value::{FunctionValue, Outcome, StepResult, StrandBody, Value};
