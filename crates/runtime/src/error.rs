//! Runtime error representation.
//!
//! Every failure that crosses a strand boundary is expressed as a
//! `RuntimeError`, whether it started life as an explicit language-level
//! error value, a panic inside native code, or a cancelled future. The
//! trap functions at the bottom of this module are the single place where
//! foreign failures (panics) are converted into this representation.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};

use crate::strand::StrandId;

/// Uniform error type for strand execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// Explicit language-level error value.
    #[error("{0}")]
    Application(String),

    /// Runtime-internal failure trapped at a strand boundary
    /// (panic, resource exhaustion, scheduler defect).
    #[error("trapped runtime failure: {message}")]
    Trapped { message: String },

    /// The future being waited on was cancelled before completion.
    #[error("future was cancelled")]
    Cancelled,

    /// A connector broke the park/resume contract (double resume,
    /// resume of a strand that is not blocked). Not recoverable at the
    /// call site; the duplicate call is rejected.
    #[error("scheduling protocol violation: {0}")]
    ProtocolViolation(String),

    /// Strand id no longer resolves in the scheduler registry.
    #[error("strand not found: {0}")]
    StrandNotFound(StrandId),

    /// Submit attempted against a scheduler that is shutting down.
    #[error("scheduler is shutting down")]
    ShuttingDown,

    /// An error annotated with the stack trace captured where it was
    /// trapped.
    #[error("{error}\nstack trace:\n{stack_trace}")]
    WithStackTrace {
        error: Box<RuntimeError>,
        stack_trace: String,
    },
}

/// Reason code distinguishing how an error entered the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// Ordinary application error value.
    Application,
    /// Runtime-internal failure.
    Internal,
    /// Cancellation of a pending future.
    Cancellation,
}

impl RuntimeError {
    /// Attach a stack trace to this error.
    pub fn with_stack_trace(self, stack_trace: String) -> RuntimeError {
        RuntimeError::WithStackTrace {
            error: Box::new(self),
            stack_trace,
        }
    }

    /// The underlying error, unwrapping any stack-trace annotation.
    pub fn root(&self) -> &RuntimeError {
        match self {
            RuntimeError::WithStackTrace { error, .. } => error.root(),
            other => other,
        }
    }

    /// Reason code for this error.
    pub fn origin(&self) -> ErrorOrigin {
        match self.root() {
            RuntimeError::Application(_) => ErrorOrigin::Application,
            RuntimeError::Cancelled => ErrorOrigin::Cancellation,
            RuntimeError::Trapped { .. }
            | RuntimeError::ProtocolViolation(_)
            | RuntimeError::StrandNotFound(_)
            | RuntimeError::ShuttingDown => ErrorOrigin::Internal,
            // root() never returns the wrapper itself
            RuntimeError::WithStackTrace { .. } => ErrorOrigin::Internal,
        }
    }

    /// Stack trace attached to this error, if any.
    pub fn stack_trace(&self) -> Option<&str> {
        match self {
            RuntimeError::WithStackTrace { stack_trace, .. } => Some(stack_trace),
            _ => None,
        }
    }
}

/// Convert a panic payload into a trapped error with a captured backtrace.
pub(crate) fn trap_panic(payload: Box<dyn Any + Send>) -> RuntimeError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    };
    RuntimeError::Trapped { message }
        .with_stack_trace(Backtrace::force_capture().to_string())
}

/// Run `f`, trapping any panic as a `RuntimeError`.
pub(crate) fn catch<R>(f: impl FnOnce() -> R) -> Result<R, RuntimeError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(trap_panic)
}
