//! Language values and function values.
//!
//! The scheduler treats values opaquely: coercions and zero values are
//! supplied by the type system before a call ever reaches the core. What
//! matters here is that values cross carrier threads, so everything in
//! this module is `Send`.

use std::fmt;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::scheduler::StrandCtx;

/// Outcome of a strand or of a single element invocation.
pub type Outcome = Result<Value, RuntimeError>;

/// The value repertoire that crosses scheduler boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Result of running one step of a strand body.
///
/// A step runs uninterrupted on its carrier thread; the returned variant
/// tells the carrier what to do with the strand next.
pub enum StepResult {
    /// The strand finished with a result or an error.
    Done(Outcome),
    /// Explicit cooperative yield; re-enqueue at the tail of the ready
    /// queue.
    Yielded,
    /// The strand suspended itself during this step (a wait or a park).
    /// The carrier releases it without re-enqueueing.
    Pending,
}

/// A resumable strand body.
///
/// Generated code compiles each function into a state machine whose
/// `step` runs from one suspension point to the next. A step that calls
/// a suspending operation on the context must return
/// [`StepResult::Pending`]; on the next step the outcome is available
/// through [`StrandCtx::take_resumption`].
pub trait StrandBody: Send {
    fn step(&mut self, cx: &mut StrandCtx<'_>) -> StepResult;
}

/// A native function body: runs to completion within a single slice.
pub type NativeFn = dyn Fn(&mut StrandCtx<'_>, &[Value]) -> Outcome + Send + Sync;

/// Factory producing a fresh body state machine for one invocation.
pub type BodyFactory = dyn Fn(Vec<Value>) -> Box<dyn StrandBody> + Send + Sync;

enum FunctionKind {
    Native(Arc<NativeFn>),
    Resumable(Arc<BodyFactory>),
}

/// A callable function value, invokable through the scheduler.
pub struct FunctionValue {
    pub name: String,
    kind: FunctionKind,
}

impl FunctionValue {
    /// A function that runs to completion in one slice. It may spawn
    /// async children but cannot itself suspend.
    pub fn native(
        name: impl Into<String>,
        f: impl Fn(&mut StrandCtx<'_>, &[Value]) -> Outcome + Send + Sync + 'static,
    ) -> Arc<FunctionValue> {
        Arc::new(FunctionValue {
            name: name.into(),
            kind: FunctionKind::Native(Arc::new(f)),
        })
    }

    /// A function compiled to a resumable state machine.
    pub fn resumable(
        name: impl Into<String>,
        factory: impl Fn(Vec<Value>) -> Box<dyn StrandBody> + Send + Sync + 'static,
    ) -> Arc<FunctionValue> {
        Arc::new(FunctionValue {
            name: name.into(),
            kind: FunctionKind::Resumable(Arc::new(factory)),
        })
    }

    /// Build the body for one invocation with the given arguments.
    pub(crate) fn instantiate(&self, args: Vec<Value>) -> Box<dyn StrandBody> {
        match &self.kind {
            FunctionKind::Native(f) => Box::new(NativeBody {
                func: f.clone(),
                args,
            }),
            FunctionKind::Resumable(factory) => factory(args),
        }
    }

    /// The native closure, if this is a native function.
    pub(crate) fn as_native(&self) -> Option<Arc<NativeFn>> {
        match &self.kind {
            FunctionKind::Native(f) => Some(f.clone()),
            FunctionKind::Resumable(_) => None,
        }
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name)
    }
}

/// Adapter running a native function as a single-step body.
struct NativeBody {
    func: Arc<NativeFn>,
    args: Vec<Value>,
}

impl StrandBody for NativeBody {
    fn step(&mut self, cx: &mut StrandCtx<'_>) -> StepResult {
        StepResult::Done((self.func)(cx, &self.args))
    }
}
