//! Strand: a lightweight, schedulable unit of language-level execution.
//!
//! Each strand has:
//! - A unique monotonic id and a name (given or synthesized)
//! - A state machine driven cooperatively by the carrier threads
//! - A write-once terminal outcome slot
//! - Id back-references to its parent and spawned children
//!
//! Strands live in the scheduler's registry arena behind
//! `Arc<Mutex<Strand>>` handles; parent/child relationships are ids,
//! never owning pointers, so no reference cycles can form.

use std::collections::HashSet;
use std::fmt;

use log::warn;
use smallvec::SmallVec;

use crate::future::FutureHandle;
use crate::value::{Outcome, StrandBody};

/// Unique strand identifier, monotonically allocated by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrandId(pub u64);

impl fmt::Display for StrandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strand-{}", self.0)
    }
}

/// Terminal flavor of a completed strand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Success,
    Error,
}

/// Strand execution state.
///
/// `Runnable` covers both "queued" and "executing on a carrier"; the
/// registry handle lock guarantees at most one carrier executes a given
/// strand at any instant. `Yielded` is transient: a yielding strand is
/// re-enqueued at the tail and becomes `Runnable` again immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrandState {
    Runnable,
    Yielded,
    Blocked,
    Done(ExitKind),
}

/// Value delivered to a strand when it is re-enqueued after a suspension.
#[derive(Debug)]
pub enum Resumption {
    /// Outcome of a blocking-bridge native operation.
    Native(Outcome),
    /// Outcome of a single-future wait.
    WaitOne(Outcome),
    /// Outcomes of a wait-all, in call order.
    WaitAll(Vec<Outcome>),
    /// First completion of a wait-any.
    WaitAny { index: usize, outcome: Outcome },
}

/// Scheduling fields saved around a nested native call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SavedExternState {
    pub state: StrandState,
    pub blocked_on_extern: bool,
}

pub struct Strand {
    pub id: StrandId,
    pub name: String,
    pub state: StrandState,
    /// Back-reference only; the parent does not own this strand.
    pub parent: Option<StrandId>,
    /// Ids of spawned children that have not yet reached `Done`.
    pub children: HashSet<StrandId>,
    /// Set while the strand is inside (or blocked on) a native call.
    pub blocked_on_extern: bool,
    /// Saved scheduling state for nested native calls, innermost last.
    pub(crate) extern_checkpoints: SmallVec<[SavedExternState; 2]>,
    /// The resumable body; taken by the carrier while a step runs.
    pub(crate) body: Option<Box<dyn StrandBody>>,
    /// Pending resumption attached by `resume`/wait completion.
    pub(crate) resumption: Option<Resumption>,
    /// Sequence number of the current park; each park invalidates any
    /// resume handle issued for an earlier one.
    pub(crate) park_seq: u64,
    /// Future completed when this strand reaches its terminal state.
    pub(crate) future: Option<FutureHandle>,
    /// Write-once terminal outcome.
    result: Option<Outcome>,
}

impl Strand {
    pub(crate) fn new(
        id: StrandId,
        name: Option<String>,
        parent: Option<StrandId>,
        body: Box<dyn StrandBody>,
    ) -> Self {
        Strand {
            id,
            name: name.unwrap_or_else(|| id.to_string()),
            state: StrandState::Runnable,
            parent,
            children: HashSet::new(),
            blocked_on_extern: false,
            extern_checkpoints: SmallVec::new(),
            body: Some(body),
            resumption: None,
            park_seq: 0,
            future: None,
            result: None,
        }
    }

    /// Whether this strand has reached its terminal state.
    pub fn is_done(&self) -> bool {
        matches!(self.state, StrandState::Done(_))
    }

    /// Terminal outcome, if the strand is done.
    pub fn result(&self) -> Option<&Outcome> {
        self.result.as_ref()
    }

    /// Move to `Done`, writing the terminal slot exactly once. A second
    /// write is discarded.
    pub(crate) fn complete(&mut self, outcome: Outcome) {
        if self.result.is_some() {
            warn!("{}: terminal outcome written twice, discarding", self.id);
            return;
        }
        let kind = if outcome.is_ok() {
            ExitKind::Success
        } else {
            ExitKind::Error
        };
        self.state = StrandState::Done(kind);
        self.blocked_on_extern = false;
        self.result = Some(outcome);
    }

    /// Transition to `Blocked` for a bridge park, invalidating any
    /// earlier resume handle. Returns the new park sequence.
    pub(crate) fn park(&mut self) -> u64 {
        self.park_seq += 1;
        self.state = StrandState::Blocked;
        self.blocked_on_extern = true;
        self.park_seq
    }

    /// Attach a resumption and become runnable again.
    pub(crate) fn attach_resumption(&mut self, resumption: Resumption) {
        self.resumption = Some(resumption);
        self.blocked_on_extern = false;
        self.state = StrandState::Runnable;
    }

    /// Take the resumption delivered by the last resume, if any.
    pub(crate) fn take_resumption(&mut self) -> Option<Resumption> {
        self.resumption.take()
    }

    /// Push the current scheduling state before a nested native call.
    pub(crate) fn push_extern_checkpoint(&mut self) {
        self.extern_checkpoints.push(SavedExternState {
            state: self.state,
            blocked_on_extern: self.blocked_on_extern,
        });
        self.blocked_on_extern = true;
    }

    /// Restore the innermost checkpoint. Runs on every exit path of a
    /// nested native call, including failure; a strand that completed
    /// during the nested call keeps its terminal state.
    pub(crate) fn pop_extern_checkpoint(&mut self) {
        if let Some(saved) = self.extern_checkpoints.pop() {
            self.blocked_on_extern = saved.blocked_on_extern;
            if !self.is_done() {
                self.state = saved.state;
            }
        } else {
            warn!("{}: extern checkpoint pop without matching push", self.id);
        }
    }
}

impl fmt::Debug for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strand")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("parent", &self.parent)
            .field("blocked_on_extern", &self.blocked_on_extern)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuntimeError;
    use crate::value::{StepResult, Value};

    struct Noop;
    impl StrandBody for Noop {
        fn step(&mut self, _cx: &mut crate::scheduler::StrandCtx<'_>) -> StepResult {
            StepResult::Done(Ok(Value::Unit))
        }
    }

    fn strand() -> Strand {
        Strand::new(StrandId(7), None, None, Box::new(Noop))
    }

    #[test]
    fn synthesized_name() {
        assert_eq!(strand().name, "strand-7");
        let named = Strand::new(StrandId(8), Some("worker".into()), None, Box::new(Noop));
        assert_eq!(named.name, "worker");
    }

    #[test]
    fn terminal_slot_is_write_once() {
        let mut s = strand();
        s.complete(Ok(Value::Int(1)));
        assert_eq!(s.state, StrandState::Done(ExitKind::Success));
        s.complete(Err(RuntimeError::Application("late".into())));
        assert_eq!(s.result(), Some(&Ok(Value::Int(1))));
        assert_eq!(s.state, StrandState::Done(ExitKind::Success));
    }

    #[test]
    fn park_invalidates_previous_sequence() {
        let mut s = strand();
        let first = s.park();
        s.attach_resumption(Resumption::Native(Ok(Value::Unit)));
        let second = s.park();
        assert!(second > first);
        assert_eq!(s.state, StrandState::Blocked);
        assert!(s.blocked_on_extern);
    }

    #[test]
    fn extern_checkpoint_restores_on_pop() {
        let mut s = strand();
        s.state = StrandState::Runnable;
        s.push_extern_checkpoint();
        assert!(s.blocked_on_extern);
        s.state = StrandState::Blocked;
        s.pop_extern_checkpoint();
        assert!(!s.blocked_on_extern);
        assert_eq!(s.state, StrandState::Runnable);
    }

    #[test]
    fn extern_checkpoint_keeps_terminal_state() {
        let mut s = strand();
        s.push_extern_checkpoint();
        s.complete(Err(RuntimeError::Application("died inside".into())));
        s.pop_extern_checkpoint();
        assert!(s.is_done());
    }
}
