//! Fire-and-forget scheduler event notifications.
//!
//! The observability layer subscribes through an unbounded channel and
//! may be absent entirely; the core never blocks on it and drops events
//! when nobody is listening.

use crossbeam::channel::{self, Receiver, Sender};

use crate::strand::StrandId;

/// Best-effort notification keyed by strand metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrandEvent {
    Spawned {
        id: StrandId,
        name: String,
        parent: Option<StrandId>,
    },
    Yielded {
        id: StrandId,
    },
    Parked {
        id: StrandId,
    },
    Resumed {
        id: StrandId,
    },
    Completed {
        id: StrandId,
        success: bool,
    },
    Violation {
        detail: String,
    },
}

/// Sink side held by the scheduler.
#[derive(Clone)]
pub struct EventSink {
    tx: Option<Sender<StrandEvent>>,
}

impl EventSink {
    /// A sink that drops everything.
    pub fn disabled() -> Self {
        EventSink { tx: None }
    }

    /// A connected sink plus its receiver.
    pub fn channel() -> (Self, Receiver<StrandEvent>) {
        let (tx, rx) = channel::unbounded();
        (EventSink { tx: Some(tx) }, rx)
    }

    /// Emit an event; never blocks, ignores a departed receiver.
    pub(crate) fn emit(&self, event: StrandEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
