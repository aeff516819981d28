//! Feedback coordination: debounce and completion barrier.
//!
//! Both sit between the bus and the OODA machine.  The debouncer collapses a
//! burst of action-feedback events into the single most recent one; the
//! barrier holds a turn open until every `require_feedback` action reports
//! or a timeout fires.  Each is a thin layer over [`OneShot`].

use std::collections::BTreeSet;
use std::time::Duration;

use botmind_types::BotEvent;
use tokio::sync::mpsc;
use tracing::debug;

use crate::timers::OneShot;

// ─────────────────────────────────────────────────────────────────────────────
// Debouncer
// ─────────────────────────────────────────────────────────────────────────────

/// Collapses bursts of events: only the last event of a quiet-period window
/// reaches the sink.
pub struct Debouncer {
    duration: Duration,
    timer: OneShot,
    sink: mpsc::UnboundedSender<BotEvent>,
}

impl Debouncer {
    /// Events that survive debouncing are sent on the returned receiver.
    pub fn new(duration: Duration) -> (Self, mpsc::UnboundedReceiver<BotEvent>) {
        let (sink, rx) = mpsc::unbounded_channel();
        (
            Self {
                duration,
                timer: OneShot::new(),
                sink,
            },
            rx,
        )
    }

    /// Accept an event; it will be delivered after the quiet period unless a
    /// newer event replaces it first.
    pub fn push(&mut self, event: BotEvent) {
        let sink = self.sink.clone();
        self.timer.schedule(self.duration, move || {
            let _ = sink.send(event);
        });
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Barrier
// ─────────────────────────────────────────────────────────────────────────────

/// Notice that a barrier expired before every action reported.  Carries the
/// id set the barrier was armed with; the receiver should call
/// [`Barrier::clear`] and consult its own pending bookkeeping for the
/// stragglers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierExpired {
    pub armed: BTreeSet<u64>,
}

/// Waits for a set of action ids to report, bounded by a timeout.
pub struct Barrier {
    duration: Duration,
    waiting: BTreeSet<u64>,
    timer: OneShot,
    expiry: mpsc::UnboundedSender<BarrierExpired>,
}

impl Barrier {
    /// Expiry notices are delivered on the returned receiver.
    pub fn new(duration: Duration) -> (Self, mpsc::UnboundedReceiver<BarrierExpired>) {
        let (expiry, rx) = mpsc::unbounded_channel();
        (
            Self {
                duration,
                waiting: BTreeSet::new(),
                timer: OneShot::new(),
                expiry,
            },
            rx,
        )
    }

    /// Arm the barrier over `ids`.  An empty set is a no-op.
    pub fn arm(&mut self, ids: BTreeSet<u64>) {
        if ids.is_empty() {
            return;
        }
        debug!(?ids, "arming feedback barrier");
        self.waiting = ids.clone();
        let expiry = self.expiry.clone();
        self.timer.schedule(self.duration, move || {
            let _ = expiry.send(BarrierExpired { armed: ids });
        });
    }

    /// Record that `id` reported.  Returns `true` when this report cleared
    /// the barrier (all ids accounted for).
    pub fn report(&mut self, id: u64) -> bool {
        if !self.waiting.remove(&id) {
            return false;
        }
        if self.waiting.is_empty() {
            self.timer.cancel();
            return true;
        }
        false
    }

    /// Drop the barrier unconditionally (expiry arrived, or shutdown).
    pub fn clear(&mut self) {
        self.waiting.clear();
        self.timer.cancel();
    }

    pub fn is_armed(&self) -> bool {
        !self.waiting.is_empty()
    }
}
