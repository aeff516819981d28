//! Headless, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] under the hood so that every subscriber
//! receives every matching event without any single subscriber blocking the
//! others.  Delivery is at-least-once and in-process: FIFO per subscriber,
//! with no ordering guarantee across distinct topics.
//!
//! # Topics
//!
//! Topics are plain strings.  Subscribers filter either by exact topic or by
//! prefix wildcard:
//!
//! | Pattern | Matches |
//! |---|---|
//! | `"perception"` | only the `perception` topic |
//! | `"raw:sighted:*"` | `raw:sighted:sneak_toggle`, `raw:sighted:entity_swing`, … |
//! | `"action:*"` | `action:started`, `action:completed`, `action:failed` |

use botmind_types::{Event, MindError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

// ─────────────────────────────────────────────────────────────────────────────
// Topic patterns
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed subscription filter: exact topic or prefix wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicPattern {
    /// Matches one topic exactly.
    Exact(String),
    /// Matches every topic starting with the prefix (the part before `*`).
    Prefix(String),
}

impl TopicPattern {
    /// Parse a pattern string.  A trailing `*` makes it a prefix wildcard;
    /// anything else is an exact match.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => TopicPattern::Prefix(prefix.to_string()),
            None => TopicPattern::Exact(pattern.to_string()),
        }
    }

    /// `true` if `topic` is routed through this pattern.
    pub fn matches(&self, topic: &str) -> bool {
        match self {
            TopicPattern::Exact(t) => topic == t,
            TopicPattern::Prefix(p) => topic.starts_with(p.as_str()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventBus
// ─────────────────────────────────────────────────────────────────────────────

/// Shared event bus.  Clone it cheaply – all clones share the same underlying
/// broadcast channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event` to every current subscriber.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`MindError::Channel`] when no subscriber is listening.  Callers that
    /// treat publication as best-effort (a topic nobody cares about yet is a
    /// normal condition) should discard the error.
    pub fn publish(&self, event: Event) -> Result<usize, MindError> {
        let topic = event.topic.clone();
        self.sender
            .send(event)
            .map_err(|_| MindError::Channel(format!("no subscribers for topic '{topic}'")))
    }

    /// Subscribe to every event on the bus, unfiltered.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Subscribe filtered by `pattern` (exact topic or prefix wildcard such as
    /// `"signal:*"`).
    pub fn subscribe_topic(&self, pattern: impl AsRef<str>) -> TopicSubscriber {
        TopicSubscriber {
            pattern: TopicPattern::parse(pattern.as_ref()),
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TopicSubscriber
// ─────────────────────────────────────────────────────────────────────────────

/// A subscriber that only delivers events whose topic matches its pattern.
///
/// Events published to other topics are silently skipped.  A lagged receiver
/// logs a warning and keeps going; at-least-once delivery means the dropped
/// events are simply lost to this subscriber.
pub struct TopicSubscriber {
    pattern: TopicPattern,
    receiver: broadcast::Receiver<Event>,
}

impl TopicSubscriber {
    /// Wait for the next event that matches this subscriber's pattern.
    ///
    /// Returns `None` when the bus is closed and no further events will
    /// arrive.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.pattern.matches(&event.topic) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(pattern = ?self.pattern, lagged_by = n, "topic subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drain any events already waiting in the buffer without blocking.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.pattern.matches(&event.topic) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The pattern this subscriber filters on.
    pub fn pattern(&self) -> &TopicPattern {
        &self.pattern
    }
}
