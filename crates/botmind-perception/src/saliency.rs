//! [`SaliencyEngine`] – sliding-window burst detector.
//!
//! Converts bursts of identical raw-event keys into discrete, rate-limited
//! signals, independent of the absolute event rate.  Each fixed rule owns a
//! circular buffer of per-slot event counts; a repeating timer advances all
//! buffers one slot at a time, realising an O(1)-per-tick sliding window.
//!
//! # Example
//!
//! ```rust
//! use botmind_perception::saliency::{SaliencyConfig, SaliencyEngine};
//! use botmind_types::{Percept, RawPerceptionEvent};
//!
//! let mut engine = SaliencyEngine::with_default_rules(SaliencyConfig::default());
//!
//! // Five sneak toggles within one window cross the "teabag" threshold.
//! let mut fired = None;
//! for _ in 0..5 {
//!     let event = RawPerceptionEvent::new(
//!         "binding::test",
//!         Percept::SneakToggle { entity_id: "e1".into(), sneaking: true, distance: 3.0 },
//!     );
//!     if let Some(signal) = engine.ingest(&event) {
//!         fired = Some(signal);
//!     }
//! }
//! assert_eq!(fired.unwrap().signal_type, "teabag");
//! ```

use std::collections::HashMap;

use botmind_types::{Percept, PerceptionSignal, RawPerceptionEvent};
use serde::Serialize;
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning knobs for the saliency window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SaliencyConfig {
    /// Duration of one window slot in milliseconds.
    pub slot_ms: u64,
    /// Number of slots in the sliding window.
    pub window_size: usize,
    /// Events observed farther away than this are ignored.
    pub max_distance: f64,
}

impl Default for SaliencyConfig {
    fn default() -> Self {
        Self {
            slot_ms: 20,
            window_size: 25,
            max_distance: 32.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rules
// ─────────────────────────────────────────────────────────────────────────────

/// A fixed counting rule: which raw-event key to count, when to accept an
/// event, and how to materialise the signal once the threshold is crossed.
pub struct SaliencyRule {
    /// Counter key, by convention `<modality>:<kind>`.
    pub key: &'static str,
    /// Number of accepted events within one window that fires the signal.
    pub threshold: u32,
    /// Optional acceptance filter; events it rejects are not counted.
    pub predicate: fn(&RawPerceptionEvent, &SaliencyConfig) -> bool,
    /// Materialises the signal from the event that crossed the threshold.
    pub build_signal: fn(&RawPerceptionEvent) -> PerceptionSignal,
}

fn within_range(event: &RawPerceptionEvent, config: &SaliencyConfig) -> bool {
    event
        .percept
        .distance()
        .is_none_or(|d| d <= config.max_distance)
}

fn is_damage(event: &RawPerceptionEvent, _config: &SaliencyConfig) -> bool {
    matches!(event.percept, Percept::HealthChanged { delta, .. } if delta < 0.0)
}

/// The fixed rule set counted by every pipeline instance.
pub fn default_rules() -> Vec<SaliencyRule> {
    vec![
        SaliencyRule {
            key: "sighted:sneak_toggle",
            threshold: 5,
            predicate: within_range,
            build_signal: |event| {
                PerceptionSignal::new("teabag", event.percept.entity_id().map(String::from), 0.8)
            },
        },
        SaliencyRule {
            key: "sighted:entity_swing",
            threshold: 6,
            predicate: within_range,
            build_signal: |event| {
                PerceptionSignal::new(
                    "aggression",
                    event.percept.entity_id().map(String::from),
                    0.7,
                )
            },
        },
        SaliencyRule {
            key: "heard:sound_heard",
            threshold: 8,
            predicate: within_range,
            build_signal: |_event| PerceptionSignal::new("commotion", None, 0.5),
        },
        SaliencyRule {
            key: "felt:health_changed",
            threshold: 3,
            predicate: is_damage,
            build_signal: |_event| PerceptionSignal::new("under_attack", None, 1.0),
        },
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// CounterState
// ─────────────────────────────────────────────────────────────────────────────

/// Sliding-window counter for one rule key.
///
/// Invariant: `total` always equals the sum of `counts`.  Advancing the
/// window subtracts the slot about to be overwritten before zeroing it.
#[derive(Debug, Clone)]
pub struct CounterState {
    counts: Vec<u32>,
    triggers: Vec<bool>,
    head: usize,
    total: u32,
    last_event_slot: Option<u64>,
    last_fire_slot: Option<u64>,
    last_fire_total: u32,
}

impl CounterState {
    fn new(window_size: usize) -> Self {
        Self {
            counts: vec![0; window_size],
            triggers: vec![false; window_size],
            head: 0,
            total: 0,
            last_event_slot: None,
            last_fire_slot: None,
            last_fire_total: 0,
        }
    }

    /// Rotate the window one slot, expiring the oldest contribution.
    fn advance(&mut self) {
        self.head = (self.head + 1) % self.counts.len();
        self.total -= self.counts[self.head];
        self.counts[self.head] = 0;
        self.triggers[self.head] = false;
    }

    fn bump(&mut self, slot: u64) {
        self.counts[self.head] += 1;
        self.total += 1;
        self.last_event_slot = Some(slot);
    }

    /// Record a threshold crossing: mark the current slot's trigger, zero the
    /// counts, and remember what fired.  Trigger markers are deliberately not
    /// cleared here; they expire only when the window rotates past them, so
    /// diagnostics can still show where crossings happened.
    fn fire(&mut self, slot: u64) {
        self.triggers[self.head] = true;
        self.last_fire_slot = Some(slot);
        self.last_fire_total = self.total;
        self.counts.fill(0);
        self.total = 0;
    }

    /// Current windowed total.
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Window contents in chronological (oldest → newest) order.
    ///
    /// Pure read used by diagnostics: rotates the circular buffer relative to
    /// `head + 1` so that index 0 is the slot about to expire.
    fn chronological<T: Copy>(&self, buffer: &[T]) -> Vec<T> {
        let split = (self.head + 1) % buffer.len();
        buffer[split..]
            .iter()
            .chain(buffer[..split].iter())
            .copied()
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only export of one counter, for observability tooling.
#[derive(Debug, Clone, Serialize)]
pub struct CounterSnapshot {
    pub key: String,
    pub total: u32,
    pub window: Vec<u32>,
    pub triggers: Vec<bool>,
    pub last_event_slot: Option<u64>,
    pub last_fire_slot: Option<u64>,
    pub last_fire_total: u32,
}

/// Read-only export of the whole engine.  Must never feed back into control
/// decisions.
#[derive(Debug, Clone, Serialize)]
pub struct SaliencySnapshot {
    pub slot: u64,
    pub counters: Vec<CounterSnapshot>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SaliencyEngine
// ─────────────────────────────────────────────────────────────────────────────

/// Fixed set of per-key sliding-window counters.
///
/// All counters are pre-created at construction from the rule set; there is
/// no dynamic key creation, which bounds memory regardless of event volume.
pub struct SaliencyEngine {
    config: SaliencyConfig,
    rules: Vec<SaliencyRule>,
    counters: HashMap<&'static str, CounterState>,
    current_slot: u64,
}

impl SaliencyEngine {
    /// Build an engine over an explicit rule set.
    pub fn new(config: SaliencyConfig, rules: Vec<SaliencyRule>) -> Self {
        let counters = rules
            .iter()
            .map(|rule| (rule.key, CounterState::new(config.window_size)))
            .collect();
        Self {
            config,
            rules,
            counters,
            current_slot: 0,
        }
    }

    /// Build an engine with [`default_rules`].
    pub fn with_default_rules(config: SaliencyConfig) -> Self {
        let rules = default_rules();
        Self::new(config, rules)
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &SaliencyConfig {
        &self.config
    }

    /// Advance every counter one slot.  Must be called strictly periodically
    /// (every `slot_ms`) by a single repeating timer, or window totals drift.
    pub fn advance_slot(&mut self) {
        self.current_slot += 1;
        for counter in self.counters.values_mut() {
            counter.advance();
        }
    }

    /// Count a raw event against its rule, returning a signal if the windowed
    /// total crossed the rule's threshold.
    ///
    /// Exactly one signal is emitted per crossing: firing zeroes the counter,
    /// so the same burst cannot double-fire.
    pub fn ingest(&mut self, event: &RawPerceptionEvent) -> Option<PerceptionSignal> {
        let key = format!(
            "{}:{}",
            event.percept.modality().as_str(),
            event.percept.kind()
        );
        let rule = self.rules.iter().find(|r| r.key == key)?;
        if !(rule.predicate)(event, &self.config) {
            return None;
        }

        let counter = self.counters.get_mut(rule.key)?;
        counter.bump(self.current_slot);
        if counter.total >= rule.threshold {
            counter.fire(self.current_slot);
            let signal = (rule.build_signal)(event);
            debug!(key = rule.key, signal = %signal.signal_type, "saliency threshold crossed");
            return Some(signal);
        }
        None
    }

    /// Windowed total for a rule key (testing / diagnostics).
    pub fn total(&self, key: &str) -> Option<u32> {
        self.counters.get(key).map(|c| c.total)
    }

    /// Export every counter in chronological order.  Pure read.
    pub fn snapshot(&self) -> SaliencySnapshot {
        let mut counters: Vec<CounterSnapshot> = self
            .counters
            .iter()
            .map(|(key, counter)| CounterSnapshot {
                key: (*key).to_string(),
                total: counter.total,
                window: counter.chronological(&counter.counts),
                triggers: counter.chronological(&counter.triggers),
                last_event_slot: counter.last_event_slot,
                last_fire_slot: counter.last_fire_slot,
                last_fire_total: counter.last_fire_total,
            })
            .collect();
        counters.sort_by(|a, b| a.key.cmp(&b.key));
        SaliencySnapshot {
            slot: self.current_slot,
            counters,
        }
    }
}
