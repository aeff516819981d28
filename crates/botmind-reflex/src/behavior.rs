//! [`ReflexBehavior`] trait and the deterministic [`BehaviorSelector`].
//!
//! Behaviors are registered once at startup and are stateless: all mutable
//! per-behavior state (last-run times, the busy guard) lives in the selector.
//! Selection runs once per tick: filter by mode membership and cooldown,
//! evaluate `when`, score the survivors, and pick the highest score, with
//! ties resolved by first-registered precedence.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use botmind_types::{MindError, ReflexIntent};
use tracing::trace;

use crate::context::ReflexContext;
use crate::mode::ReflexMode;

// ─────────────────────────────────────────────────────────────────────────────
// Behavior trait
// ─────────────────────────────────────────────────────────────────────────────

/// What a behavior's `run` produced: an optional intent to dispatch and an
/// optional replacement context (copy-on-write state update, applied before
/// the intent executes).
#[derive(Debug, Default)]
pub struct BehaviorOutcome {
    pub intent: Option<ReflexIntent>,
    pub context: Option<ReflexContext>,
}

/// A static reactive behavior definition.
pub trait ReflexBehavior: Send + Sync {
    /// Stable identifier, also the run-history key.
    fn id(&self) -> &'static str;

    /// Modes in which this behavior is eligible.
    fn modes(&self) -> &'static [ReflexMode];

    /// Minimum time between runs.  `None` disables the cooldown filter.
    fn cooldown(&self) -> Option<Duration> {
        None
    }

    /// Cheap applicability predicate, evaluated after mode/cooldown filters.
    fn when(&self, ctx: &ReflexContext, now: Instant) -> bool;

    /// Utility score; higher wins.  Only called when `when` returned `true`.
    fn score(&self, ctx: &ReflexContext, now: Instant) -> f64;

    /// Produce the intent and/or context update.
    fn run(&self, ctx: &ReflexContext, now: Instant) -> Result<BehaviorOutcome, MindError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Selector
// ─────────────────────────────────────────────────────────────────────────────

/// Picks at most one behavior per tick.
///
/// The `busy_until` timestamp guard prevents selecting a second behavior
/// while a previous one's effect is still running; the mode machine keeps
/// advancing independently so reflexes never block sensing.
#[derive(Default)]
pub struct BehaviorSelector {
    behaviors: Vec<Box<dyn ReflexBehavior>>,
    last_run: HashMap<&'static str, Instant>,
    busy_until: Option<Instant>,
}

impl BehaviorSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behavior.  Registration order is the tie-break order.
    pub fn register(&mut self, behavior: Box<dyn ReflexBehavior>) {
        self.behaviors.push(behavior);
    }

    pub fn is_busy(&self, now: Instant) -> bool {
        self.busy_until.is_some_and(|until| now < until)
    }

    /// Block selection until `until` (an effect is executing).
    pub fn set_busy_until(&mut self, until: Instant) {
        self.busy_until = Some(until);
    }

    /// Clear the busy guard (effect finished or failed).
    pub fn clear_busy(&mut self) {
        self.busy_until = None;
    }

    /// Select the highest-scoring eligible behavior for `mode`, or `None`.
    pub fn select(
        &self,
        mode: ReflexMode,
        ctx: &ReflexContext,
        now: Instant,
    ) -> Option<&dyn ReflexBehavior> {
        if self.is_busy(now) {
            return None;
        }

        let mut best: Option<(&dyn ReflexBehavior, f64)> = None;
        for behavior in &self.behaviors {
            if !behavior.modes().contains(&mode) {
                continue;
            }
            if let (Some(cooldown), Some(last)) =
                (behavior.cooldown(), self.last_run.get(behavior.id()))
            {
                if now.duration_since(*last) < cooldown {
                    continue;
                }
            }
            if !behavior.when(ctx, now) {
                continue;
            }
            let score = behavior.score(ctx, now);
            trace!(behavior = behavior.id(), score, "behavior candidate");
            // Strict comparison keeps first-registered precedence on ties.
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((behavior.as_ref(), score));
            }
        }
        best.map(|(behavior, _)| behavior)
    }

    /// Record that `id` just ran, for cooldown filtering.
    pub fn mark_ran(&mut self, id: &'static str, now: Instant) {
        self.last_run.insert(id, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        id: &'static str,
        score: f64,
        applicable: bool,
        cooldown: Option<Duration>,
    }

    impl ReflexBehavior for Fixed {
        fn id(&self) -> &'static str {
            self.id
        }
        fn modes(&self) -> &'static [ReflexMode] {
            &[ReflexMode::Idle]
        }
        fn cooldown(&self) -> Option<Duration> {
            self.cooldown
        }
        fn when(&self, _ctx: &ReflexContext, _now: Instant) -> bool {
            self.applicable
        }
        fn score(&self, _ctx: &ReflexContext, _now: Instant) -> f64 {
            self.score
        }
        fn run(&self, _ctx: &ReflexContext, _now: Instant) -> Result<BehaviorOutcome, MindError> {
            Ok(BehaviorOutcome::default())
        }
    }

    fn fixed(id: &'static str, score: f64) -> Box<Fixed> {
        Box::new(Fixed {
            id,
            score,
            applicable: true,
            cooldown: None,
        })
    }

    #[test]
    fn highest_score_wins() {
        let mut selector = BehaviorSelector::new();
        selector.register(fixed("low", 0.2));
        selector.register(fixed("high", 0.9));

        let ctx = ReflexContext::default();
        let picked = selector.select(ReflexMode::Idle, &ctx, Instant::now()).unwrap();
        assert_eq!(picked.id(), "high");
    }

    #[test]
    fn ties_resolve_to_first_registered() {
        let mut selector = BehaviorSelector::new();
        selector.register(fixed("first", 0.5));
        selector.register(fixed("second", 0.5));

        let ctx = ReflexContext::default();
        let picked = selector.select(ReflexMode::Idle, &ctx, Instant::now()).unwrap();
        assert_eq!(picked.id(), "first");
    }

    #[test]
    fn inapplicable_behaviors_are_skipped() {
        let mut selector = BehaviorSelector::new();
        selector.register(Box::new(Fixed {
            id: "off",
            score: 1.0,
            applicable: false,
            cooldown: None,
        }));
        selector.register(fixed("on", 0.1));

        let ctx = ReflexContext::default();
        let picked = selector.select(ReflexMode::Idle, &ctx, Instant::now()).unwrap();
        assert_eq!(picked.id(), "on");
    }

    #[test]
    fn wrong_mode_excludes_behavior() {
        let mut selector = BehaviorSelector::new();
        selector.register(fixed("idle_only", 1.0));

        let ctx = ReflexContext::default();
        assert!(selector.select(ReflexMode::Alert, &ctx, Instant::now()).is_none());
    }

    #[test]
    fn cooldown_filters_recent_runs() {
        let mut selector = BehaviorSelector::new();
        selector.register(Box::new(Fixed {
            id: "cooled",
            score: 1.0,
            applicable: true,
            cooldown: Some(Duration::from_secs(10)),
        }));

        let ctx = ReflexContext::default();
        let now = Instant::now();
        assert!(selector.select(ReflexMode::Idle, &ctx, now).is_some());

        selector.mark_ran("cooled", now);
        assert!(selector.select(ReflexMode::Idle, &ctx, now + Duration::from_secs(5)).is_none());
        assert!(selector.select(ReflexMode::Idle, &ctx, now + Duration::from_secs(10)).is_some());
    }

    #[test]
    fn busy_guard_blocks_selection_until_expiry() {
        let mut selector = BehaviorSelector::new();
        selector.register(fixed("any", 1.0));

        let ctx = ReflexContext::default();
        let now = Instant::now();
        selector.set_busy_until(now + Duration::from_millis(500));

        assert!(selector.select(ReflexMode::Idle, &ctx, now).is_none());
        assert!(selector
            .select(ReflexMode::Idle, &ctx, now + Duration::from_millis(500))
            .is_some());

        selector.set_busy_until(now + Duration::from_secs(60));
        selector.clear_busy();
        assert!(selector.select(ReflexMode::Idle, &ctx, now).is_some());
    }
}
