//! The built-in reflex behaviors.
//!
//! Each behavior is a small, self-contained rule: a cheap predicate, a
//! utility score, and a `run` that yields an intent plus any context update.
//! They own no mutable state; run history lives in the selector.

use std::time::{Duration, Instant};

use botmind_perception::beliefs::SharedBeliefs;
use botmind_types::{MindError, ReflexIntent};

use crate::behavior::{BehaviorOutcome, ReflexBehavior};
use crate::context::ReflexContext;
use crate::mode::ReflexMode;

const GREETING_FRESHNESS: Duration = Duration::from_secs(5);
const GREETING_COOLDOWN_PER_SPEAKER: Duration = Duration::from_secs(10);
const SIGNAL_FRESHNESS: Duration = Duration::from_secs(2);
const TEABAG_CONFIDENCE_FLOOR: f64 = 0.6;

// ─────────────────────────────────────────────────────────────────────────────
// GreetBehavior
// ─────────────────────────────────────────────────────────────────────────────

/// Replies to a fresh "hi"/"hello" from a nearby player, at most once per
/// speaker every ten seconds.
pub struct GreetBehavior;

impl GreetBehavior {
    fn fresh_greeting<'a>(ctx: &'a ReflexContext, now: Instant) -> Option<&'a str> {
        let at = ctx.social.last_message_at?;
        if now.duration_since(at) > GREETING_FRESHNESS {
            return None;
        }
        let message = ctx.social.last_message.as_deref()?;
        let normalized = message.trim().to_lowercase();
        if normalized == "hi" || normalized == "hello" {
            ctx.social.last_speaker.as_deref()
        } else {
            None
        }
    }
}

impl ReflexBehavior for GreetBehavior {
    fn id(&self) -> &'static str {
        "greet"
    }

    fn modes(&self) -> &'static [ReflexMode] {
        &[ReflexMode::Idle, ReflexMode::Social]
    }

    fn when(&self, ctx: &ReflexContext, now: Instant) -> bool {
        let Some(speaker) = Self::fresh_greeting(ctx, now) else {
            return false;
        };
        // Per-speaker cooldown so back-and-forth greetings don't loop.
        match ctx.social.last_greeting_at.get(speaker) {
            Some(at) => now.duration_since(*at) >= GREETING_COOLDOWN_PER_SPEAKER,
            None => true,
        }
    }

    fn score(&self, _ctx: &ReflexContext, _now: Instant) -> f64 {
        0.6
    }

    fn run(&self, ctx: &ReflexContext, now: Instant) -> Result<BehaviorOutcome, MindError> {
        let speaker = Self::fresh_greeting(ctx, now)
            .ok_or_else(|| MindError::Behavior {
                behavior: "greet".into(),
                details: "greeting disappeared between when() and run()".into(),
            })?
            .to_string();

        let mut updated = ctx.clone();
        updated.social.last_greeting_at.insert(speaker.clone(), now);

        Ok(BehaviorOutcome {
            intent: Some(ReflexIntent::Chat {
                message: format!("Hello, {speaker}!"),
            }),
            context: Some(updated),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LookAtSignalBehavior
// ─────────────────────────────────────────────────────────────────────────────

/// Turns the agent's gaze toward the source of the most recent saliency
/// signal, provided the signal is under two seconds old and the source's
/// position is known.
pub struct LookAtSignalBehavior {
    beliefs: SharedBeliefs,
}

impl LookAtSignalBehavior {
    pub fn new(beliefs: SharedBeliefs) -> Self {
        Self { beliefs }
    }

    fn source_position(&self, ctx: &ReflexContext) -> Option<botmind_types::Vec3> {
        let source = ctx.attention.last_signal_source.as_deref()?;
        self.beliefs.get(source)?.position
    }
}

impl ReflexBehavior for LookAtSignalBehavior {
    fn id(&self) -> &'static str {
        "look_at_signal"
    }

    fn modes(&self) -> &'static [ReflexMode] {
        &[ReflexMode::Idle, ReflexMode::Social, ReflexMode::Alert]
    }

    fn when(&self, ctx: &ReflexContext, now: Instant) -> bool {
        let fresh = ctx
            .attention
            .last_signal_at
            .is_some_and(|at| now.duration_since(at) <= SIGNAL_FRESHNESS);
        fresh && self.source_position(ctx).is_some()
    }

    fn score(&self, _ctx: &ReflexContext, _now: Instant) -> f64 {
        0.5
    }

    fn run(&self, ctx: &ReflexContext, _now: Instant) -> Result<BehaviorOutcome, MindError> {
        let target = self.source_position(ctx).ok_or_else(|| MindError::Behavior {
            behavior: "look_at_signal".into(),
            details: "signal source has no known position".into(),
        })?;

        // Consume the signal so one event yields one glance.
        let mut updated = ctx.clone();
        updated.attention.last_signal_at = None;

        Ok(BehaviorOutcome {
            intent: Some(ReflexIntent::LookAt { target }),
            context: Some(updated),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GestureBackBehavior
// ─────────────────────────────────────────────────────────────────────────────

/// Crouch-spams back at any entity the perception layer believes is
/// teabagging with confidence above 0.6.
pub struct GestureBackBehavior {
    beliefs: SharedBeliefs,
}

impl GestureBackBehavior {
    pub fn new(beliefs: SharedBeliefs) -> Self {
        Self { beliefs }
    }

    fn top_confidence(&self) -> Option<f64> {
        self.beliefs
            .with_confidence_above("teabag", TEABAG_CONFIDENCE_FLOOR)
            .into_iter()
            .map(|(_, confidence)| confidence)
            .max_by(f64::total_cmp)
    }
}

impl ReflexBehavior for GestureBackBehavior {
    fn id(&self) -> &'static str {
        "gesture_back"
    }

    fn modes(&self) -> &'static [ReflexMode] {
        &[ReflexMode::Idle, ReflexMode::Social]
    }

    fn cooldown(&self) -> Option<Duration> {
        Some(Duration::from_secs(8))
    }

    fn when(&self, _ctx: &ReflexContext, _now: Instant) -> bool {
        self.top_confidence().is_some()
    }

    fn score(&self, _ctx: &ReflexContext, _now: Instant) -> f64 {
        self.top_confidence().unwrap_or(0.0)
    }

    fn run(&self, ctx: &ReflexContext, now: Instant) -> Result<BehaviorOutcome, MindError> {
        let mut updated = ctx.clone();
        updated.social.last_gesture = Some("crouch_reply".into());
        updated.social.last_gesture_at = Some(now);

        Ok(BehaviorOutcome {
            intent: Some(ReflexIntent::Gesture),
            context: Some(updated),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botmind_types::{EntityBelief, EntityKind};
    use chrono::Utc;

    fn ctx_with_chat(speaker: &str, message: &str, now: Instant) -> ReflexContext {
        let mut ctx = ReflexContext::default();
        ctx.social.last_speaker = Some(speaker.into());
        ctx.social.last_message = Some(message.into());
        ctx.social.last_message_at = Some(now);
        ctx
    }

    fn belief(id: &str, position: Option<botmind_types::Vec3>) -> EntityBelief {
        EntityBelief {
            id: id.into(),
            kind: EntityKind::Player,
            name: Some(id.into()),
            position,
            sneaking: None,
            confidences: Default::default(),
            last_updated_at: Utc::now(),
        }
    }

    #[test]
    fn greet_fires_on_hello_and_respects_speaker_cooldown() {
        let behavior = GreetBehavior;
        let now = Instant::now();
        let ctx = ctx_with_chat("steve", "  Hello  ", now);
        assert!(behavior.when(&ctx, now));

        let outcome = behavior.run(&ctx, now).unwrap();
        match outcome.intent {
            Some(ReflexIntent::Chat { message }) => assert_eq!(message, "Hello, steve!"),
            other => panic!("unexpected intent: {other:?}"),
        }

        let greeted = outcome.context.unwrap();
        assert!(!behavior.when(&greeted, now + Duration::from_secs(3)));
    }

    #[test]
    fn greet_ignores_other_chatter_and_stale_messages() {
        let behavior = GreetBehavior;
        let now = Instant::now();

        let ctx = ctx_with_chat("steve", "what is the plan", now);
        assert!(!behavior.when(&ctx, now));

        let stale = ctx_with_chat("steve", "hi", now);
        assert!(!behavior.when(&stale, now + Duration::from_secs(20)));
    }

    #[test]
    fn look_at_needs_fresh_signal_and_known_position() {
        let beliefs = SharedBeliefs::new();
        beliefs.upsert(belief("e7", Some(botmind_types::Vec3::new(1.0, 64.0, 2.0))));

        let behavior = LookAtSignalBehavior::new(beliefs.clone());
        let now = Instant::now();

        let mut ctx = ReflexContext::default();
        ctx.attention.last_signal_type = Some("commotion".into());
        ctx.attention.last_signal_source = Some("e7".into());
        ctx.attention.last_signal_at = Some(now);
        assert!(behavior.when(&ctx, now));
        assert!(!behavior.when(&ctx, now + Duration::from_secs(5)));

        let outcome = behavior.run(&ctx, now).unwrap();
        assert!(matches!(outcome.intent, Some(ReflexIntent::LookAt { .. })));
        // The signal is consumed in the updated context.
        assert!(outcome.context.unwrap().attention.last_signal_at.is_none());

        ctx.attention.last_signal_source = Some("unknown".into());
        assert!(!behavior.when(&ctx, now));
    }

    #[test]
    fn gesture_back_scores_by_top_confidence() {
        let beliefs = SharedBeliefs::new();
        beliefs.upsert(belief("a", None));
        beliefs.upsert(belief("b", None));
        beliefs.set_confidence("a", "teabag", 0.7);
        beliefs.set_confidence("b", "teabag", 0.9);

        let behavior = GestureBackBehavior::new(beliefs.clone());
        let now = Instant::now();
        let ctx = ReflexContext::default();

        assert!(behavior.when(&ctx, now));
        assert!((behavior.score(&ctx, now) - 0.9).abs() < 1e-9);

        let outcome = behavior.run(&ctx, now).unwrap();
        assert!(matches!(outcome.intent, Some(ReflexIntent::Gesture)));
        assert_eq!(
            outcome.context.unwrap().social.last_gesture.as_deref(),
            Some("crouch_reply")
        );
    }

    #[test]
    fn gesture_back_stays_quiet_below_threshold() {
        let beliefs = SharedBeliefs::new();
        beliefs.upsert(belief("a", None));
        beliefs.set_confidence("a", "teabag", 0.5);

        let behavior = GestureBackBehavior::new(beliefs);
        assert!(!behavior.when(&ReflexContext::default(), Instant::now()));
    }
}
