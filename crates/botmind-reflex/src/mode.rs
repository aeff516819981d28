//! [`ModeMachine`] – the coarse behavioral regime.
//!
//! Five modes gate which reactive behaviors may run.  Automatic guards move
//! between `Idle`, `Social`, and `Alert`; `Work` and `Wander` are entered
//! only by an external override (the deliberative loop issuing a task).
//!
//! | Transition | Guard |
//! |---|---|
//! | Idle → Alert | health < 10 or threat score > 5 |
//! | Idle → Social | chat within 30 s and ≥ 1 nearby player |
//! | Alert → Idle | health ≥ 15 and threat ≤ 3 |
//! | Social → Idle | no in-flight task actions on a tick, or 60 s since last chat |
//! | Work → Idle | no in-flight task actions |
//!
//! Entering `Social` locks a follow target (last speaker if in range, else
//! the nearest in-range player); exiting it releases the lock so the
//! executor can cancel movement.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::context::ReflexContext;

// Guard thresholds.
const ALERT_HEALTH: f64 = 10.0;
const ALERT_THREAT: f64 = 5.0;
const CALM_HEALTH: f64 = 15.0;
const CALM_THREAT: f64 = 3.0;
const SOCIAL_CHAT_WINDOW: Duration = Duration::from_secs(30);
const SOCIAL_TIMEOUT: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────────────────────────────────────
// Modes
// ─────────────────────────────────────────────────────────────────────────────

/// The coarse behavioral regime gating which behaviors may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflexMode {
    Idle,
    Social,
    Alert,
    Work,
    Wander,
}

/// The result of one mode evaluation or forced override.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeChange {
    pub from: ReflexMode,
    pub to: ReflexMode,
    /// Entity id to start following (Social entry).
    pub follow: Option<String>,
    /// `true` when a previously held follow lock must be cancelled.
    pub release_follow: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// ModeMachine
// ─────────────────────────────────────────────────────────────────────────────

/// Evaluates the automatic guards once per tick and tracks the follow lock.
#[derive(Debug)]
pub struct ModeMachine {
    mode: ReflexMode,
    follow_target: Option<String>,
    interaction_range: f64,
}

impl ModeMachine {
    pub fn new(interaction_range: f64) -> Self {
        Self {
            mode: ReflexMode::Idle,
            follow_target: None,
            interaction_range,
        }
    }

    pub fn mode(&self) -> ReflexMode {
        self.mode
    }

    pub fn follow_target(&self) -> Option<&str> {
        self.follow_target.as_deref()
    }

    /// Run the automatic guards for the current tick.
    ///
    /// `in_flight` is the number of task actions currently executing; the
    /// Social and Work exit guards depend on it.  Returns the applied change,
    /// or `None` when no guard fired.
    pub fn evaluate(
        &mut self,
        ctx: &ReflexContext,
        now: Instant,
        in_flight: usize,
    ) -> Option<ModeChange> {
        let next = match self.mode {
            ReflexMode::Idle => {
                if ctx.self_state.health < ALERT_HEALTH || ctx.threat.score > ALERT_THREAT {
                    Some(ReflexMode::Alert)
                } else if ctx.chat_within(now, SOCIAL_CHAT_WINDOW)
                    && !ctx.environment.nearby_players.is_empty()
                {
                    Some(ReflexMode::Social)
                } else {
                    None
                }
            }
            ReflexMode::Alert => {
                if ctx.self_state.health >= CALM_HEALTH && ctx.threat.score <= CALM_THREAT {
                    Some(ReflexMode::Idle)
                } else {
                    None
                }
            }
            ReflexMode::Social => {
                let chat_stale = !ctx.chat_within(now, SOCIAL_TIMEOUT);
                if in_flight == 0 || chat_stale {
                    Some(ReflexMode::Idle)
                } else {
                    None
                }
            }
            ReflexMode::Work => {
                if in_flight == 0 {
                    Some(ReflexMode::Idle)
                } else {
                    None
                }
            }
            // Wander exits only via forced override.
            ReflexMode::Wander => None,
        }?;
        Some(self.transition(next, ctx))
    }

    /// External override, e.g. the deliberative loop issuing a task.
    pub fn force(&mut self, to: ReflexMode, ctx: &ReflexContext) -> Option<ModeChange> {
        if to == self.mode {
            return None;
        }
        Some(self.transition(to, ctx))
    }

    /// Idempotent shutdown: force `Idle`, running exit side effects.
    pub fn stop(&mut self, ctx: &ReflexContext) -> Option<ModeChange> {
        self.force(ReflexMode::Idle, ctx)
    }

    fn transition(&mut self, to: ReflexMode, ctx: &ReflexContext) -> ModeChange {
        let from = self.mode;
        let release_follow = from == ReflexMode::Social && self.follow_target.is_some();
        if release_follow {
            self.follow_target = None;
        }

        let follow = if to == ReflexMode::Social {
            self.follow_target = Self::pick_follow_target(ctx, self.interaction_range);
            self.follow_target.clone()
        } else {
            None
        };

        self.mode = to;
        debug!(?from, ?to, follow = ?self.follow_target, "reflex mode transition");
        ModeChange {
            from,
            to,
            follow,
            release_follow,
        }
    }

    /// Prefer the last speaker if currently within interaction range, else
    /// the nearest in-range player.
    fn pick_follow_target(ctx: &ReflexContext, range: f64) -> Option<String> {
        if let Some(speaker) = &ctx.social.last_speaker {
            if let Some(player) = ctx.player_within(speaker, range) {
                return Some(player.entity_id.clone());
            }
        }
        ctx.nearest_player_within(range)
            .map(|p| p.entity_id.clone())
    }
}
