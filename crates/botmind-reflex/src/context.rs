//! [`ReflexContext`] – the ephemeral world snapshot.
//!
//! Everything reflex behaviors score against lives here.  The context is
//! never mutated in place across a tick boundary: the controller clones it,
//! applies updates to the clone, and swaps it in wholesale (copy-on-write
//! per sub-section).  Monotonic [`Instant`]s drive all freshness guards so
//! wall-clock adjustments cannot confuse them.

use std::collections::HashMap;
use std::time::Instant;

use botmind_types::Vec3;

// ─────────────────────────────────────────────────────────────────────────────
// Sub-sections
// ─────────────────────────────────────────────────────────────────────────────

/// The agent's own body state.
#[derive(Debug, Clone)]
pub struct SelfState {
    pub position: Option<Vec3>,
    pub health: f64,
    pub food: f64,
    pub holding: Option<String>,
}

impl Default for SelfState {
    fn default() -> Self {
        Self {
            position: None,
            health: 20.0,
            food: 20.0,
            holding: None,
        }
    }
}

/// One player currently within sensing range.
#[derive(Debug, Clone)]
pub struct NearbyPlayer {
    pub entity_id: String,
    pub name: String,
    pub position: Option<Vec3>,
    pub distance: f64,
    /// `true` when the player's gaze ray intersects the agent.
    pub gazing_at_self: bool,
}

/// The immediate surroundings.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentState {
    pub time_of_day: Option<String>,
    pub weather: Option<String>,
    pub nearby_players: Vec<NearbyPlayer>,
    pub nearby_entities: Vec<String>,
    pub light_level: Option<u8>,
}

/// Conversation and gesture memory.
#[derive(Debug, Clone, Default)]
pub struct SocialState {
    pub last_speaker: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<Instant>,
    /// Per-speaker timestamps of the last greeting sent, for cooldown keying.
    pub last_greeting_at: HashMap<String, Instant>,
    pub last_gesture: Option<String>,
    pub last_gesture_at: Option<Instant>,
}

/// Rolling danger estimate.
#[derive(Debug, Clone, Default)]
pub struct ThreatState {
    pub score: f64,
    pub last_threat_at: Option<Instant>,
    pub last_threat_source: Option<String>,
}

/// The most recent saliency signal, for orientation behaviors.
#[derive(Debug, Clone, Default)]
pub struct AttentionState {
    pub last_signal_type: Option<String>,
    pub last_signal_source: Option<String>,
    pub last_signal_at: Option<Instant>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ReflexContext
// ─────────────────────────────────────────────────────────────────────────────

/// The full snapshot handed to mode guards and behavior predicates.
#[derive(Debug, Clone, Default)]
pub struct ReflexContext {
    pub self_state: SelfState,
    pub environment: EnvironmentState,
    pub social: SocialState,
    pub threat: ThreatState,
    pub attention: AttentionState,
}

impl ReflexContext {
    /// The nearest player within `range`, if any.
    pub fn nearest_player_within(&self, range: f64) -> Option<&NearbyPlayer> {
        self.environment
            .nearby_players
            .iter()
            .filter(|p| p.distance <= range)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// A named player within `range`, if present.
    pub fn player_within(&self, name: &str, range: f64) -> Option<&NearbyPlayer> {
        self.environment
            .nearby_players
            .iter()
            .find(|p| p.name == name && p.distance <= range)
    }

    /// `true` when the last chat message arrived within `window`.
    pub fn chat_within(&self, now: Instant, window: std::time::Duration) -> bool {
        self.social
            .last_message_at
            .is_some_and(|at| now.duration_since(at) <= window)
    }
}
