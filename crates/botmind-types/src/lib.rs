//! `botmind-types` – shared data model for the cognitive control core.
//!
//! Every value that crosses a component boundary (bus events, percepts,
//! beliefs, signals, intents, action instructions) lives here so that the
//! perception, reflex, and conscious crates never depend on each other's
//! internals.  All types are immutable-by-convention: producers build a value
//! once and consumers never mutate it in place.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Geometry
// ─────────────────────────────────────────────────────────────────────────────

/// A position in the game world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw perception events
// ─────────────────────────────────────────────────────────────────────────────

/// The sensory channel a raw event arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Sighted,
    Heard,
    Felt,
    System,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Sighted => "sighted",
            Modality::Heard => "heard",
            Modality::Felt => "felt",
            Modality::System => "system",
        }
    }
}

/// What kind of entity a belief or observation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Player,
    Mob,
    Item,
    Block,
}

/// Modality-specific observation payload.
///
/// Each variant maps to a fixed `(modality, kind)` pair used by the saliency
/// engine to resolve its counting rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Percept {
    /// A tracked entity changed position.
    EntityMoved {
        entity_id: String,
        entity_kind: EntityKind,
        position: Vec3,
        distance: f64,
    },
    /// An entity swung its arm.
    EntitySwing {
        entity_id: String,
        entity_kind: EntityKind,
        distance: f64,
    },
    /// An entity toggled its sneak state.
    SneakToggle {
        entity_id: String,
        sneaking: bool,
        distance: f64,
    },
    /// A player appeared in the world.
    PlayerJoined { entity_id: String, name: String },
    /// A known player's state was refreshed.
    PlayerUpdated {
        entity_id: String,
        name: String,
        position: Vec3,
        sneaking: bool,
    },
    /// A sound was heard, optionally localised.
    SoundHeard {
        sound_id: String,
        position: Option<Vec3>,
        distance: f64,
    },
    /// A chat message arrived.
    Chat { speaker: String, message: String },
    /// Own health/food changed.  `delta` is negative for damage.
    HealthChanged { health: f64, food: f64, delta: f64 },
    /// An item was picked up.
    ItemCollected { item: String, amount: u32 },
}

impl Percept {
    /// The sensory channel this percept arrived on.
    pub fn modality(&self) -> Modality {
        match self {
            Percept::EntityMoved { .. }
            | Percept::EntitySwing { .. }
            | Percept::SneakToggle { .. }
            | Percept::PlayerUpdated { .. } => Modality::Sighted,
            Percept::SoundHeard { .. } | Percept::Chat { .. } => Modality::Heard,
            Percept::HealthChanged { .. } | Percept::ItemCollected { .. } => Modality::Felt,
            Percept::PlayerJoined { .. } => Modality::System,
        }
    }

    /// The stable kind tag for this percept, matching its serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Percept::EntityMoved { .. } => "entity_moved",
            Percept::EntitySwing { .. } => "entity_swing",
            Percept::SneakToggle { .. } => "sneak_toggle",
            Percept::PlayerJoined { .. } => "player_joined",
            Percept::PlayerUpdated { .. } => "player_updated",
            Percept::SoundHeard { .. } => "sound_heard",
            Percept::Chat { .. } => "chat",
            Percept::HealthChanged { .. } => "health_changed",
            Percept::ItemCollected { .. } => "item_collected",
        }
    }

    /// The entity this percept is about, if any.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            Percept::EntityMoved { entity_id, .. }
            | Percept::EntitySwing { entity_id, .. }
            | Percept::SneakToggle { entity_id, .. }
            | Percept::PlayerJoined { entity_id, .. }
            | Percept::PlayerUpdated { entity_id, .. } => Some(entity_id),
            _ => None,
        }
    }

    /// Observer-to-subject distance, when the percept carries one.
    pub fn distance(&self) -> Option<f64> {
        match self {
            Percept::EntityMoved { distance, .. }
            | Percept::EntitySwing { distance, .. }
            | Percept::SneakToggle { distance, .. }
            | Percept::SoundHeard { distance, .. } => Some(*distance),
            _ => None,
        }
    }
}

/// A single immutable observation from the game-engine binding.
///
/// Produced once per observation and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPerceptionEvent {
    pub id: Uuid,
    /// Originating binding, e.g. `"binding::entity_tracker"`.
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub percept: Percept,
}

impl RawPerceptionEvent {
    pub fn new(source: impl Into<String>, percept: Percept) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            timestamp: Utc::now(),
            percept,
        }
    }

    /// The bus topic this event is republished under: `raw:<modality>:<kind>`.
    pub fn raw_topic(&self) -> String {
        format!("raw:{}:{}", self.percept.modality().as_str(), self.percept.kind())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Saliency signals
// ─────────────────────────────────────────────────────────────────────────────

/// A discrete burst signal emitted when a counted raw-event key crosses its
/// threshold within the saliency sliding window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSignal {
    pub id: Uuid,
    /// Signal class, e.g. `"teabag"`, `"aggression"`, `"commotion"`.
    pub signal_type: String,
    /// The entity the burst was attributed to, if any.
    pub source_id: Option<String>,
    /// Confidence in `[0, 1]`.
    pub strength: f64,
    pub timestamp: DateTime<Utc>,
}

impl PerceptionSignal {
    pub fn new(signal_type: impl Into<String>, source_id: Option<String>, strength: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal_type: signal_type.into(),
            source_id,
            strength: strength.clamp(0.0, 1.0),
            timestamp: Utc::now(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity beliefs
// ─────────────────────────────────────────────────────────────────────────────

/// The system's best-current-knowledge record about a tracked entity.
///
/// Owned exclusively by the belief store and overwritten wholesale on every
/// entity-bearing raw event (last-write-wins, no merge, no decay).  Named
/// `confidences` are the one exception: they are maintained separately by the
/// perception pipeline's router stage from signal strengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBelief {
    pub id: String,
    pub kind: EntityKind,
    pub name: Option<String>,
    pub position: Option<Vec3>,
    pub sneaking: Option<bool>,
    /// Named signal confidences, e.g. `"teabag" -> 0.8`.
    #[serde(default)]
    pub confidences: HashMap<String, f64>,
    pub last_updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Reflex intents
// ─────────────────────────────────────────────────────────────────────────────

/// A small, executor-agnostic description of a reflex action to perform.
/// Consumed exactly once by the reflex executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ReflexIntent {
    /// Send a literal chat message.
    Chat { message: String },
    /// Orient the view toward a world point.
    LookAt { target: Vec3 },
    /// Perform the fixed physical gesture (repeated sneak toggle).
    Gesture,
}

// ─────────────────────────────────────────────────────────────────────────────
// Action instructions
// ─────────────────────────────────────────────────────────────────────────────

/// How a multi-step tool invocation schedules its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    Sequential,
    Parallel,
}

/// A single tool invocation step inside an action instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolStep {
    pub tool: String,
    pub params: serde_json::Value,
}

/// The effectful body of an action instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionBody {
    /// Say something in chat.
    Chat { message: String },
    /// Invoke one or more tools.
    Tool { mode: ExecMode, steps: Vec<ToolStep> },
}

/// An action handed to the task executor by the conscious controller.
///
/// The `id` is assigned lazily by the controller's monotonic counter the
/// first time the action leaves a reasoning-service response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionInstruction {
    pub id: u64,
    pub require_feedback: bool,
    pub body: ActionBody,
}

/// Lifecycle outcome reported by the task executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    Started,
    Completed,
    Failed,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conscious-queue stimuli
// ─────────────────────────────────────────────────────────────────────────────

/// A stimulus queued for the conscious controller's OODA loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BotEvent {
    /// A saliency signal crossed its threshold.
    Signal(PerceptionSignal),
    /// A chat message addressed to (or overheard by) the agent.
    Chat {
        speaker: String,
        message: String,
        at: DateTime<Utc>,
    },
    /// Lifecycle feedback for a previously issued action.
    ActionFeedback {
        action_id: u64,
        outcome: ActionOutcome,
        detail: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus events
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies the component that published a bus event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSource {
    /// e.g. `"botmind-perception::pipeline"`.
    pub component: String,
    /// Instance id, for multi-agent processes.
    pub id: String,
}

impl EventSource {
    pub fn new(component: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            id: id.into(),
        }
    }
}

/// Variants of data routed over the internal event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Raw(RawPerceptionEvent),
    Signal(PerceptionSignal),
    Bot(BotEvent),
    Json(serde_json::Value),
}

/// Unified event wrapper for the topic-based event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    /// Routing topic, e.g. `"perception"` or `"raw:sighted:sneak_toggle"`.
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    /// Optional trace correlation id carried across republications.
    pub trace: Option<Uuid>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(topic: impl Into<String>, source: EventSource, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            timestamp: Utc::now(),
            source,
            trace: None,
            payload,
        }
    }

    /// Attach a trace correlation id.
    pub fn with_trace(mut self, trace: Uuid) -> Self {
        self.trace = Some(trace);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning pipeline stages, reflex behaviors, decision
/// cycles, and bus plumbing.
#[derive(Error, Debug)]
pub enum MindError {
    #[error("Stage '{stage}' failed: {details}")]
    Stage { stage: String, details: String },

    #[error("Behavior '{behavior}' failed: {details}")]
    Behavior { behavior: String, details: String },

    #[error("Decision cycle failed: {0}")]
    Decision(String),

    #[error("Event bus error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percept_modality_and_kind_mapping() {
        let sneak = Percept::SneakToggle {
            entity_id: "e1".into(),
            sneaking: true,
            distance: 3.0,
        };
        assert_eq!(sneak.modality(), Modality::Sighted);
        assert_eq!(sneak.kind(), "sneak_toggle");

        let chat = Percept::Chat {
            speaker: "steve".into(),
            message: "hi".into(),
        };
        assert_eq!(chat.modality(), Modality::Heard);
        assert_eq!(chat.kind(), "chat");

        let hp = Percept::HealthChanged {
            health: 12.0,
            food: 20.0,
            delta: -4.0,
        };
        assert_eq!(hp.modality(), Modality::Felt);

        let joined = Percept::PlayerJoined {
            entity_id: "e2".into(),
            name: "alex".into(),
        };
        assert_eq!(joined.modality(), Modality::System);
    }

    #[test]
    fn raw_topic_is_derived_from_modality_and_kind() {
        let event = RawPerceptionEvent::new(
            "binding::test",
            Percept::SneakToggle {
                entity_id: "e1".into(),
                sneaking: true,
                distance: 2.0,
            },
        );
        assert_eq!(event.raw_topic(), "raw:sighted:sneak_toggle");
    }

    #[test]
    fn percept_entity_id_extraction() {
        let swing = Percept::EntitySwing {
            entity_id: "zombie_4".into(),
            entity_kind: EntityKind::Mob,
            distance: 5.0,
        };
        assert_eq!(swing.entity_id(), Some("zombie_4"));

        let sound = Percept::SoundHeard {
            sound_id: "door_open".into(),
            position: None,
            distance: 10.0,
        };
        assert_eq!(sound.entity_id(), None);
    }

    #[test]
    fn signal_strength_is_clamped() {
        let signal = PerceptionSignal::new("teabag", Some("e1".into()), 1.7);
        assert_eq!(signal.strength, 1.0);
        let signal = PerceptionSignal::new("teabag", None, -0.3);
        assert_eq!(signal.strength, 0.0);
    }

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "perception",
            EventSource::new("botmind-perception::pipeline", "bot-1"),
            EventPayload::Signal(PerceptionSignal::new("teabag", Some("e1".into()), 0.8)),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event.id, back.id);
        assert_eq!(back.topic, "perception");
    }

    #[test]
    fn action_body_roundtrip() {
        let body = ActionBody::Tool {
            mode: ExecMode::Sequential,
            steps: vec![ToolStep {
                tool: "goto".into(),
                params: serde_json::json!({"x": 1, "z": -4}),
            }],
        };
        let json = serde_json::to_string(&body).unwrap();
        let back: ActionBody = serde_json::from_str(&json).unwrap();
        assert_eq!(body, back);
    }

    #[test]
    fn bot_event_chat_roundtrip() {
        let event = BotEvent::Chat {
            speaker: "steve".into(),
            message: "follow me".into(),
            at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: BotEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn vec3_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn mind_error_display() {
        let err = MindError::Stage {
            stage: "attention".into(),
            details: "publish failed".into(),
        };
        assert!(err.to_string().contains("attention"));

        let err2 = MindError::Behavior {
            behavior: "greet".into(),
            details: "chat rejected".into(),
        };
        assert!(err2.to_string().contains("greet"));
    }
}
