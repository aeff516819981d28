//! [`PerceptionPipeline`] – ordered enrichment stages over raw events.
//!
//! Each raw event is wrapped in a short-lived [`PerceptionFrame`], run through
//! the saliency engine, and then through an ordered, short-circuiting list of
//! stages:
//!
//! 1. *entity_update* – player-bearing events overwrite the entity's belief.
//! 2. *attention* – the raw event is republished on the bus under
//!    `raw:<modality>:<kind>` for downstream rule-matching consumers.
//! 3. *router* – saliency signals attached to the frame are drained, recorded
//!    as named confidences on the attributed entity, and emitted as
//!    `perception` events.
//!
//! A failing stage abandons that frame only; subsequent frames are processed
//! normally.

use botmind_bus::EventBus;
use botmind_types::{
    EntityBelief, EntityKind, Event, EventPayload, EventSource, MindError, Percept,
    PerceptionSignal, RawPerceptionEvent,
};
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::beliefs::SharedBeliefs;
use crate::saliency::SaliencyEngine;

// ─────────────────────────────────────────────────────────────────────────────
// Frame
// ─────────────────────────────────────────────────────────────────────────────

/// A raw event plus the signals accumulated while traversing the stages.
/// Created per raw event and discarded when the pipeline finishes with it.
#[derive(Debug)]
pub struct PerceptionFrame {
    pub event: RawPerceptionEvent,
    pub signals: Vec<PerceptionSignal>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stages
// ─────────────────────────────────────────────────────────────────────────────

/// Collaborators a stage may touch while processing a frame.
pub struct StageContext<'a> {
    pub beliefs: &'a SharedBeliefs,
    pub bus: &'a EventBus,
    pub source: &'a EventSource,
}

/// One ordered pipeline step.
pub trait Stage: Send {
    fn name(&self) -> &'static str;

    /// Process `frame`.  An error abandons the frame; later stages do not run.
    fn process(&mut self, frame: &mut PerceptionFrame, cx: &mut StageContext<'_>)
    -> Result<(), MindError>;
}

/// Stage 1: upsert an [`EntityBelief`] for player-bearing percepts.
pub struct EntityUpdateStage;

impl EntityUpdateStage {
    /// Build the replacement belief, or `None` when the percept does not
    /// describe a player.
    fn belief_from(percept: &Percept) -> Option<EntityBelief> {
        let now = Utc::now();
        match percept {
            Percept::PlayerJoined { entity_id, name } => Some(EntityBelief {
                id: entity_id.clone(),
                kind: EntityKind::Player,
                name: Some(name.clone()),
                position: None,
                sneaking: None,
                confidences: Default::default(),
                last_updated_at: now,
            }),
            Percept::PlayerUpdated {
                entity_id,
                name,
                position,
                sneaking,
            } => Some(EntityBelief {
                id: entity_id.clone(),
                kind: EntityKind::Player,
                name: Some(name.clone()),
                position: Some(*position),
                sneaking: Some(*sneaking),
                confidences: Default::default(),
                last_updated_at: now,
            }),
            // Sneaking is a player-only control, so a toggle is enough to
            // start tracking an otherwise unseen entity.
            Percept::SneakToggle {
                entity_id, sneaking, ..
            } => Some(EntityBelief {
                id: entity_id.clone(),
                kind: EntityKind::Player,
                name: None,
                position: None,
                sneaking: Some(*sneaking),
                confidences: Default::default(),
                last_updated_at: now,
            }),
            Percept::EntityMoved {
                entity_id,
                entity_kind: EntityKind::Player,
                position,
                ..
            } => Some(EntityBelief {
                id: entity_id.clone(),
                kind: EntityKind::Player,
                name: None,
                position: Some(*position),
                sneaking: None,
                confidences: Default::default(),
                last_updated_at: now,
            }),
            _ => None,
        }
    }
}

impl Stage for EntityUpdateStage {
    fn name(&self) -> &'static str {
        "entity_update"
    }

    fn process(
        &mut self,
        frame: &mut PerceptionFrame,
        cx: &mut StageContext<'_>,
    ) -> Result<(), MindError> {
        if let Some(belief) = Self::belief_from(&frame.event.percept) {
            cx.beliefs.upsert(belief);
        }
        Ok(())
    }
}

/// Stage 2: republish the raw event under its `raw:<modality>:<kind>` topic.
/// This is the seam that decouples the pipeline from downstream rule matchers.
pub struct AttentionStage;

impl Stage for AttentionStage {
    fn name(&self) -> &'static str {
        "attention"
    }

    fn process(
        &mut self,
        frame: &mut PerceptionFrame,
        cx: &mut StageContext<'_>,
    ) -> Result<(), MindError> {
        let event = Event::new(
            frame.event.raw_topic(),
            cx.source.clone(),
            EventPayload::Raw(frame.event.clone()),
        )
        .with_trace(frame.event.id);
        // Best-effort publish – a topic nobody subscribes to yet is normal.
        let _ = cx.bus.publish(event);
        Ok(())
    }
}

/// Stage 3: drain saliency signals off the frame, record their strengths as
/// named confidences on the attributed entity, and emit them as `perception`
/// events.
pub struct RouterStage;

impl Stage for RouterStage {
    fn name(&self) -> &'static str {
        "router"
    }

    fn process(
        &mut self,
        frame: &mut PerceptionFrame,
        cx: &mut StageContext<'_>,
    ) -> Result<(), MindError> {
        for signal in std::mem::take(&mut frame.signals) {
            if let Some(entity_id) = &signal.source_id {
                cx.beliefs
                    .set_confidence(entity_id, &signal.signal_type, signal.strength);
            }
            debug!(signal = %signal.signal_type, "routing saliency signal");
            let event = Event::new(
                "perception",
                cx.source.clone(),
                EventPayload::Signal(signal),
            )
            .with_trace(frame.event.id);
            let _ = cx.bus.publish(event);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// The perception pipeline: saliency ingest plus the ordered stage list.
pub struct PerceptionPipeline {
    saliency: SaliencyEngine,
    beliefs: SharedBeliefs,
    bus: EventBus,
    source: EventSource,
    stages: Vec<Box<dyn Stage>>,
}

impl PerceptionPipeline {
    /// Build a pipeline with the standard stage order.
    pub fn new(saliency: SaliencyEngine, beliefs: SharedBeliefs, bus: EventBus) -> Self {
        Self {
            saliency,
            beliefs,
            bus,
            source: EventSource::new("botmind-perception::pipeline", "default"),
            stages: vec![
                Box::new(EntityUpdateStage),
                Box::new(AttentionStage),
                Box::new(RouterStage),
            ],
        }
    }

    /// Replace the stage list (testing / custom deployments).
    pub fn with_stages(mut self, stages: Vec<Box<dyn Stage>>) -> Self {
        self.stages = stages;
        self
    }

    /// Advance the saliency window one slot.
    pub fn advance_slot(&mut self) {
        self.saliency.advance_slot();
    }

    /// Run one raw event through saliency ingest and the stage list.
    ///
    /// A stage error abandons this frame only; the error is logged and
    /// returned so callers can count failures, but the pipeline stays usable.
    pub fn process(&mut self, event: RawPerceptionEvent) -> Result<(), MindError> {
        let mut frame = PerceptionFrame {
            signals: self.saliency.ingest(&event).into_iter().collect(),
            event,
        };
        let mut cx = StageContext {
            beliefs: &self.beliefs,
            bus: &self.bus,
            source: &self.source,
        };
        for stage in &mut self.stages {
            if let Err(err) = stage.process(&mut frame, &mut cx) {
                warn!(stage = stage.name(), error = %err, "stage failed; frame abandoned");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Read-only saliency diagnostics.
    pub fn saliency_snapshot(&self) -> crate::saliency::SaliencySnapshot {
        self.saliency.snapshot()
    }

    /// Handle to the belief store for cross-controller queries.
    pub fn beliefs(&self) -> SharedBeliefs {
        self.beliefs.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Async driver
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the single repeating slot timer and the raw-event intake.
///
/// The slot timer must be strictly periodic (missed ticks are made up rather
/// than skipped) or window totals drift.  The loop exits when the raw-event
/// sender is dropped; dropping the returned task handle is an idempotent stop.
pub struct PerceptionLoop {
    pipeline: PerceptionPipeline,
    raw_rx: mpsc::Receiver<RawPerceptionEvent>,
    slot_ms: u64,
}

impl PerceptionLoop {
    pub fn new(
        pipeline: PerceptionPipeline,
        raw_rx: mpsc::Receiver<RawPerceptionEvent>,
        slot_ms: u64,
    ) -> Self {
        Self {
            pipeline,
            raw_rx,
            slot_ms,
        }
    }

    pub async fn run(mut self) {
        let mut slot_tick = interval(Duration::from_millis(self.slot_ms));
        slot_tick.set_missed_tick_behavior(MissedTickBehavior::Burst);
        loop {
            tokio::select! {
                _ = slot_tick.tick() => {
                    self.pipeline.advance_slot();
                }
                maybe_event = self.raw_rx.recv() => {
                    match maybe_event {
                        // Frame failures are already logged; keep going.
                        Some(event) => { let _ = self.pipeline.process(event); }
                        None => break,
                    }
                }
            }
        }
    }
}
