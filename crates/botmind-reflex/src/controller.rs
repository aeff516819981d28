//! [`ReflexController`] – the fast-lane orchestrator.
//!
//! Owns the [`ReflexContext`], the [`ModeMachine`], and the
//! [`BehaviorSelector`], and drives them from two inputs: bus events
//! (signals, chat, raw percepts, action feedback) and a fixed-period tick.
//! Event handlers only update the context copy-on-write; all acting happens
//! in [`ReflexController::tick`], so behavior stays deterministic per tick
//! regardless of event arrival order within a period.

use std::sync::Arc;
use std::time::{Duration, Instant};

use botmind_bus::EventBus;
use botmind_types::{
    ActionOutcome, BotEvent, Event, EventPayload, Percept, PerceptionSignal, ReflexIntent,
};
use serde::Serialize;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::behavior::{BehaviorSelector, ReflexBehavior};
use crate::context::{NearbyPlayer, ReflexContext};
use crate::executor::ReflexExecutor;
use crate::mode::{ModeChange, ModeMachine, ReflexMode};

/// Threat contribution per unit of signal strength.
const AGGRESSION_THREAT_GAIN: f64 = 2.0;
const UNDER_ATTACK_THREAT_GAIN: f64 = 4.0;
/// Threat decays once no threat signal has arrived for this long.
const THREAT_STALE_AFTER: Duration = Duration::from_secs(3);
const THREAT_DECAY_FACTOR: f64 = 0.8;

/// Gesture pacing: four sneak pulses, 150 ms per edge.
const GESTURE_PULSES: u32 = 4;
const GESTURE_EDGE_DELAY: Duration = Duration::from_millis(150);

/// Snapshot of the controller's observable state, for logs and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct ReflexDiagnostics {
    pub mode: ReflexMode,
    pub follow_target: Option<String>,
    pub in_flight_actions: usize,
    pub threat_score: f64,
    pub busy: bool,
    pub last_behavior: Option<&'static str>,
    pub last_intent: Option<ReflexIntent>,
}

// ─────────────────────────────────────────────────────────────────────────────
// ReflexController
// ─────────────────────────────────────────────────────────────────────────────

pub struct ReflexController {
    ctx: ReflexContext,
    machine: ModeMachine,
    selector: BehaviorSelector,
    executor: Arc<dyn ReflexExecutor>,
    in_flight_actions: usize,
    last_behavior: Option<&'static str>,
    last_intent: Option<ReflexIntent>,
}

impl ReflexController {
    pub fn new(executor: Arc<dyn ReflexExecutor>, interaction_range: f64) -> Self {
        Self {
            ctx: ReflexContext::default(),
            machine: ModeMachine::new(interaction_range),
            selector: BehaviorSelector::new(),
            executor,
            in_flight_actions: 0,
            last_behavior: None,
            last_intent: None,
        }
    }

    /// Register a behavior.  Order matters: earlier registrations win ties.
    pub fn register_behavior(&mut self, behavior: Box<dyn ReflexBehavior>) {
        self.selector.register(behavior);
    }

    pub fn mode(&self) -> ReflexMode {
        self.machine.mode()
    }

    pub fn context(&self) -> &ReflexContext {
        &self.ctx
    }

    pub fn diagnostics(&self) -> ReflexDiagnostics {
        ReflexDiagnostics {
            mode: self.machine.mode(),
            follow_target: self.machine.follow_target().map(str::to_string),
            in_flight_actions: self.in_flight_actions,
            threat_score: self.ctx.threat.score,
            busy: self.selector.is_busy(Instant::now()),
            last_behavior: self.last_behavior,
            last_intent: self.last_intent.clone(),
        }
    }

    // ── Context updates (copy-on-write) ──────────────────────────────────────

    /// Fold a saliency signal into attention and threat state.
    pub fn apply_signal(&mut self, signal: &PerceptionSignal, now: Instant) {
        let mut updated = self.ctx.clone();
        updated.attention.last_signal_type = Some(signal.signal_type.clone());
        updated.attention.last_signal_source = signal.source_id.clone();
        updated.attention.last_signal_at = Some(now);

        let gain = match signal.signal_type.as_str() {
            "aggression" => Some(AGGRESSION_THREAT_GAIN),
            "under_attack" => Some(UNDER_ATTACK_THREAT_GAIN),
            _ => None,
        };
        if let Some(gain) = gain {
            updated.threat.score += gain * signal.strength;
            updated.threat.last_threat_at = Some(now);
            updated.threat.last_threat_source = signal.source_id.clone();
        }
        self.ctx = updated;
    }

    pub fn apply_chat(&mut self, speaker: &str, message: &str, now: Instant) {
        let mut updated = self.ctx.clone();
        updated.social.last_speaker = Some(speaker.to_string());
        updated.social.last_message = Some(message.to_string());
        updated.social.last_message_at = Some(now);
        self.ctx = updated;
    }

    pub fn apply_health(&mut self, health: f64, food: f64) {
        let mut updated = self.ctx.clone();
        updated.self_state.health = health;
        updated.self_state.food = food;
        self.ctx = updated;
    }

    /// Refresh a nearby-player entry from a sighted percept.
    pub fn apply_player_sighting(&mut self, player: NearbyPlayer) {
        let mut updated = self.ctx.clone();
        match updated
            .environment
            .nearby_players
            .iter_mut()
            .find(|p| p.entity_id == player.entity_id)
        {
            Some(existing) => *existing = player,
            None => updated.environment.nearby_players.push(player),
        }
        self.ctx = updated;
    }

    pub fn set_in_flight(&mut self, count: usize) {
        self.in_flight_actions = count;
    }

    // ── The tick ─────────────────────────────────────────────────────────────

    /// One reflex period: decay threat, run the mode guards, then select and
    /// run at most one behavior.  Returns the id of the behavior that ran.
    pub async fn tick(&mut self, now: Instant) -> Option<&'static str> {
        self.decay_threat(now);

        if let Some(change) = self.machine.evaluate(&self.ctx, now, self.in_flight_actions) {
            self.apply_mode_change(&change).await;
        }

        let behavior = self.selector.select(self.machine.mode(), &self.ctx, now)?;
        let id = behavior.id();
        let outcome = match behavior.run(&self.ctx, now) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(behavior = id, %error, "reflex behavior failed");
                return None;
            }
        };

        self.selector.mark_ran(id, now);
        self.last_behavior = Some(id);
        if let Some(updated) = outcome.context {
            self.ctx = updated;
        }
        if let Some(intent) = outcome.intent {
            debug!(behavior = id, ?intent, "dispatching reflex intent");
            self.last_intent = Some(intent.clone());
            self.dispatch(intent, now);
        }
        Some(id)
    }

    /// External mode override (the deliberative loop starting or stopping a
    /// task regime).
    pub async fn force_mode(&mut self, to: ReflexMode) {
        if let Some(change) = self.machine.force(to, &self.ctx) {
            self.apply_mode_change(&change).await;
        }
    }

    /// Idempotent shutdown: drop to `Idle` and abort any movement.
    pub async fn stop(&mut self) {
        if let Some(change) = self.machine.stop(&self.ctx) {
            self.apply_mode_change(&change).await;
        }
        if let Err(error) = self.executor.interrupt().await {
            warn!(%error, "interrupt on stop failed");
        }
    }

    fn decay_threat(&mut self, now: Instant) {
        let stale = self
            .ctx
            .threat
            .last_threat_at
            .is_none_or(|at| now.duration_since(at) > THREAT_STALE_AFTER);
        if stale && self.ctx.threat.score > 0.0 {
            let mut updated = self.ctx.clone();
            updated.threat.score *= THREAT_DECAY_FACTOR;
            if updated.threat.score < 0.05 {
                updated.threat.score = 0.0;
            }
            self.ctx = updated;
        }
    }

    async fn apply_mode_change(&mut self, change: &ModeChange) {
        info!(from = ?change.from, to = ?change.to, "reflex mode change");
        if change.release_follow {
            if let Err(error) = self.executor.interrupt().await {
                warn!(%error, "follow release failed");
            }
        }
        if let Some(target) = &change.follow {
            if let Err(error) = self.executor.follow(target).await {
                warn!(%error, target, "follow start failed");
            }
        }
    }

    /// Fire an intent.  Chat and gaze are near-instant and awaited from the
    /// spawned task just the same; the gesture takes over a second, so the
    /// busy guard blocks further selection until its estimated end.
    fn dispatch(&mut self, intent: ReflexIntent, now: Instant) {
        if let ReflexIntent::Gesture = intent {
            let duration = GESTURE_EDGE_DELAY * (GESTURE_PULSES * 2) + Duration::from_millis(200);
            self.selector.set_busy_until(now + duration);
        }
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            if let Err(error) = execute_intent(executor.as_ref(), intent).await {
                warn!(%error, "reflex intent dispatch failed");
            }
        });
    }

    // ── Bus plumbing ─────────────────────────────────────────────────────────

    /// Drive the controller from the bus until it closes.
    ///
    /// Subscriptions: saliency signals on `perception`, chat on
    /// `raw:heard:chat`, body/sighting percepts on `raw:felt:*` and
    /// `raw:sighted:*`, and task lifecycle on `action:*`.
    pub async fn run(mut self, bus: EventBus, tick_ms: u64) {
        let mut signals = bus.subscribe_topic("perception");
        let mut chat = bus.subscribe_topic("raw:heard:chat");
        let mut felt = bus.subscribe_topic("raw:felt:*");
        let mut sighted = bus.subscribe_topic("raw:sighted:*");
        let mut actions = bus.subscribe_topic("action:*");

        let mut interval = time::interval(Duration::from_millis(tick_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_ms, "reflex controller running");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Instant::now()).await;
                }
                event = signals.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event, Instant::now());
                }
                event = chat.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event, Instant::now());
                }
                event = felt.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event, Instant::now());
                }
                event = sighted.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event, Instant::now());
                }
                event = actions.recv() => {
                    let Some(event) = event else { break };
                    self.handle_event(event, Instant::now());
                }
            }
        }

        self.stop().await;
        info!("reflex controller stopped");
    }

    /// Route one bus event into the appropriate context update.
    pub fn handle_event(&mut self, event: Event, now: Instant) {
        match event.payload {
            EventPayload::Signal(signal) => self.apply_signal(&signal, now),
            EventPayload::Raw(raw) => match raw.percept {
                Percept::Chat { speaker, message } => self.apply_chat(&speaker, &message, now),
                Percept::HealthChanged { health, food, .. } => self.apply_health(health, food),
                Percept::PlayerUpdated {
                    entity_id,
                    name,
                    position,
                    ..
                } => {
                    let distance = self
                        .ctx
                        .self_state
                        .position
                        .map(|own| own.distance_to(&position))
                        .unwrap_or(0.0);
                    self.apply_player_sighting(NearbyPlayer {
                        entity_id,
                        name,
                        position: Some(position),
                        distance,
                        gazing_at_self: false,
                    });
                }
                _ => {}
            },
            EventPayload::Bot(BotEvent::ActionFeedback { outcome, .. }) => match outcome {
                ActionOutcome::Started => self.in_flight_actions += 1,
                ActionOutcome::Completed | ActionOutcome::Failed => {
                    self.in_flight_actions = self.in_flight_actions.saturating_sub(1);
                }
            },
            _ => {}
        }
    }
}

/// Translate an intent into executor primitives.
pub(crate) async fn execute_intent(
    executor: &dyn ReflexExecutor,
    intent: ReflexIntent,
) -> Result<(), botmind_types::MindError> {
    match intent {
        ReflexIntent::Chat { message } => executor.chat(&message).await,
        ReflexIntent::LookAt { target } => executor.look_at(target).await,
        ReflexIntent::Gesture => {
            for _ in 0..GESTURE_PULSES {
                executor.set_control("sneak", true).await?;
                time::sleep(GESTURE_EDGE_DELAY).await;
                executor.set_control("sneak", false).await?;
                time::sleep(GESTURE_EDGE_DELAY).await;
            }
            Ok(())
        }
    }
}
