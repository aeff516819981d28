//! [`ConsciousController`] – the deliberative orchestrator.
//!
//! Interprets the pure [`OodaMachine`]'s effects against the real world:
//! renders prompts, calls the [`Reasoner`], dispatches approved actions to
//! the bus, and feeds every outcome back into the machine as events.  The
//! debounce and barrier timers live here too, above the machine, so the
//! machine itself stays time-free and fully unit-testable.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use botmind_bus::EventBus;
use botmind_reflex::ReflexContext;
use botmind_types::{
    ActionInstruction, ActionOutcome, BotEvent, Event, EventPayload, EventSource, Percept,
};
use tracing::{debug, error, info, warn};

use crate::blackboard::Blackboard;
use crate::config::ConsciousConfig;
use crate::context_view::build_context_view;
use crate::feedback::{Barrier, BarrierExpired, Debouncer};
use crate::machine::{ConsciousDiagnostics, Effect, MachineEvent, OodaMachine};
use crate::reasoner::{Prompt, Reasoner};

/// Supplies the current reflex context snapshot for prompt construction.
pub trait ContextSource: Send + Sync {
    fn snapshot(&self) -> ReflexContext;
}

impl<F> ContextSource for F
where
    F: Fn() -> ReflexContext + Send + Sync,
{
    fn snapshot(&self) -> ReflexContext {
        self()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ConsciousController
// ─────────────────────────────────────────────────────────────────────────────

pub struct ConsciousController {
    machine: OodaMachine,
    reasoner: Arc<dyn Reasoner>,
    bus: EventBus,
    context_source: Arc<dyn ContextSource>,
    debouncer: Debouncer,
    debounced_rx: tokio::sync::mpsc::UnboundedReceiver<BotEvent>,
    barrier: Barrier,
    barrier_rx: tokio::sync::mpsc::UnboundedReceiver<BarrierExpired>,
    config: ConsciousConfig,
    source: EventSource,
    stopped: bool,
}

impl ConsciousController {
    pub fn new(
        config: ConsciousConfig,
        reasoner: Arc<dyn Reasoner>,
        bus: EventBus,
        context_source: Arc<dyn ContextSource>,
    ) -> Self {
        let (debouncer, debounced_rx) = Debouncer::new(Duration::from_millis(config.debounce_ms));
        let (barrier, barrier_rx) = Barrier::new(Duration::from_millis(config.barrier_ms));
        let blackboard = Blackboard::new(config.self_username.clone());
        let machine = OodaMachine::new(blackboard, config.max_decision_attempts);
        Self {
            machine,
            reasoner,
            bus,
            context_source,
            debouncer,
            debounced_rx,
            barrier,
            barrier_rx,
            config,
            source: EventSource::new("botmind-conscious::controller", "bot"),
            stopped: false,
        }
    }

    pub fn diagnostics(&self) -> ConsciousDiagnostics {
        self.machine.diagnostics()
    }

    pub fn blackboard(&self) -> &Blackboard {
        self.machine.blackboard()
    }

    // ── Machine driving ──────────────────────────────────────────────────────

    /// Feed one event through the machine and perform every resulting effect,
    /// including follow-up events the effects produce, until quiescent.
    pub async fn drive(&mut self, event: MachineEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(machine_event) = queue.pop_front() {
            for effect in self.machine.handle(machine_event) {
                match effect {
                    Effect::BuildContext(stimulus) => {
                        let prompt = self.build_prompt(&stimulus);
                        queue.push_back(MachineEvent::ContextBuilt(prompt));
                    }
                    Effect::Decide(prompt) => match self.reasoner.decide(&prompt).await {
                        Ok(decision) => queue.push_back(MachineEvent::DecisionReady(decision)),
                        Err(err) => queue.push_back(MachineEvent::DecisionFailed(err)),
                    },
                    Effect::Execute(actions) => self.dispatch_actions(actions),
                    Effect::NotifyFailure(message) => self.notify_failure(&message),
                }
            }
        }
    }

    fn dispatch_actions(&mut self, actions: Vec<ActionInstruction>) {
        let feedback_ids: BTreeSet<u64> = actions
            .iter()
            .filter(|a| a.require_feedback)
            .map(|a| a.id)
            .collect();

        for instruction in &actions {
            debug!(id = instruction.id, "dispatching action");
            match serde_json::to_value(instruction) {
                Ok(json) => {
                    let event = Event::new(
                        "action:dispatch",
                        self.source.clone(),
                        EventPayload::Json(json),
                    );
                    // Best-effort: no executor listening yet is not an error.
                    let _ = self.bus.publish(event);
                }
                Err(err) => error!(id = instruction.id, %err, "action serialisation failed"),
            }
        }
        self.barrier.arm(feedback_ids);
    }

    fn notify_failure(&self, message: &str) {
        warn!(message, "decision cycle failed");
        let event = Event::new(
            "conscious:failure",
            self.source.clone(),
            EventPayload::Json(serde_json::json!({ "message": message })),
        );
        let _ = self.bus.publish(event);
    }

    // ── Prompt construction ──────────────────────────────────────────────────

    fn build_prompt(&mut self, stimulus: &BotEvent) -> Prompt {
        let view = build_context_view(&self.context_source.snapshot());
        self.machine.blackboard_mut().set_context_view(view);
        let board = self.machine.blackboard();

        let chat_lines: Vec<String> = board
            .chat_history()
            .map(|c| format!("- {}: {}", c.speaker, c.message))
            .collect();
        let action_lines: Vec<String> = board
            .recent_actions()
            .map(|r| format!("- #{} {} -> {:?}", r.action_id, r.summary, r.outcome))
            .collect();

        let system = format!(
            "You are {name}, an autonomous game agent.\n\
             Reply with a single JSON object matching the Decision schema. No prose.\n\
             ## Direction\n\
             Goal: {goal}\nTask: {task}\nStrategy: {strategy}\n\
             ## Self\n{self_summary}\n\
             ## Environment\n{environment}\n\
             ## Recent chat\n{chat}\n\
             ## Recent actions\n{actions}\n",
            name = if board.self_username.is_empty() {
                "an unnamed bot"
            } else {
                &board.self_username
            },
            goal = board.ultimate_goal.as_deref().unwrap_or("(none)"),
            task = board.current_task.as_deref().unwrap_or("(none)"),
            strategy = board.strategy.as_deref().unwrap_or("(none)"),
            self_summary = board.context_view.self_summary,
            environment = board.context_view.environment_summary,
            chat = if chat_lines.is_empty() {
                "(none)".to_string()
            } else {
                chat_lines.join("\n")
            },
            actions = if action_lines.is_empty() {
                "(none)".to_string()
            } else {
                action_lines.join("\n")
            },
        );

        let user = match stimulus {
            BotEvent::Signal(signal) => format!(
                "You noticed a '{}' burst{} (strength {:.2}). How do you respond?",
                signal.signal_type,
                signal
                    .source_id
                    .as_deref()
                    .map(|s| format!(" from {s}"))
                    .unwrap_or_default(),
                signal.strength,
            ),
            BotEvent::Chat {
                speaker, message, ..
            } => format!("{speaker} said: \"{message}\". How do you respond?"),
            BotEvent::ActionFeedback {
                action_id,
                outcome,
                detail,
            } => format!(
                "Your action #{action_id} reported {outcome:?}{}. What next?",
                detail
                    .as_deref()
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default(),
            ),
        };

        Prompt { system, user }
    }

    // ── Bus intake ───────────────────────────────────────────────────────────

    /// Route one inbound bus event into the machine.
    async fn handle_bus_event(&mut self, event: Event) {
        match event.payload {
            EventPayload::Signal(signal) => {
                self.drive(MachineEvent::Enqueue(BotEvent::Signal(signal))).await;
            }
            EventPayload::Raw(raw) => {
                if let Percept::Chat { speaker, message } = raw.percept {
                    if speaker == self.config.self_username {
                        return; // own chatter is not a stimulus
                    }
                    self.machine.blackboard_mut().record_chat(
                        speaker.clone(),
                        message.clone(),
                        raw.timestamp,
                    );
                    self.drive(MachineEvent::Enqueue(BotEvent::Chat {
                        speaker,
                        message,
                        at: raw.timestamp,
                    }))
                    .await;
                }
            }
            EventPayload::Bot(BotEvent::ActionFeedback {
                action_id,
                outcome,
                detail,
            }) => {
                self.handle_action_feedback(action_id, outcome, detail).await;
            }
            _ => {}
        }
    }

    async fn handle_action_feedback(
        &mut self,
        action_id: u64,
        outcome: ActionOutcome,
        detail: Option<String>,
    ) {
        match outcome {
            ActionOutcome::Started => {
                self.drive(MachineEvent::ActionStarted(action_id)).await;
            }
            ActionOutcome::Completed | ActionOutcome::Failed => {
                if self.barrier.report(action_id) {
                    debug!("feedback barrier cleared early");
                }
                self.drive(MachineEvent::ActionResolved {
                    id: action_id,
                    outcome,
                    detail: detail.clone(),
                })
                .await;
                // Resolved feedback is also a stimulus, debounced so a burst
                // of completions triggers one reasoning turn.
                self.debouncer.push(BotEvent::ActionFeedback {
                    action_id,
                    outcome,
                    detail,
                });
            }
        }
    }

    async fn handle_barrier_expired(&mut self, expired: BarrierExpired) {
        debug!(armed = ?expired.armed, "feedback barrier expired");
        self.barrier.clear();
        self.drive(MachineEvent::ExecutionExpired).await;
    }

    /// Drive the controller from the bus until it closes.
    pub async fn run(mut self) {
        let mut signals = self.bus.subscribe_topic("perception");
        let mut chat = self.bus.subscribe_topic("raw:heard:chat");
        let mut actions = self.bus.subscribe_topic("action:started");
        let mut resolutions = self.bus.subscribe_topic("action:completed");
        let mut failures = self.bus.subscribe_topic("action:failed");
        info!("conscious controller running");

        loop {
            tokio::select! {
                event = signals.recv() => {
                    let Some(event) = event else { break };
                    self.handle_bus_event(event).await;
                }
                event = chat.recv() => {
                    let Some(event) = event else { break };
                    self.handle_bus_event(event).await;
                }
                event = actions.recv() => {
                    let Some(event) = event else { break };
                    self.handle_bus_event(event).await;
                }
                event = resolutions.recv() => {
                    let Some(event) = event else { break };
                    self.handle_bus_event(event).await;
                }
                event = failures.recv() => {
                    let Some(event) = event else { break };
                    self.handle_bus_event(event).await;
                }
                Some(stimulus) = self.debounced_rx.recv() => {
                    self.drive(MachineEvent::Enqueue(stimulus)).await;
                }
                Some(expired) = self.barrier_rx.recv() => {
                    self.handle_barrier_expired(expired).await;
                }
            }
        }

        self.stop();
        info!("conscious controller stopped");
    }

    /// Cancel outstanding timers.  Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.debouncer.cancel();
        self.barrier.clear();
    }
}
