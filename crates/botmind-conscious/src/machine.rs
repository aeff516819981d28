//! The deliberative OODA state machine.
//!
//! A plain enum + match transition function: `handle(event)` mutates the
//! [`MachineCtx`] and returns the effects the caller must perform.  The
//! machine itself never does IO; building prompts, calling the reasoner,
//! and dispatching actions all happen in the controller, which feeds the
//! results back in as further [`MachineEvent`]s.
//!
//! | State | Meaning |
//! |---|---|
//! | `Idle` | Nothing to do; waiting for a stimulus. |
//! | `Thinking` | A stimulus was dequeued; the prompt is being built. |
//! | `Deciding` | The reasoner call is outstanding (or retrying). |
//! | `Evaluating` | A decision arrived; registering its actions. |
//! | `Executing` | Issued actions are pending or in flight. |
//!
//! `Evaluating` is transient: it is entered and passed through within a
//! single `handle` call, so observers only ever see it in logs.
//!
//! When the feedback barrier expires, only actions that promised lifecycle
//! feedback are recorded as `Failed`; fire-and-forget actions are merely
//! dropped from the turn's bookkeeping and may still resolve into the
//! action history later.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use botmind_types::{ActionInstruction, ActionOutcome, BotEvent};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blackboard::{ActionRecord, Blackboard, summarize_action};
use crate::reasoner::{Decision, DecisionError, Prompt};

// ─────────────────────────────────────────────────────────────────────────────
// States, events, effects
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OodaState {
    Idle,
    Thinking,
    Deciding,
    Evaluating,
    Executing,
}

/// Inputs to the transition function.
#[derive(Debug)]
pub enum MachineEvent {
    /// A stimulus arrived for the conscious queue.
    Enqueue(BotEvent),
    /// The controller finished rendering the prompt for the current event.
    ContextBuilt(Prompt),
    /// Prompt construction failed; the event is discarded.
    ContextFailed(String),
    DecisionReady(Decision),
    DecisionFailed(DecisionError),
    ActionStarted(u64),
    ActionResolved {
        id: u64,
        outcome: ActionOutcome,
        detail: Option<String>,
    },
    /// The feedback barrier expired; actions that promised feedback are
    /// written off, the rest are left free to resolve late.
    ExecutionExpired,
    /// Re-check the queue (used by the controller after external changes).
    Poll,
}

/// Work the controller must perform after a transition.
#[derive(Debug, PartialEq)]
pub enum Effect {
    /// Render a prompt for this stimulus.
    BuildContext(BotEvent),
    /// Call the reasoner with this prompt.
    Decide(Prompt),
    /// Dispatch these actions to the executor.
    Execute(Vec<ActionInstruction>),
    /// Surface a user-visible decision failure.
    NotifyFailure(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Machine context
// ─────────────────────────────────────────────────────────────────────────────

/// All mutable state the transition function operates on.
#[derive(Debug, Default)]
pub struct MachineCtx {
    pub event_queue: VecDeque<BotEvent>,
    pub blackboard: Blackboard,
    pub pending: BTreeMap<u64, ActionInstruction>,
    pub in_flight: BTreeSet<u64>,
    pub retry_count: u32,
    pub current_event: Option<BotEvent>,
    pub last_prompt: Option<Prompt>,
    pub last_decision: Option<Decision>,
    next_action_id: u64,
    /// Action summaries kept until resolution, for history records.
    summaries: BTreeMap<u64, String>,
    /// Ids of the current turn's actions that promised lifecycle feedback.
    awaiting_feedback: BTreeSet<u64>,
}

/// Read-only snapshot for logs and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct ConsciousDiagnostics {
    pub state: OodaState,
    pub queue_len: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub retry_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// OodaMachine
// ─────────────────────────────────────────────────────────────────────────────

pub struct OodaMachine {
    state: OodaState,
    ctx: MachineCtx,
    max_decision_attempts: u32,
}

impl OodaMachine {
    pub fn new(blackboard: Blackboard, max_decision_attempts: u32) -> Self {
        Self {
            state: OodaState::Idle,
            ctx: MachineCtx {
                blackboard,
                ..MachineCtx::default()
            },
            max_decision_attempts: max_decision_attempts.max(1),
        }
    }

    pub fn state(&self) -> OodaState {
        self.state
    }

    pub fn ctx(&self) -> &MachineCtx {
        &self.ctx
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.ctx.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.ctx.blackboard
    }

    pub fn diagnostics(&self) -> ConsciousDiagnostics {
        ConsciousDiagnostics {
            state: self.state,
            queue_len: self.ctx.event_queue.len(),
            pending: self.ctx.pending.len(),
            in_flight: self.ctx.in_flight.len(),
            retry_count: self.ctx.retry_count,
        }
    }

    /// Advance the machine by one event, returning the effects to perform.
    pub fn handle(&mut self, event: MachineEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            MachineEvent::Enqueue(stimulus) => {
                self.ctx.event_queue.push_back(stimulus);
                if self.state == OodaState::Idle {
                    self.start_thinking(&mut effects);
                }
            }
            MachineEvent::Poll => {
                if self.state == OodaState::Idle {
                    self.start_thinking(&mut effects);
                }
            }
            MachineEvent::ContextBuilt(prompt) => {
                if self.state != OodaState::Thinking {
                    debug!(state = ?self.state, "ContextBuilt outside Thinking; ignored");
                    return effects;
                }
                self.ctx.last_prompt = Some(prompt.clone());
                self.state = OodaState::Deciding;
                effects.push(Effect::Decide(prompt));
            }
            MachineEvent::ContextFailed(reason) => {
                if self.state != OodaState::Thinking {
                    debug!(state = ?self.state, "ContextFailed outside Thinking; ignored");
                    return effects;
                }
                warn!(reason, "context build failed; discarding event");
                self.ctx.current_event = None;
                self.to_idle(&mut effects);
            }
            MachineEvent::DecisionReady(decision) => {
                if self.state != OodaState::Deciding {
                    debug!(state = ?self.state, "DecisionReady outside Deciding; ignored");
                    return effects;
                }
                self.accept_decision(decision);
                self.evaluate(&mut effects);
            }
            MachineEvent::DecisionFailed(error) => {
                if self.state != OodaState::Deciding {
                    debug!(state = ?self.state, "DecisionFailed outside Deciding; ignored");
                    return effects;
                }
                self.ctx.retry_count += 1;
                let retryable = error.is_transient()
                    && self.ctx.retry_count < self.max_decision_attempts
                    && self.ctx.last_prompt.is_some();
                if retryable {
                    info!(
                        attempt = self.ctx.retry_count + 1,
                        %error,
                        "transient decision failure; retrying with same prompt"
                    );
                    // last_prompt checked above.
                    if let Some(prompt) = self.ctx.last_prompt.clone() {
                        effects.push(Effect::Decide(prompt));
                    }
                } else {
                    warn!(%error, attempts = self.ctx.retry_count, "decision failed for good");
                    effects.push(Effect::NotifyFailure(format!(
                        "I could not decide what to do: {error}"
                    )));
                    self.ctx.retry_count = 0;
                    self.ctx.current_event = None;
                    self.to_idle(&mut effects);
                }
            }
            MachineEvent::ActionStarted(id) => {
                if self.ctx.pending.remove(&id).is_some() {
                    self.ctx.in_flight.insert(id);
                }
            }
            MachineEvent::ActionResolved {
                id,
                outcome,
                detail,
            } => {
                let was_pending = self.ctx.pending.remove(&id).is_some();
                let was_in_flight = self.ctx.in_flight.remove(&id);
                self.ctx.awaiting_feedback.remove(&id);
                // A kept summary means the action was dropped from the turn's
                // bookkeeping (barrier expiry) but may still resolve for real.
                let known = was_pending || was_in_flight || self.ctx.summaries.contains_key(&id);
                if known {
                    let summary = self
                        .ctx
                        .summaries
                        .remove(&id)
                        .unwrap_or_else(|| format!("action #{id}"));
                    self.ctx.blackboard.record_action(ActionRecord {
                        action_id: id,
                        summary,
                        outcome,
                        detail,
                    });
                }
                self.maybe_finish_executing(&mut effects);
            }
            MachineEvent::ExecutionExpired => {
                if self.state != OodaState::Executing {
                    return effects;
                }
                let stragglers: Vec<u64> = self
                    .ctx
                    .pending
                    .keys()
                    .copied()
                    .chain(self.ctx.in_flight.iter().copied())
                    .collect();
                warn!(?stragglers, "feedback barrier expired; settling the turn");
                for id in stragglers {
                    self.ctx.pending.remove(&id);
                    self.ctx.in_flight.remove(&id);
                    if self.ctx.awaiting_feedback.remove(&id) {
                        // The executor promised feedback and never delivered.
                        let summary = self
                            .ctx
                            .summaries
                            .remove(&id)
                            .unwrap_or_else(|| format!("action #{id}"));
                        self.ctx.blackboard.record_action(ActionRecord {
                            action_id: id,
                            summary,
                            outcome: ActionOutcome::Failed,
                            detail: Some("no feedback before barrier expiry".into()),
                        });
                    }
                    // Fire-and-forget actions keep their summary so a late
                    // genuine resolution is still recorded into history.
                }
                self.maybe_finish_executing(&mut effects);
            }
        }
        effects
    }

    // ── Internal transitions ─────────────────────────────────────────────────

    fn start_thinking(&mut self, effects: &mut Vec<Effect>) {
        if let Some(stimulus) = self.ctx.event_queue.pop_front() {
            debug!(?stimulus, "dequeued stimulus");
            self.ctx.current_event = Some(stimulus.clone());
            self.state = OodaState::Thinking;
            effects.push(Effect::BuildContext(stimulus));
        }
    }

    /// Enter Idle, then immediately re-check the queue.
    fn to_idle(&mut self, effects: &mut Vec<Effect>) {
        self.state = OodaState::Idle;
        self.start_thinking(effects);
    }

    fn accept_decision(&mut self, decision: Decision) {
        self.ctx.blackboard.merge_direction(
            decision.goal.clone(),
            decision.task.clone(),
            decision.strategy.clone(),
        );
        // Drop summaries for prior-turn actions that never resolved, so the
        // map stays bounded by the live turn.
        let MachineCtx {
            pending,
            in_flight,
            summaries,
            ..
        } = &mut self.ctx;
        summaries.retain(|id, _| pending.contains_key(id) || in_flight.contains(id));
        for proposed in &decision.actions {
            self.ctx.next_action_id += 1;
            let instruction = ActionInstruction {
                id: self.ctx.next_action_id,
                require_feedback: proposed.require_feedback,
                body: proposed.body.clone(),
            };
            self.ctx.blackboard.log_pending(&instruction);
            if instruction.require_feedback {
                self.ctx.awaiting_feedback.insert(instruction.id);
            }
            self.ctx
                .summaries
                .insert(instruction.id, summarize_action(&instruction));
            self.ctx.pending.insert(instruction.id, instruction);
        }
        info!(
            thought = %decision.thought,
            actions = decision.actions.len(),
            "decision accepted"
        );
        self.ctx.last_decision = Some(decision);
        self.state = OodaState::Evaluating;
    }

    /// Evaluating: reset per-turn state, then execute or go idle.
    fn evaluate(&mut self, effects: &mut Vec<Effect>) {
        self.ctx.retry_count = 0;
        self.ctx.current_event = None;
        if self.ctx.pending.is_empty() {
            self.to_idle(effects);
        } else {
            self.state = OodaState::Executing;
            effects.push(Effect::Execute(self.ctx.pending.values().cloned().collect()));
        }
    }

    /// Leave Executing once nothing is pending or in flight.
    fn maybe_finish_executing(&mut self, effects: &mut Vec<Effect>) {
        if self.state == OodaState::Executing
            && self.ctx.pending.is_empty()
            && self.ctx.in_flight.is_empty()
        {
            self.to_idle(effects);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use botmind_types::{ActionBody, PerceptionSignal};
    use crate::reasoner::ProposedAction;

    fn signal_event() -> BotEvent {
        BotEvent::Signal(PerceptionSignal::new("teabag", Some("e1".into()), 0.8))
    }

    fn chat_event(message: &str) -> BotEvent {
        BotEvent::Chat {
            speaker: "steve".into(),
            message: message.into(),
            at: chrono::Utc::now(),
        }
    }

    fn prompt() -> Prompt {
        Prompt {
            system: "system".into(),
            user: "user".into(),
        }
    }

    fn decision_with_actions(n: usize) -> Decision {
        Decision {
            thought: "do things".into(),
            goal: Some("goal".into()),
            task: None,
            strategy: None,
            actions: (0..n)
                .map(|i| ProposedAction {
                    body: ActionBody::Chat {
                        message: format!("say {i}"),
                    },
                    require_feedback: true,
                })
                .collect(),
        }
    }

    fn machine() -> OodaMachine {
        OodaMachine::new(Blackboard::new("botmind"), 3)
    }

    fn transient() -> DecisionError {
        DecisionError::Http {
            status: 503,
            message: "unavailable".into(),
        }
    }

    fn fatal() -> DecisionError {
        DecisionError::Http {
            status: 401,
            message: "unauthorized".into(),
        }
    }

    #[test]
    fn enqueue_in_idle_starts_thinking() {
        let mut m = machine();
        let effects = m.handle(MachineEvent::Enqueue(signal_event()));
        assert_eq!(m.state(), OodaState::Thinking);
        assert!(matches!(effects.as_slice(), [Effect::BuildContext(_)]));
        assert!(m.ctx().current_event.is_some());
    }

    #[test]
    fn enqueue_while_busy_only_queues() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        let effects = m.handle(MachineEvent::Enqueue(chat_event("hi")));
        assert!(effects.is_empty());
        assert_eq!(m.ctx().event_queue.len(), 1);
    }

    #[test]
    fn context_built_moves_to_deciding_with_same_prompt() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        let effects = m.handle(MachineEvent::ContextBuilt(prompt()));
        assert_eq!(m.state(), OodaState::Deciding);
        assert_eq!(effects, vec![Effect::Decide(prompt())]);
        assert_eq!(m.ctx().last_prompt, Some(prompt()));
    }

    #[test]
    fn context_failure_discards_event_and_picks_up_next() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::Enqueue(chat_event("hello")));

        let effects = m.handle(MachineEvent::ContextFailed("boom".into()));
        // Straight back into Thinking on the queued chat event.
        assert_eq!(m.state(), OodaState::Thinking);
        assert!(matches!(
            effects.as_slice(),
            [Effect::BuildContext(BotEvent::Chat { .. })]
        ));
    }

    #[test]
    fn decision_assigns_monotonic_ids_and_executes() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        let effects = m.handle(MachineEvent::DecisionReady(decision_with_actions(2)));

        assert_eq!(m.state(), OodaState::Executing);
        assert_eq!(m.blackboard().ultimate_goal.as_deref(), Some("goal"));
        match effects.as_slice() {
            [Effect::Execute(actions)] => {
                assert_eq!(actions.len(), 2);
                assert_eq!(actions[0].id, 1);
                assert_eq!(actions[1].id, 2);
            }
            other => panic!("unexpected effects: {other:?}"),
        }
        assert_eq!(m.ctx().pending.len(), 2);
        assert_eq!(m.ctx().retry_count, 0);
    }

    #[test]
    fn ids_stay_monotonic_across_turns() {
        let mut m = machine();
        for _ in 0..2 {
            m.handle(MachineEvent::Enqueue(signal_event()));
            m.handle(MachineEvent::ContextBuilt(prompt()));
            m.handle(MachineEvent::DecisionReady(decision_with_actions(1)));
            let id = *m.ctx().pending.keys().next().unwrap();
            m.handle(MachineEvent::ActionStarted(id));
            m.handle(MachineEvent::ActionResolved {
                id,
                outcome: ActionOutcome::Completed,
                detail: None,
            });
        }
        // Two turns, one action each: the second action got id 2.
        let recorded: Vec<u64> = m.blackboard().recent_actions().map(|r| r.action_id).collect();
        assert_eq!(recorded, vec![1, 2]);
    }

    #[test]
    fn decision_without_actions_returns_to_idle() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        let effects = m.handle(MachineEvent::DecisionReady(decision_with_actions(0)));
        assert_eq!(m.state(), OodaState::Idle);
        assert!(effects.is_empty());
    }

    #[test]
    fn transient_failure_retries_in_place_with_same_prompt() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));

        let effects = m.handle(MachineEvent::DecisionFailed(transient()));
        assert_eq!(m.state(), OodaState::Deciding);
        assert_eq!(effects, vec![Effect::Decide(prompt())]);
        assert_eq!(m.ctx().retry_count, 1);
    }

    #[test]
    fn retries_are_bounded_then_surface_failure() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));

        m.handle(MachineEvent::DecisionFailed(transient()));
        m.handle(MachineEvent::DecisionFailed(transient()));
        // Third attempt also fails: attempts exhausted.
        let effects = m.handle(MachineEvent::DecisionFailed(transient()));
        assert_eq!(m.state(), OodaState::Idle);
        assert!(matches!(effects.as_slice(), [Effect::NotifyFailure(_)]));
        assert_eq!(m.ctx().retry_count, 0);
        assert!(m.ctx().current_event.is_none());
    }

    #[test]
    fn fatal_failure_never_retries() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));

        let effects = m.handle(MachineEvent::DecisionFailed(fatal()));
        assert_eq!(m.state(), OodaState::Idle);
        assert!(matches!(effects.as_slice(), [Effect::NotifyFailure(_)]));
    }

    #[test]
    fn retry_count_resets_after_successful_decision() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        m.handle(MachineEvent::DecisionFailed(transient()));
        assert_eq!(m.ctx().retry_count, 1);

        m.handle(MachineEvent::DecisionReady(decision_with_actions(0)));
        assert_eq!(m.ctx().retry_count, 0);
    }

    #[test]
    fn action_lifecycle_started_completed_records_history() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        m.handle(MachineEvent::DecisionReady(decision_with_actions(1)));

        m.handle(MachineEvent::ActionStarted(1));
        assert!(m.ctx().pending.is_empty());
        assert!(m.ctx().in_flight.contains(&1));

        m.handle(MachineEvent::ActionResolved {
            id: 1,
            outcome: ActionOutcome::Completed,
            detail: None,
        });
        assert_eq!(m.state(), OodaState::Idle);
        let record = m.blackboard().recent_actions().next().unwrap();
        assert_eq!(record.outcome, ActionOutcome::Completed);
        assert!(record.summary.contains("say 0"));
    }

    #[test]
    fn failed_action_is_recorded_not_dropped() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        m.handle(MachineEvent::DecisionReady(decision_with_actions(1)));

        m.handle(MachineEvent::ActionResolved {
            id: 1,
            outcome: ActionOutcome::Failed,
            detail: Some("path blocked".into()),
        });
        let record = m.blackboard().recent_actions().next().unwrap();
        assert_eq!(record.outcome, ActionOutcome::Failed);
        assert_eq!(record.detail.as_deref(), Some("path blocked"));
    }

    #[test]
    fn drained_executing_resumes_thinking_when_queue_nonempty() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        m.handle(MachineEvent::DecisionReady(decision_with_actions(1)));
        m.handle(MachineEvent::Enqueue(chat_event("next please")));

        m.handle(MachineEvent::ActionStarted(1));
        let effects = m.handle(MachineEvent::ActionResolved {
            id: 1,
            outcome: ActionOutcome::Completed,
            detail: None,
        });
        assert_eq!(m.state(), OodaState::Thinking);
        assert!(matches!(
            effects.as_slice(),
            [Effect::BuildContext(BotEvent::Chat { .. })]
        ));
    }

    #[test]
    fn execution_expiry_writes_off_stragglers_as_failed() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        m.handle(MachineEvent::DecisionReady(decision_with_actions(2)));
        m.handle(MachineEvent::ActionStarted(1));

        m.handle(MachineEvent::ExecutionExpired);
        assert_eq!(m.state(), OodaState::Idle);
        let outcomes: Vec<ActionOutcome> =
            m.blackboard().recent_actions().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![ActionOutcome::Failed, ActionOutcome::Failed]);
    }

    #[test]
    fn expiry_spares_actions_that_never_promised_feedback() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        let decision = Decision {
            thought: "mixed".into(),
            goal: None,
            task: None,
            strategy: None,
            actions: vec![
                ProposedAction {
                    body: ActionBody::Chat {
                        message: "tracked".into(),
                    },
                    require_feedback: true,
                },
                ProposedAction {
                    body: ActionBody::Chat {
                        message: "fire and forget".into(),
                    },
                    require_feedback: false,
                },
            ],
        };
        m.handle(MachineEvent::DecisionReady(decision));
        m.handle(MachineEvent::ActionStarted(1));
        m.handle(MachineEvent::ActionStarted(2));

        m.handle(MachineEvent::ExecutionExpired);
        assert_eq!(m.state(), OodaState::Idle);
        let outcomes: Vec<ActionOutcome> =
            m.blackboard().recent_actions().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![ActionOutcome::Failed]);

        // The fire-and-forget action can still resolve for real afterwards.
        m.handle(MachineEvent::ActionResolved {
            id: 2,
            outcome: ActionOutcome::Completed,
            detail: None,
        });
        let records: Vec<_> = m.blackboard().recent_actions().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action_id, 2);
        assert_eq!(records[0].outcome, ActionOutcome::Completed);
        assert!(records[0].summary.contains("fire and forget"));
    }

    #[test]
    fn diagnostics_reflect_machine_state() {
        let mut m = machine();
        m.handle(MachineEvent::Enqueue(signal_event()));
        m.handle(MachineEvent::Enqueue(chat_event("hi")));
        m.handle(MachineEvent::ContextBuilt(prompt()));
        m.handle(MachineEvent::DecisionReady(decision_with_actions(2)));

        let diag = m.diagnostics();
        assert_eq!(diag.state, OodaState::Executing);
        assert_eq!(diag.queue_len, 1);
        assert_eq!(diag.pending, 2);
        assert_eq!(diag.in_flight, 0);
    }

    #[test]
    fn stale_machine_events_are_ignored() {
        let mut m = machine();
        assert!(m.handle(MachineEvent::ContextBuilt(prompt())).is_empty());
        assert!(m.handle(MachineEvent::DecisionReady(decision_with_actions(1))).is_empty());
        assert_eq!(m.state(), OodaState::Idle);
        assert!(m.ctx().pending.is_empty());
    }
}
