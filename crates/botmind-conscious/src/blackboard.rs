//! [`Blackboard`] – the conscious controller's working memory.
//!
//! A single mutable struct holding goal/task/strategy, the formatted context
//! view, and three bounded history rings.  All mutation goes through methods
//! that replace whole fields; nothing outside this module pushes into the
//! rings directly, so the capacity bounds hold by construction.

use std::collections::VecDeque;

use botmind_types::{ActionInstruction, ActionOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Ring capacities.
const CHAT_HISTORY_CAP: usize = 8;
const ACTION_HISTORY_CAP: usize = 12;
const PENDING_LOG_CAP: usize = 12;

/// One remembered chat line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEntry {
    pub speaker: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// One remembered action with its final outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub action_id: u64,
    pub summary: String,
    pub outcome: ActionOutcome,
    pub detail: Option<String>,
}

/// Prompt-facing summaries of the agent's own state and surroundings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextView {
    pub self_summary: String,
    pub environment_summary: String,
}

/// The conscious working memory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Blackboard {
    pub ultimate_goal: Option<String>,
    pub current_task: Option<String>,
    pub strategy: Option<String>,
    pub context_view: ContextView,
    chat_history: VecDeque<ChatEntry>,
    recent_action_history: VecDeque<ActionRecord>,
    pending_action_log: VecDeque<String>,
    pub self_username: String,
}

impl Blackboard {
    pub fn new(self_username: impl Into<String>) -> Self {
        Self {
            self_username: self_username.into(),
            ..Self::default()
        }
    }

    // ── Goal / task / strategy ───────────────────────────────────────────────

    /// Merge a decision's deltas: only fields the decision set are replaced.
    pub fn merge_direction(
        &mut self,
        goal: Option<String>,
        task: Option<String>,
        strategy: Option<String>,
    ) {
        if goal.is_some() {
            self.ultimate_goal = goal;
        }
        if task.is_some() {
            self.current_task = task;
        }
        if strategy.is_some() {
            self.strategy = strategy;
        }
    }

    pub fn set_context_view(&mut self, view: ContextView) {
        self.context_view = view;
    }

    // ── Rings ────────────────────────────────────────────────────────────────

    pub fn record_chat(&mut self, speaker: impl Into<String>, message: impl Into<String>, at: DateTime<Utc>) {
        push_bounded(
            &mut self.chat_history,
            ChatEntry {
                speaker: speaker.into(),
                message: message.into(),
                at,
            },
            CHAT_HISTORY_CAP,
        );
    }

    pub fn record_action(&mut self, record: ActionRecord) {
        push_bounded(&mut self.recent_action_history, record, ACTION_HISTORY_CAP);
    }

    /// Log an action that has been issued but not yet resolved.
    pub fn log_pending(&mut self, instruction: &ActionInstruction) {
        push_bounded(
            &mut self.pending_action_log,
            format!("#{} {}", instruction.id, summarize_action(instruction)),
            PENDING_LOG_CAP,
        );
    }

    pub fn chat_history(&self) -> impl Iterator<Item = &ChatEntry> {
        self.chat_history.iter()
    }

    pub fn recent_actions(&self) -> impl Iterator<Item = &ActionRecord> {
        self.recent_action_history.iter()
    }

    pub fn pending_log(&self) -> impl Iterator<Item = &str> {
        self.pending_action_log.iter().map(String::as_str)
    }

    pub fn chat_len(&self) -> usize {
        self.chat_history.len()
    }
}

/// One-line human-readable summary of an action body, for prompts and logs.
pub fn summarize_action(instruction: &ActionInstruction) -> String {
    use botmind_types::ActionBody;
    match &instruction.body {
        ActionBody::Chat { message } => format!("chat: {message}"),
        ActionBody::Tool { mode, steps } => {
            let tools: Vec<&str> = steps.iter().map(|s| s.tool.as_str()).collect();
            format!("tool[{mode:?}]: {}", tools.join(", "))
        }
    }
}

fn push_bounded<T>(ring: &mut VecDeque<T>, item: T, cap: usize) {
    if ring.len() == cap {
        ring.pop_front();
    }
    ring.push_back(item);
}
