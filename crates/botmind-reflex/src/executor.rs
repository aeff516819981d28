//! The actuation seam between reflex decisions and the game client.
//!
//! The controller only ever talks to the [`ReflexExecutor`] trait, so tests
//! and headless runs plug in [`RecordingExecutor`] while production wires a
//! real client adapter.

use std::sync::Mutex;

use async_trait::async_trait;
use botmind_types::{MindError, Vec3};

/// Low-level actuation primitives a reflex intent can need.
#[async_trait]
pub trait ReflexExecutor: Send + Sync {
    /// Send a chat message.
    async fn chat(&self, message: &str) -> Result<(), MindError>;

    /// Turn the agent's head toward `target`.
    async fn look_at(&self, target: Vec3) -> Result<(), MindError>;

    /// Press or release a movement control such as `"sneak"` or `"jump"`.
    async fn set_control(&self, control: &str, active: bool) -> Result<(), MindError>;

    /// Start following the given entity until released or interrupted.
    async fn follow(&self, entity_id: &str) -> Result<(), MindError>;

    /// Abort any in-progress movement or control sequence.
    async fn interrupt(&self) -> Result<(), MindError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording double
// ─────────────────────────────────────────────────────────────────────────────

/// One recorded executor invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorCall {
    Chat(String),
    LookAt(Vec3),
    SetControl { control: String, active: bool },
    Follow(String),
    Interrupt,
}

/// An executor that records every call instead of acting.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecutorCall>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all calls so far, in order.
    pub fn calls(&self) -> Vec<ExecutorCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, call: ExecutorCall) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }
}

#[async_trait]
impl ReflexExecutor for RecordingExecutor {
    async fn chat(&self, message: &str) -> Result<(), MindError> {
        self.record(ExecutorCall::Chat(message.to_string()));
        Ok(())
    }

    async fn look_at(&self, target: Vec3) -> Result<(), MindError> {
        self.record(ExecutorCall::LookAt(target));
        Ok(())
    }

    async fn set_control(&self, control: &str, active: bool) -> Result<(), MindError> {
        self.record(ExecutorCall::SetControl {
            control: control.to_string(),
            active,
        });
        Ok(())
    }

    async fn follow(&self, entity_id: &str) -> Result<(), MindError> {
        self.record(ExecutorCall::Follow(entity_id.to_string()));
        Ok(())
    }

    async fn interrupt(&self) -> Result<(), MindError> {
        self.record(ExecutorCall::Interrupt);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let exec = RecordingExecutor::new();
        exec.chat("hello").await.unwrap();
        exec.set_control("sneak", true).await.unwrap();
        exec.set_control("sneak", false).await.unwrap();
        exec.interrupt().await.unwrap();

        assert_eq!(
            exec.calls(),
            vec![
                ExecutorCall::Chat("hello".into()),
                ExecutorCall::SetControl {
                    control: "sneak".into(),
                    active: true
                },
                ExecutorCall::SetControl {
                    control: "sneak".into(),
                    active: false
                },
                ExecutorCall::Interrupt,
            ]
        );
    }
}
