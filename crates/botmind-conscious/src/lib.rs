//! `botmind-conscious` – the slow lane.
//!
//! Deliberative control: stimuli from the bus are queued, turned into
//! prompts, decided on by an external reasoning service, and executed as
//! discrete actions with feedback tracking.  One stimulus is processed at a
//! time; its actions are fully drained before the next decision cycle.
//!
//! # Modules
//!
//! - [`blackboard`] – [`Blackboard`][blackboard::Blackboard]: goal, task,
//!   strategy, and bounded history rings.
//! - [`machine`] – [`OodaMachine`][machine::OodaMachine]: the pure
//!   Idle/Thinking/Deciding/Evaluating/Executing transition function.
//! - [`reasoner`] – the [`Reasoner`][reasoner::Reasoner] seam and the
//!   OpenAI-compatible [`ReasonerClient`][reasoner::ReasonerClient].
//! - [`timers`] – [`OneShot`][timers::OneShot] cancellable timer.
//! - [`feedback`] – [`Debouncer`][feedback::Debouncer] and
//!   [`Barrier`][feedback::Barrier] over action feedback.
//! - [`context_view`] – reflex-context formatting for prompts.
//! - [`controller`] – [`ConsciousController`][controller::ConsciousController]:
//!   effect interpreter and bus plumbing.
//! - [`config`] – [`BotConfig`][config::BotConfig] TOML configuration.
//! - [`telemetry`] – tracing-subscriber setup.

pub mod blackboard;
pub mod config;
pub mod context_view;
pub mod controller;
pub mod feedback;
pub mod machine;
pub mod reasoner;
pub mod telemetry;
pub mod timers;

pub use blackboard::{ActionRecord, Blackboard, ChatEntry, ContextView};
pub use config::BotConfig;
pub use controller::{ConsciousController, ContextSource};
pub use machine::{ConsciousDiagnostics, Effect, MachineCtx, MachineEvent, OodaMachine, OodaState};
pub use reasoner::{Decision, DecisionError, Prompt, ProposedAction, Reasoner, ReasonerClient};
pub use telemetry::init_tracing;
pub use timers::OneShot;
