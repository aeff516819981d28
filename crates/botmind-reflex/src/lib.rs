//! `botmind-reflex` – the fast lane.
//!
//! Sub-second reactive behavior, independent of the deliberative loop's pace.
//! A coarse mode state machine gates a set of cheap scored behaviors; the
//! highest-scoring eligible behavior runs once per tick and dispatches a
//! small [`ReflexIntent`][botmind_types::ReflexIntent] to the executor seam.
//!
//! # Modules
//!
//! - [`context`] – [`ReflexContext`][context::ReflexContext]: the ephemeral
//!   world snapshot behaviors score against, replaced copy-on-write.
//! - [`mode`] – [`ModeMachine`][mode::ModeMachine]: the
//!   idle/social/alert/work/wander regime with its guard transitions and
//!   follow-target locking.
//! - [`behavior`] – the [`ReflexBehavior`][behavior::ReflexBehavior] trait
//!   and the cooldown-aware, deterministic [`BehaviorSelector`][behavior::BehaviorSelector].
//! - [`behaviors`] – the reference behaviors: greeting, signal orientation,
//!   and the gesture response.
//! - [`executor`] – the [`ReflexExecutor`][executor::ReflexExecutor]
//!   actuation seam plus a recording double for tests.
//! - [`controller`] – [`ReflexController`][controller::ReflexController]:
//!   ties context, machine, and selector together and drives them from bus
//!   events and a fixed-period tick.

pub mod behavior;
pub mod behaviors;
pub mod context;
pub mod controller;
pub mod executor;
pub mod mode;

pub use behavior::{BehaviorOutcome, BehaviorSelector, ReflexBehavior};
pub use behaviors::{GestureBackBehavior, GreetBehavior, LookAtSignalBehavior};
pub use context::ReflexContext;
pub use controller::ReflexController;
pub use executor::{ExecutorCall, RecordingExecutor, ReflexExecutor};
pub use mode::{ModeChange, ModeMachine, ReflexMode};
