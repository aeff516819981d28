//! `botmind-perception` – the saliency layer.
//!
//! Turns the high-frequency stream of noisy raw world events into the two
//! things the higher layers actually consume: durable entity beliefs and
//! discrete burst signals.
//!
//! # Modules
//!
//! - [`saliency`] – [`SaliencyEngine`][saliency::SaliencyEngine]: fixed set of
//!   per-key sliding-window counters that convert bursts of identical raw
//!   events into rate-limited [`PerceptionSignal`][botmind_types::PerceptionSignal]s.
//! - [`beliefs`] – [`BeliefStore`][beliefs::BeliefStore]: last-write-wins map
//!   of tracked entities, queried synchronously by the reflex layer through
//!   [`SharedBeliefs`][beliefs::SharedBeliefs].
//! - [`pipeline`] – [`PerceptionPipeline`][pipeline::PerceptionPipeline]:
//!   ordered, short-circuiting stages that enrich one raw event into belief
//!   updates, bus republications, and routed signals.

pub mod beliefs;
pub mod pipeline;
pub mod saliency;

pub use beliefs::{BeliefStore, SharedBeliefs};
pub use pipeline::{PerceptionFrame, PerceptionLoop, PerceptionPipeline, Stage};
pub use saliency::{CounterSnapshot, SaliencyConfig, SaliencyEngine, SaliencyRule, SaliencySnapshot};
