//! `botmind-bus` – the agent's nervous system.
//!
//! Routes events between the perception pipeline, the reflex controller, the
//! conscious controller, and the executors without caring about the data's
//! meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, topic-based publish/subscribe event bus built on a
//!   Tokio broadcast channel, with exact-topic and prefix-wildcard
//!   subscription (`"signal:*"`).

pub mod bus;

pub use bus::{EventBus, TopicPattern, TopicSubscriber};
