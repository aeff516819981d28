//! [`BotConfig`] – TOML configuration for a whole agent process.
//!
//! Every field carries a serde default, so a partial (or absent) config file
//! yields a fully usable configuration.  Timing values are plain integers in
//! milliseconds to keep the TOML readable.

use std::fs;
use std::path::Path;

use botmind_types::MindError;
use serde::{Deserialize, Serialize};

/// Reasoning-service connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Base URL of an OpenAI-compatible chat-completions server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Bearer token, if the endpoint requires one.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

impl std::fmt::Debug for ReasonerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasonerConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .finish()
    }
}

/// Saliency window geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaliencyWindowConfig {
    #[serde(default = "default_slot_ms")]
    pub slot_ms: u64,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_max_distance")]
    pub max_distance: f64,
}

/// Reflex loop pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflexTimingConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_interaction_range")]
    pub interaction_range: f64,
}

/// Conscious-loop timing and identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsciousConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_barrier_ms")]
    pub barrier_ms: u64,
    #[serde(default = "default_max_decision_attempts")]
    pub max_decision_attempts: u32,
    /// The agent's own in-game name, used to filter self-authored chat.
    #[serde(default)]
    pub self_username: String,
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub reasoner: ReasonerConfig,
    #[serde(default)]
    pub saliency: SaliencyWindowConfig,
    #[serde(default)]
    pub reflex: ReflexTimingConfig,
    #[serde(default)]
    pub conscious: ConsciousConfig,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_slot_ms() -> u64 {
    20
}
fn default_window_size() -> usize {
    25
}
fn default_max_distance() -> f64 {
    32.0
}
fn default_tick_ms() -> u64 {
    250
}
fn default_interaction_range() -> f64 {
    4.0
}
fn default_debounce_ms() -> u64 {
    200
}
fn default_barrier_ms() -> u64 {
    1000
}
fn default_max_decision_attempts() -> u32 {
    3
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: String::new(),
        }
    }
}

impl Default for SaliencyWindowConfig {
    fn default() -> Self {
        Self {
            slot_ms: default_slot_ms(),
            window_size: default_window_size(),
            max_distance: default_max_distance(),
        }
    }
}

impl Default for ReflexTimingConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            interaction_range: default_interaction_range(),
        }
    }
}

impl Default for ConsciousConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            barrier_ms: default_barrier_ms(),
            max_decision_attempts: default_max_decision_attempts(),
            self_username: String::new(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            reasoner: ReasonerConfig::default(),
            saliency: SaliencyWindowConfig::default(),
            reflex: ReflexTimingConfig::default(),
            conscious: ConsciousConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file, filling missing fields with
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`MindError::Config`] when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MindError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| MindError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| MindError::Config(format!("cannot parse {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = BotConfig::default();
        assert_eq!(config.saliency.slot_ms, 20);
        assert_eq!(config.saliency.window_size, 25);
        assert_eq!(config.reflex.tick_ms, 250);
        assert_eq!(config.conscious.debounce_ms, 200);
        assert_eq!(config.conscious.barrier_ms, 1000);
        assert_eq!(config.conscious.max_decision_attempts, 3);
    }

    #[test]
    fn partial_toml_fills_missing_fields_with_defaults() {
        let toml = r#"
            [reasoner]
            model = "qwen2.5"

            [conscious]
            self_username = "botmind"
        "#;
        let config: BotConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.reasoner.model, "qwen2.5");
        assert_eq!(config.reasoner.base_url, "http://localhost:11434");
        assert_eq!(config.conscious.self_username, "botmind");
        assert_eq!(config.conscious.barrier_ms, 1000);
        assert_eq!(config.saliency.max_distance, 32.0);
    }

    #[test]
    fn load_reads_a_file_and_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[reflex]\ntick_ms = 100").unwrap();
        let config = BotConfig::load(&path).unwrap();
        assert_eq!(config.reflex.tick_ms, 100);

        std::fs::write(&path, "not toml [[[").unwrap();
        assert!(matches!(BotConfig::load(&path), Err(MindError::Config(_))));
    }

    #[test]
    fn api_key_is_redacted_in_debug_output() {
        let config = ReasonerConfig {
            api_key: "sk-secret".into(),
            ..ReasonerConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
