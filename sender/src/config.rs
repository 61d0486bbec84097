//! Sender configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SenderError;

/// Top-level sender configuration.
///
/// Can be loaded from a TOML file via [`SenderConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SenderConfig {
    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to expose Prometheus metrics over HTTP.
    #[serde(default)]
    pub metrics_enabled: bool,

    /// Port of the metrics endpoint (if enabled).
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Whether to publish sender updates as JSON lines.
    #[serde(default)]
    pub publish_updates: bool,

    /// Named confirmation sequences.
    #[serde(default)]
    pub sequences: BTreeMap<String, SequenceParams>,
}

/// Parameters of one confirmation sequence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequenceParams {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// General node endpoint: consistency checks and inclusion polling.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Endpoint for promotion attaches; falls back to `endpoint`.
    #[serde(default)]
    pub promote_endpoint: Option<String>,

    /// Endpoint for reattachments; falls back to `endpoint`.
    #[serde(default)]
    pub reattach_endpoint: Option<String>,

    /// Address carried by promotion bundles (81 trytes).
    #[serde(default = "default_promote_address")]
    pub promote_address: String,

    /// Tag carried by promotion bundles (up to 27 trytes).
    #[serde(default = "default_promote_tag")]
    pub promote_tag: String,

    #[serde(default = "default_promote_every_sec")]
    pub promote_every_sec: u64,

    #[serde(default = "default_force_reattach_after_min")]
    pub force_reattach_after_min: u64,

    #[serde(default)]
    pub promote_disable: bool,

    /// Reserved: promotion chaining.
    #[serde(default)]
    pub promote_chain: bool,

    #[serde(default = "default_consistency_check_sec")]
    pub consistency_check_sec: u64,

    #[serde(default = "default_confirm_poll_sec")]
    pub confirm_poll_sec: u64,

    #[serde(default = "default_penalty_sleep_sec")]
    pub penalty_sleep_sec: u64,

    /// Active-loop count that slows the consistency check down; zero
    /// selects the confirmer default.
    #[serde(default)]
    pub slowdown_threshold: usize,

    /// Consecutive failures per endpoint before the error counter trips;
    /// zero disables the counter.
    #[serde(default)]
    pub error_threshold: u32,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    8090
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "null://localhost".to_string()
}

fn default_promote_address() -> String {
    "9".repeat(81)
}

fn default_promote_tag() -> String {
    "PULSE".to_string()
}

fn default_promote_every_sec() -> u64 {
    10
}

fn default_force_reattach_after_min() -> u64 {
    15
}

fn default_consistency_check_sec() -> u64 {
    5
}

fn default_confirm_poll_sec() -> u64 {
    10
}

fn default_penalty_sleep_sec() -> u64 {
    5
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SenderConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, SenderError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SenderError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SenderError> {
        toml::from_str(s).map_err(|e| SenderError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("SenderConfig is always serializable to TOML")
    }

    /// Names and parameters of the enabled sequences, in name order.
    pub fn enabled_sequences(&self) -> Vec<(&str, &SequenceParams)> {
        self.sequences
            .iter()
            .filter(|(_, params)| params.enabled)
            .map(|(name, params)| (name.as_str(), params))
            .collect()
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            metrics_enabled: false,
            metrics_port: default_metrics_port(),
            publish_updates: false,
            sequences: BTreeMap::new(),
        }
    }
}

impl SequenceParams {
    pub fn promote_endpoint(&self) -> &str {
        self.promote_endpoint.as_deref().unwrap_or(&self.endpoint)
    }

    pub fn reattach_endpoint(&self) -> &str {
        self.reattach_endpoint.as_deref().unwrap_or(&self.endpoint)
    }
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_endpoint(),
            promote_endpoint: None,
            reattach_endpoint: None,
            promote_address: default_promote_address(),
            promote_tag: default_promote_tag(),
            promote_every_sec: default_promote_every_sec(),
            force_reattach_after_min: default_force_reattach_after_min(),
            promote_disable: false,
            promote_chain: false,
            consistency_check_sec: default_consistency_check_sec(),
            confirm_poll_sec: default_confirm_poll_sec(),
            penalty_sleep_sec: default_penalty_sleep_sec(),
            slowdown_threshold: 0,
            error_threshold: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = SenderConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = SenderConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.metrics_port, config.metrics_port);
        assert_eq!(parsed.log_format, config.log_format);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = SenderConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.metrics_port, 8090);
        assert!(config.sequences.is_empty());
    }

    #[test]
    fn sequence_table_with_partial_overrides() {
        let toml = r#"
            [sequences.main]
            promote_every_sec = 20

            [sequences.backup]
            enabled = false
        "#;
        let config = SenderConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.sequences.len(), 2);

        let main = &config.sequences["main"];
        assert_eq!(main.promote_every_sec, 20);
        assert_eq!(main.force_reattach_after_min, 15); // default

        let enabled = config.enabled_sequences();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].0, "main");
    }

    #[test]
    fn promote_endpoint_falls_back_to_general() {
        let toml = r#"
            [sequences.main]
            endpoint = "null://general"
            reattach_endpoint = "null://pow"
        "#;
        let config = SenderConfig::from_toml_str(toml).expect("should parse");
        let main = &config.sequences["main"];
        assert_eq!(main.promote_endpoint(), "null://general");
        assert_eq!(main.reattach_endpoint(), "null://pow");
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = SenderConfig::from_toml_file("/nonexistent/pulse.toml");
        assert!(matches!(result, Err(SenderError::Config(_))));
    }

    #[test]
    fn config_file_loads_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("pulse.toml");
        std::fs::write(
            &path,
            "log_level = \"debug\"\nmetrics_enabled = true\n",
        )
        .expect("write config");

        let config =
            SenderConfig::from_toml_file(path.to_str().expect("utf-8 path")).expect("load");
        assert_eq!(config.log_level, "debug");
        assert!(config.metrics_enabled);
    }
}
