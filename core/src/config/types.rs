use serde::{Deserialize, Serialize};

use crate::progress::ProgressCurve;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub breaker: BreakerConfig,

    #[serde(default)]
    pub progress: ProgressCurve,

    #[serde(default)]
    pub telemetry: TelemetryOutConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "genflow_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

/// Circuit breaker tuning, one shared setting for every upstream service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before the breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown before an open breaker allows a half-open trial call.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

/// NDJSON telemetry output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryOutConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    /// File path for telemetry lines, or "stdout:" for standard output.
    #[serde(default = "default_telemetry_path")]
    pub path: String,

    #[serde(default = "default_telemetry_capacity")]
    pub channel_capacity: usize,

    /// Drop events instead of awaiting when the channel is full.
    #[serde(default = "default_telemetry_drop_when_full")]
    pub drop_when_full: bool,
}

fn default_telemetry_enabled() -> bool {
    false
}

fn default_telemetry_path() -> String {
    "./generation.events.jsonl".to_string()
}

fn default_telemetry_capacity() -> usize {
    1024
}

fn default_telemetry_drop_when_full() -> bool {
    true
}

impl Default for TelemetryOutConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            path: default_telemetry_path(),
            channel_capacity: default_telemetry_capacity(),
            drop_when_full: default_telemetry_drop_when_full(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the generation gateway, e.g. an edge-function host.
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_provider_timeout_secs() -> u64 {
    300
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}
