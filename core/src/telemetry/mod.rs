//! Lifecycle telemetry.
//!
//! Telemetry is observability, not control flow: sinks are best-effort and
//! a sink failure never surfaces to the user or alters task state. Emit
//! through [`emit`], which logs and swallows sink errors.

pub mod writer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::MediaType;

pub use writer::{start_jsonl_sink, JsonlTelemetrySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEventType {
    GenerationStarted,
    GenerationCompleted,
    GenerationFailed,
    GenerationCanceled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event_type: TelemetryEventType,
    pub media_type: MediaType,
    pub task_id: String,
    pub model_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub ts: DateTime<Utc>,
}

impl TelemetryEvent {
    fn base(
        event_type: TelemetryEventType,
        media_type: MediaType,
        task_id: &str,
        model_id: &str,
    ) -> Self {
        Self {
            event_type,
            media_type,
            task_id: task_id.to_string(),
            model_id: model_id.to_string(),
            duration_ms: None,
            details: None,
            ts: Utc::now(),
        }
    }

    pub fn started(media_type: MediaType, task_id: &str, model_id: &str) -> Self {
        Self::base(
            TelemetryEventType::GenerationStarted,
            media_type,
            task_id,
            model_id,
        )
    }

    pub fn completed(
        media_type: MediaType,
        task_id: &str,
        model_id: &str,
        duration_ms: u64,
    ) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            ..Self::base(
                TelemetryEventType::GenerationCompleted,
                media_type,
                task_id,
                model_id,
            )
        }
    }

    pub fn failed(
        media_type: MediaType,
        task_id: &str,
        model_id: &str,
        duration_ms: u64,
        error: &str,
    ) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            details: Some(serde_json::json!({ "error": error })),
            ..Self::base(
                TelemetryEventType::GenerationFailed,
                media_type,
                task_id,
                model_id,
            )
        }
    }

    pub fn canceled(media_type: MediaType, task_id: &str, model_id: &str, reason: &str) -> Self {
        Self {
            details: Some(serde_json::json!({ "reason": reason })),
            ..Self::base(
                TelemetryEventType::GenerationCanceled,
                media_type,
                task_id,
                model_id,
            )
        }
    }
}

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn log_event(&self, event: TelemetryEvent) -> anyhow::Result<()>;
}

/// Fire-and-forget emission: sink errors are logged, never propagated.
pub async fn emit(sink: &dyn TelemetrySink, event: TelemetryEvent) {
    let task_id = event.task_id.clone();
    if let Err(err) = sink.log_event(event).await {
        tracing::warn!(
            target: "genflow.telemetry",
            task_id = %task_id,
            error = %err,
            "telemetry sink failed, event dropped"
        );
    }
}

/// Sink that records events as structured tracing output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl TelemetrySink for TracingSink {
    async fn log_event(&self, event: TelemetryEvent) -> anyhow::Result<()> {
        tracing::info!(
            target: "genflow.telemetry",
            event_type = ?event.event_type,
            media_type = %event.media_type,
            task_id = %event.task_id,
            model_id = %event.model_id,
            duration_ms = event.duration_ms,
            "generation lifecycle event"
        );
        Ok(())
    }
}

/// Sink that buffers events in memory. Used by tests and by embedders that
/// poll recent events instead of streaming them.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: std::sync::Arc<std::sync::Mutex<Vec<TelemetryEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().expect("memory sink lock poisoned").clone()
    }

    pub fn count_of(&self, event_type: TelemetryEventType) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn log_event(&self, event: TelemetryEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .expect("memory sink lock poisoned")
            .push(event);
        Ok(())
    }
}
