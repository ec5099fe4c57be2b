//! # genflow-core
//!
//! Asynchronous media-generation task lifecycle: an in-memory task store
//! with ordered mutations, per-service circuit breaking, display-progress
//! estimation, cancellation/teardown handling and lifecycle telemetry,
//! orchestrated around a pluggable provider adapter.

pub mod breaker;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod progress;
pub mod provider;
pub mod task;
pub mod telemetry;

pub use breaker::{BreakerRegistry, BreakerState, CircuitBreaker};
pub use config::{load_default, BreakerConfig, GenConfig, LoggingConfig};
pub use error::{GenError, Result};
pub use lifecycle::{CancelSignal, TaskLifecycle};
pub use orchestrator::{Callbacks, GenerateRequest, NoticeLevel, Orchestrator};
pub use progress::{estimate, ProgressCurve};
pub use provider::{service_for, ProviderAdapter, ProviderOutput, ProviderRequest};
pub use task::{GenerationTask, MediaParams, MediaType, TaskEvent, TaskPatch, TaskStatus, TaskStore};
pub use telemetry::{
    start_jsonl_sink, JsonlTelemetrySink, MemorySink, TelemetryEvent, TelemetryEventType,
    TelemetrySink, TracingSink,
};
