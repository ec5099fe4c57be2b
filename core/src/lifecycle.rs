//! Per-task resource tracking.
//!
//! Every registered task owns a cancellation handle and, optionally, a
//! progress poller. The lifecycle records start/complete/fail/cancel
//! telemetry with elapsed durations and guarantees teardown releases every
//! handle, so no timers or pending awaits outlive their owner.
//!
//! Cancellation is cooperative: firing a handle tells the caller to stop
//! waiting, it does not stop the upstream provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::task::MediaType;
use crate::telemetry::{emit, TelemetryEvent, TelemetrySink};

/// Reason attached to cancel events emitted by [`TaskLifecycle::shutdown`].
pub const SHUTDOWN_REASON: &str = "owner shutdown";

/// Receiver half of a cancellation handle.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the task is cancelled. If the owning lifecycle entry
    /// is released without a cancel (normal completion), this never
    /// resolves; callers race it against the real work.
    pub async fn cancelled(mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }
}

struct TaskHandles {
    cancel_tx: watch::Sender<bool>,
    poller: Option<JoinHandle<()>>,
    started_at: Instant,
    media_type: MediaType,
    model_id: String,
}

#[derive(Clone)]
pub struct TaskLifecycle {
    inner: Arc<LifecycleInner>,
}

struct LifecycleInner {
    handles: RwLock<HashMap<String, TaskHandles>>,
    sink: Arc<dyn TelemetrySink>,
}

impl TaskLifecycle {
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                handles: RwLock::new(HashMap::new()),
                sink,
            }),
        }
    }

    /// Allocate a cancellation handle for a task and record the start
    /// event. Re-registering an id releases the prior entry's poller.
    pub async fn register_task(
        &self,
        task_id: &str,
        media_type: MediaType,
        model_id: &str,
    ) -> CancelSignal {
        let (cancel_tx, rx) = watch::channel(false);
        let handles = TaskHandles {
            cancel_tx,
            poller: None,
            started_at: Instant::now(),
            media_type,
            model_id: model_id.to_string(),
        };

        {
            let mut map = self.inner.handles.write().await;
            if let Some(prior) = map.insert(task_id.to_string(), handles) {
                if let Some(poller) = prior.poller {
                    poller.abort();
                }
            }
        }

        emit(
            self.inner.sink.as_ref(),
            TelemetryEvent::started(media_type, task_id, model_id),
        )
        .await;

        CancelSignal { rx }
    }

    /// Attach a polling task to a registered id. If the task already
    /// finished the poller is aborted immediately.
    pub async fn attach_poller(&self, task_id: &str, poller: JoinHandle<()>) {
        let mut map = self.inner.handles.write().await;
        match map.get_mut(task_id) {
            Some(handles) => {
                if let Some(old) = handles.poller.replace(poller) {
                    old.abort();
                }
            }
            None => poller.abort(),
        }
    }

    /// Record completion, release the task's resources.
    pub async fn complete_task(&self, task_id: &str) {
        if let Some((handles, duration_ms)) = self.release(task_id).await {
            emit(
                self.inner.sink.as_ref(),
                TelemetryEvent::completed(
                    handles.media_type,
                    task_id,
                    &handles.model_id,
                    duration_ms,
                ),
            )
            .await;
        }
    }

    /// Record failure, release the task's resources.
    pub async fn fail_task(&self, task_id: &str, error: &str) {
        if let Some((handles, duration_ms)) = self.release(task_id).await {
            emit(
                self.inner.sink.as_ref(),
                TelemetryEvent::failed(
                    handles.media_type,
                    task_id,
                    &handles.model_id,
                    duration_ms,
                    error,
                ),
            )
            .await;
        }
    }

    /// Fire the cancel handle and release the task's resources.
    pub async fn cancel_task(&self, task_id: &str, reason: &str) {
        if let Some((handles, _)) = self.release(task_id).await {
            let _ = handles.cancel_tx.send(true);
            emit(
                self.inner.sink.as_ref(),
                TelemetryEvent::canceled(handles.media_type, task_id, &handles.model_id, reason),
            )
            .await;
        }
    }

    /// Teardown: best-effort cancel for every outstanding task.
    ///
    /// Fires each cancel handle, aborts each poller, and emits one cancel
    /// event per task. Errors are logged, never propagated.
    pub async fn shutdown(&self) {
        let drained: Vec<(String, TaskHandles)> = {
            let mut map = self.inner.handles.write().await;
            map.drain().collect()
        };

        for (task_id, handles) in drained {
            if handles.cancel_tx.send(true).is_err() {
                tracing::debug!(
                    target: "genflow.lifecycle",
                    task_id = %task_id,
                    "cancel receiver already gone"
                );
            }
            if let Some(poller) = handles.poller {
                poller.abort();
            }
            emit(
                self.inner.sink.as_ref(),
                TelemetryEvent::canceled(
                    handles.media_type,
                    &task_id,
                    &handles.model_id,
                    SHUTDOWN_REASON,
                ),
            )
            .await;
        }
    }

    pub async fn outstanding(&self) -> usize {
        self.inner.handles.read().await.len()
    }

    async fn release(&self, task_id: &str) -> Option<(TaskHandles, u64)> {
        let handles = {
            let mut map = self.inner.handles.write().await;
            map.remove(task_id)?
        };
        if let Some(poller) = &handles.poller {
            poller.abort();
        }
        let duration_ms = handles.started_at.elapsed().as_millis() as u64;
        Some((handles, duration_ms))
    }
}
