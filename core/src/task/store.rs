//! In-memory task state.
//!
//! The store owns the task map exclusively; the current-task pointer is an
//! id into that map, never a second copy. Every mutation carries a stamp
//! from [`TaskStore::stamp`], and a mutation older than the last applied
//! one for that task is dropped, so a slow update resolving late can never
//! overwrite a newer terminal state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use crate::error::{GenError, Result};

use super::types::{GenerationTask, TaskEvent, TaskPatch};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<TaskStoreInner>,
}

struct TaskStoreInner {
    tasks: RwLock<HashMap<String, GenerationTask>>,
    current: RwLock<Option<String>>,
    seq: AtomicU64,
    event_tx: broadcast::Sender<TaskEvent>,
}

impl TaskStore {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(TaskStoreInner {
                tasks: RwLock::new(HashMap::new()),
                current: RwLock::new(None),
                seq: AtomicU64::new(1),
                event_tx,
            }),
        }
    }

    /// Subscribe to store change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Issue a mutation stamp. Obtain the stamp when the mutation is
    /// initiated, not when it resolves, so late resolutions lose.
    pub fn stamp(&self) -> u64 {
        self.inner.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Insert a task and make it current. Re-registering an existing id
    /// replaces the prior entry.
    pub async fn register_task(&self, mut task: GenerationTask) {
        task.seq = self.stamp();
        let task_id = task.id.clone();

        {
            let mut tasks = self.inner.tasks.write().await;
            if tasks.insert(task_id.clone(), task).is_some() {
                tracing::debug!(target: "genflow.store", task_id = %task_id, "task re-registered, replacing prior entry");
            }
        }
        {
            let mut current = self.inner.current.write().await;
            *current = Some(task_id.clone());
        }

        self.emit(TaskEvent::Registered {
            task_id,
            timestamp: Utc::now(),
        });
    }

    /// Merge a patch into an existing task.
    ///
    /// Returns `Ok(true)` when applied, `Ok(false)` when the stamp is older
    /// than the last applied mutation (the patch is dropped), and
    /// [`GenError::UnknownTask`] when the id is absent.
    pub async fn update_task(&self, task_id: &str, stamp: u64, patch: TaskPatch) -> Result<bool> {
        let (status, progress) = {
            let mut tasks = self.inner.tasks.write().await;
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| GenError::UnknownTask(task_id.to_string()))?;

            if stamp < task.seq {
                tracing::debug!(
                    target: "genflow.store",
                    task_id = %task_id,
                    stamp,
                    applied = task.seq,
                    "dropping stale task update"
                );
                return Ok(false);
            }

            // Terminal states are final; only re-registration resets a task.
            if task.status.is_terminal() {
                tracing::debug!(
                    target: "genflow.store",
                    task_id = %task_id,
                    status = ?task.status,
                    "dropping update to terminal task"
                );
                return Ok(false);
            }

            task.seq = stamp;
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(progress) = patch.progress {
                task.progress = progress.min(100);
            }
            if let Some(media_url) = patch.media_url {
                task.media_url = Some(media_url);
            }
            if let Some(error) = patch.error {
                task.error = Some(error);
            }
            (task.status, task.progress)
        };

        self.emit(TaskEvent::Updated {
            task_id: task_id.to_string(),
            status,
            progress,
            timestamp: Utc::now(),
        });
        Ok(true)
    }

    /// Convenience wrapper: stamp and apply in one call, for mutations that
    /// are initiated and resolved at the same point.
    pub async fn apply(&self, task_id: &str, patch: TaskPatch) -> Result<bool> {
        let stamp = self.stamp();
        self.update_task(task_id, stamp, patch).await
    }

    pub async fn get(&self, task_id: &str) -> Option<GenerationTask> {
        self.inner.tasks.read().await.get(task_id).cloned()
    }

    /// The task the current pointer refers to, if any.
    pub async fn current_task(&self) -> Option<GenerationTask> {
        let current = self.inner.current.read().await.clone()?;
        self.inner.tasks.read().await.get(&current).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.tasks.read().await.is_empty()
    }

    /// Empty the map and clear the current pointer.
    pub async fn clear_tasks(&self) {
        {
            let mut tasks = self.inner.tasks.write().await;
            tasks.clear();
        }
        {
            let mut current = self.inner.current.write().await;
            *current = None;
        }
        self.emit(TaskEvent::Cleared {
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: TaskEvent) {
        // No subscribers is fine; rendering is optional.
        let _ = self.inner.event_tx.send(event);
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
