//! Terminal progress rendering.
//!
//! Subscribes to the task store's event stream and drives a single
//! `indicatif` bar. Rendering is optional and purely cosmetic; the store
//! stays authoritative.

use genflow_core::{TaskEvent, TaskStatus, TaskStore};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;

pub struct GenerationBar {
    bar: ProgressBar,
    enabled: bool,
}

impl GenerationBar {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                bar: ProgressBar::hidden(),
                enabled: false,
            };
        }

        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}% {msg}")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );
        bar.set_message("starting...");

        Self { bar, enabled: true }
    }

    pub fn update(&self, status: TaskStatus, progress: u8) {
        if !self.enabled {
            return;
        }
        self.bar.set_position(progress as u64);
        self.bar.set_message(match status {
            TaskStatus::Pending => "waiting for the provider",
            TaskStatus::Processing => "generating",
            TaskStatus::Completed => "done",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
        });
    }

    pub fn finish(&self, status: TaskStatus) {
        if !self.enabled {
            return;
        }
        let msg = match status {
            TaskStatus::Completed => "✅ generation completed",
            TaskStatus::Failed => "❌ generation failed",
            TaskStatus::Canceled => "⛔ generation canceled",
            _ => return,
        };
        self.bar.finish_with_message(msg);
    }

    pub fn clear(&self) {
        if self.enabled {
            self.bar.finish_and_clear();
        }
    }
}

/// Render store events until the tracked task reaches a terminal state.
pub fn spawn_renderer(store: &TaskStore, enabled: bool) -> JoinHandle<()> {
    let mut rx = store.subscribe();
    let bar = GenerationBar::new(enabled);

    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                TaskEvent::Registered { .. } => bar.update(TaskStatus::Pending, 0),
                TaskEvent::Updated {
                    status, progress, ..
                } => {
                    bar.update(status, progress);
                    if status.is_terminal() {
                        bar.finish(status);
                        break;
                    }
                }
                TaskEvent::Cleared { .. } => {
                    bar.clear();
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_bar_is_inert() {
        let bar = GenerationBar::new(false);
        bar.update(TaskStatus::Processing, 60);
        bar.finish(TaskStatus::Completed);
        bar.clear();
    }

    #[test]
    fn enabled_bar_accepts_all_statuses() {
        let bar = GenerationBar::new(true);
        bar.update(TaskStatus::Pending, 5);
        bar.update(TaskStatus::Processing, 60);
        bar.update(TaskStatus::Completed, 100);
        bar.finish(TaskStatus::Completed);
    }

    #[tokio::test]
    async fn renderer_stops_on_terminal_update() {
        use genflow_core::{GenerationTask, MediaParams, MediaType, TaskPatch};

        let store = TaskStore::new();
        let handle = spawn_renderer(&store, false);

        store
            .register_task(GenerationTask::new(
                "t1",
                "a red cube",
                "ideogram-v2",
                MediaParams::defaults_for(MediaType::Image),
            ))
            .await;
        store
            .apply("t1", TaskPatch::completed("https://x/img.png"))
            .await
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("renderer should exit after the terminal update")
            .unwrap();
    }
}
