//! NDJSON telemetry sink.
//!
//! Events are serialized to one JSON line each and handed to a writer task
//! over a bounded channel. With `drop_when_full` the sender never blocks a
//! generation on a slow disk; dropped lines are counted.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::config::TelemetryOutConfig;

use super::{TelemetryEvent, TelemetrySink};

#[derive(Clone)]
pub struct JsonlTelemetrySink {
    tx: mpsc::Sender<String>,
    dropped: std::sync::Arc<std::sync::atomic::AtomicU64>,
    drop_when_full: bool,
}

impl JsonlTelemetrySink {
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(std::sync::atomic::Ordering::Relaxed)
    }

    async fn send_line(&self, line: String) {
        if self.drop_when_full {
            if self.tx.try_send(line).is_err() {
                self.dropped
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        } else if self.tx.send(line).await.is_err() {
            // writer closed
        }
    }
}

#[async_trait]
impl TelemetrySink for JsonlTelemetrySink {
    async fn log_event(&self, event: TelemetryEvent) -> anyhow::Result<()> {
        let line = serde_json::to_string(&event)?;
        self.send_line(line).await;
        Ok(())
    }
}

/// Spawn the writer task and return a sink, or `None` when disabled.
pub async fn start_jsonl_sink(
    cfg: &TelemetryOutConfig,
) -> anyhow::Result<Option<JsonlTelemetrySink>> {
    if !cfg.enabled || cfg.path.trim().is_empty() {
        return Ok(None);
    }

    let (tx, mut rx) = mpsc::channel::<String>(cfg.channel_capacity);
    let dropped = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
    let path = cfg.path.clone();
    let drop_when_full = cfg.drop_when_full;

    tokio::spawn(async move {
        let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin + Send> = if path == "stdout:" {
            Box::new(tokio::io::stdout())
        } else {
            let file = match tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(err) => {
                    tracing::warn!(
                        target: "genflow.telemetry",
                        path = %path,
                        error = %err,
                        "cannot open telemetry file, sink disabled"
                    );
                    return;
                }
            };
            Box::new(file)
        };

        while let Some(mut line) = rx.recv().await {
            if !line.ends_with('\n') {
                line.push('\n');
            }
            if writer.write_all(line.as_bytes()).await.is_err() {
                return;
            }
            // Lines are small; flush per event so a crash loses at most one.
            if writer.flush().await.is_err() {
                return;
            }
        }

        let _ = writer.flush().await;
    });

    Ok(Some(JsonlTelemetrySink {
        tx,
        dropped,
        drop_when_full,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::MediaType;
    use crate::telemetry::TelemetryEventType;

    #[tokio::test]
    async fn disabled_config_yields_no_sink() {
        let cfg = TelemetryOutConfig {
            enabled: false,
            ..TelemetryOutConfig::default()
        };
        assert!(start_jsonl_sink(&cfg).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let cfg = TelemetryOutConfig {
            enabled: true,
            path: path.to_string_lossy().to_string(),
            channel_capacity: 16,
            drop_when_full: false,
        };

        let sink = start_jsonl_sink(&cfg).await.unwrap().unwrap();
        sink.log_event(TelemetryEvent::started(MediaType::Image, "t1", "ideogram-v2"))
            .await
            .unwrap();
        sink.log_event(TelemetryEvent::completed(
            MediaType::Image,
            "t1",
            "ideogram-v2",
            800,
        ))
        .await
        .unwrap();

        // Give the writer task a beat to drain the channel.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: TelemetryEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.event_type, TelemetryEventType::GenerationStarted);
        assert_eq!(first.task_id, "t1");
        let second: TelemetryEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.duration_ms, Some(800));
    }
}
