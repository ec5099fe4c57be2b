//! Media generation orchestration.
//!
//! One orchestrator instance drives at most one generation at a time. A
//! request flows pending -> processing -> {completed|failed|canceled}; every
//! transition is written to the task store, the provider call goes through
//! the service's circuit breaker, and no provider error escapes to the
//! caller as anything but task state and callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::breaker::BreakerRegistry;
use crate::config::GenConfig;
use crate::error::GenError;
use crate::lifecycle::TaskLifecycle;
use crate::progress::ProgressCurve;
use crate::provider::{service_for, ProviderAdapter, ProviderRequest};
use crate::task::{GenerationTask, MediaParams, TaskPatch, TaskStatus, TaskStore};
use crate::telemetry::{TelemetrySink, TracingSink};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(750);

/// Reason attached to the cancel event when [`Orchestrator::cancel_generation`]
/// is invoked.
pub const CANCEL_REASON: &str = "user request";

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: String,
    pub media: MediaParams,
    pub reference_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Optional caller hooks, invoked synchronously on the resolution path.
///
/// `on_error` receives the provider message verbatim; `on_notice` carries
/// user-facing wording.
#[derive(Default, Clone)]
pub struct Callbacks {
    pub on_progress: Option<Arc<dyn Fn(u8) + Send + Sync>>,
    pub on_complete: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub on_error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub on_notice: Option<Arc<dyn Fn(NoticeLevel, &str) + Send + Sync>>,
}

impl Callbacks {
    fn progress(&self, percent: u8) {
        if let Some(cb) = &self.on_progress {
            cb(percent);
        }
    }

    fn complete(&self, media_url: &str) {
        if let Some(cb) = &self.on_complete {
            cb(media_url);
        }
    }

    fn error(&self, message: &str) {
        if let Some(cb) = &self.on_error {
            cb(message);
        }
    }

    fn notice(&self, level: NoticeLevel, message: &str) {
        if let Some(cb) = &self.on_notice {
            cb(level, message);
        }
    }
}

pub struct Orchestrator {
    store: TaskStore,
    lifecycle: TaskLifecycle,
    breakers: BreakerRegistry,
    adapter: Arc<dyn ProviderAdapter>,
    curve: ProgressCurve,
    poll_interval: Duration,
    in_flight: AtomicBool,
}

pub struct OrchestratorBuilder {
    adapter: Arc<dyn ProviderAdapter>,
    sink: Arc<dyn TelemetrySink>,
    breakers: Option<BreakerRegistry>,
    store: Option<TaskStore>,
    curve: ProgressCurve,
    poll_interval: Duration,
}

impl OrchestratorBuilder {
    pub fn new(adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            adapter,
            sink: Arc::new(TracingSink),
            breakers: None,
            store: None,
            curve: ProgressCurve::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn breakers(mut self, breakers: BreakerRegistry) -> Self {
        self.breakers = Some(breakers);
        self
    }

    pub fn store(mut self, store: TaskStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn progress_curve(mut self, curve: ProgressCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            store: self.store.unwrap_or_default(),
            lifecycle: TaskLifecycle::new(self.sink),
            breakers: self.breakers.unwrap_or_default(),
            adapter: self.adapter,
            curve: self.curve,
            poll_interval: self.poll_interval,
            in_flight: AtomicBool::new(false),
        }
    }
}

impl Orchestrator {
    /// Orchestrator wired from a config: fresh store, fresh breaker
    /// registry, telemetry into `sink`.
    pub fn new(
        adapter: Arc<dyn ProviderAdapter>,
        config: &GenConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        OrchestratorBuilder::new(adapter)
            .sink(sink)
            .breakers(BreakerRegistry::new(config.breaker))
            .progress_curve(config.progress)
            .build()
    }

    pub fn builder(adapter: Arc<dyn ProviderAdapter>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(adapter)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run one generation to a terminal state.
    ///
    /// Returns the media URL on success, `None` otherwise. Failures are
    /// reported through task state, `on_error` and notices; nothing is
    /// raised to the caller. A call while another generation is in flight
    /// is rejected up front and leaves the existing task untouched.
    pub async fn generate(&self, req: GenerateRequest, callbacks: &Callbacks) -> Option<String> {
        if req.prompt.trim().is_empty() {
            callbacks.notice(NoticeLevel::Error, "prompt must not be empty");
            return None;
        }
        if req.model.trim().is_empty() {
            callbacks.notice(NoticeLevel::Error, "model must not be empty");
            return None;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            callbacks.notice(
                NoticeLevel::Warning,
                "a generation is already in flight, wait for it to finish",
            );
            return None;
        }

        let result = self.run_generation(req, callbacks).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    async fn run_generation(&self, req: GenerateRequest, callbacks: &Callbacks) -> Option<String> {
        let task_id = Uuid::new_v4().to_string();
        let media_type = req.media.media_type();
        let service = service_for(media_type);

        tracing::info!(
            target: "genflow.orchestrator",
            task_id = %task_id,
            media_type = %media_type,
            model = %req.model,
            "generation started"
        );

        let cancel = self
            .lifecycle
            .register_task(&task_id, media_type, &req.model)
            .await;
        self.store
            .register_task(GenerationTask::new(
                &task_id,
                &req.prompt,
                &req.model,
                req.media.clone(),
            ))
            .await;
        callbacks.progress(0);

        self.spawn_poller(&task_id, callbacks).await;

        let _ = self
            .store
            .apply(&task_id, TaskPatch::status(TaskStatus::Processing))
            .await;

        let provider_req = ProviderRequest {
            prompt: req.prompt.clone(),
            model: req.model.clone(),
            media: req.media.clone(),
            reference_url: req.reference_url.clone(),
        };
        let breaker = self.breakers.for_service(service);

        let outcome = tokio::select! {
            res = breaker.execute(|| async { self.adapter.invoke(service, &provider_req).await }) => Some(res),
            _ = cancel.cancelled() => None,
        };

        match outcome {
            None => {
                // Local-only cancellation: the upstream call may still be
                // running server-side.
                let _ = self
                    .store
                    .apply(&task_id, TaskPatch::status(TaskStatus::Canceled))
                    .await;
                tracing::info!(target: "genflow.orchestrator", task_id = %task_id, "generation canceled");
                callbacks.notice(NoticeLevel::Info, "generation canceled");
                None
            }
            Some(Ok(output)) => {
                let _ = self
                    .store
                    .apply(&task_id, TaskPatch::completed(&output.media_url))
                    .await;
                self.lifecycle.complete_task(&task_id).await;
                callbacks.progress(100);
                callbacks.complete(&output.media_url);
                callbacks.notice(NoticeLevel::Success, "generation completed");
                Some(output.media_url)
            }
            Some(Err(err)) => {
                let message = err.to_string();
                let _ = self
                    .store
                    .apply(&task_id, TaskPatch::failed(&message))
                    .await;
                self.lifecycle.fail_task(&task_id, &message).await;
                callbacks.error(&message);
                match &err {
                    GenError::CircuitOpen { retry_after_ms, .. } => {
                        let secs = retry_after_ms.div_ceil(1000).max(1);
                        callbacks.notice(
                            NoticeLevel::Warning,
                            &format!("service unavailable, try again in {secs}s"),
                        );
                    }
                    _ => callbacks.notice(NoticeLevel::Error, &message),
                }
                tracing::warn!(
                    target: "genflow.orchestrator",
                    task_id = %task_id,
                    error = %message,
                    "generation failed"
                );
                None
            }
        }
    }

    /// Advance displayed progress between coarse status updates.
    async fn spawn_poller(&self, task_id: &str, callbacks: &Callbacks) {
        let store = self.store.clone();
        let curve = self.curve;
        let interval = self.poll_interval;
        let on_progress = callbacks.on_progress.clone();
        let id = task_id.to_string();

        let poller = tokio::spawn(async move {
            // Delayed first tick: an immediately-failing request must not
            // see its progress moved.
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                let Some(task) = store.get(&id).await else {
                    break;
                };
                if task.status.is_terminal() {
                    break;
                }
                let next = curve.estimate(task.progress, task.status);
                if next != task.progress {
                    match store.apply(&id, TaskPatch::progress(next)).await {
                        Ok(true) => {
                            if let Some(cb) = &on_progress {
                                cb(next);
                            }
                        }
                        // Dropped by the store (the task went terminal
                        // between the read and the apply): the value must
                        // not reach the UI either.
                        Ok(false) | Err(_) => break,
                    }
                }
            }
        });

        self.lifecycle.attach_poller(task_id, poller).await;
    }

    /// Cancel the in-flight generation, if any.
    ///
    /// Cooperative and local-only: the cancel handle tells this process to
    /// stop waiting, it does not stop the upstream provider. Returns false
    /// when nothing is in flight.
    pub async fn cancel_generation(&self) -> bool {
        if !self.is_generating() {
            return false;
        }
        let Some(task) = self.store.current_task().await else {
            return false;
        };
        if task.status.is_terminal() {
            return false;
        }
        self.lifecycle.cancel_task(&task.id, CANCEL_REASON).await;
        true
    }

    /// Teardown: cancel every outstanding task and clear the store.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
        self.store.clear_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::provider::ProviderOutput;
    use crate::task::MediaType;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct StubAdapter {
        reply: Mutex<Vec<Result<ProviderOutput>>>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubAdapter {
        fn ok(url: &str) -> Self {
            Self::with_replies(vec![Ok(ProviderOutput {
                media_url: url.to_string(),
                details: None,
            })])
        }

        fn failing(message: &str, times: usize) -> Self {
            Self::with_replies(
                (0..times)
                    .map(|_| Err(GenError::Provider(message.to_string())))
                    .collect(),
            )
        }

        fn with_replies(replies: Vec<Result<ProviderOutput>>) -> Self {
            Self {
                reply: Mutex::new(replies),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl ProviderAdapter for StubAdapter {
        async fn invoke(&self, _service: &str, _req: &ProviderRequest) -> Result<ProviderOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut replies = self.reply.lock().unwrap();
            if replies.is_empty() {
                return Err(GenError::Provider("no scripted reply".to_string()));
            }
            replies.remove(0)
        }
    }

    fn image_request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            model: "ideogram-v2".to_string(),
            media: MediaParams::defaults_for(MediaType::Image),
            reference_url: None,
        }
    }

    #[tokio::test]
    async fn successful_generation_reaches_completed() {
        let orch =
            Orchestrator::builder(Arc::new(StubAdapter::ok("https://x/img.png"))).build();
        let url = orch
            .generate(image_request("a red cube"), &Callbacks::default())
            .await;
        assert_eq!(url.as_deref(), Some("https://x/img.png"));

        let task = orch.store().current_task().await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.media_url.as_deref(), Some("https://x/img.png"));
        assert!(!orch.is_generating());
    }

    #[tokio::test]
    async fn failure_keeps_progress_and_relays_exact_message() {
        let orch =
            Orchestrator::builder(Arc::new(StubAdapter::failing("rate limited", 1))).build();

        let seen_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let seen_clone = seen_error.clone();
        let callbacks = Callbacks {
            on_error: Some(Arc::new(move |msg| {
                *seen_clone.lock().unwrap() = Some(msg.to_string());
            })),
            ..Callbacks::default()
        };

        let url = orch.generate(image_request("a red cube"), &callbacks).await;
        assert!(url.is_none());

        let task = orch.store().current_task().await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, 0);
        assert_eq!(task.error.as_deref(), Some("rate limited"));
        assert_eq!(seen_error.lock().unwrap().as_deref(), Some("rate limited"));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_before_any_task_exists() {
        let adapter = Arc::new(StubAdapter::ok("https://x/img.png"));
        let orch = Orchestrator::builder(adapter.clone()).build();

        let url = orch.generate(image_request("   "), &Callbacks::default()).await;
        assert!(url.is_none());
        assert!(orch.store().is_empty().await);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_generation_is_rejected_while_in_flight() {
        let adapter =
            Arc::new(StubAdapter::ok("https://x/img.png").slow(Duration::from_millis(200)));
        let orch = Arc::new(Orchestrator::builder(adapter.clone()).build());

        let first = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.generate(image_request("a red cube"), &Callbacks::default())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orch.is_generating());
        let before = orch.store().current_task().await.unwrap();

        let second = orch
            .generate(image_request("a blue sphere"), &Callbacks::default())
            .await;
        assert!(second.is_none());

        // The in-flight task is untouched by the rejected call.
        let after = orch.store().current_task().await.unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.prompt, "a red cube");
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);

        let url = first.await.unwrap();
        assert_eq!(url.as_deref(), Some("https://x/img.png"));
    }

    #[tokio::test]
    async fn cancel_marks_task_canceled() {
        let adapter =
            Arc::new(StubAdapter::ok("https://x/img.png").slow(Duration::from_secs(3600)));
        let orch = Arc::new(Orchestrator::builder(adapter).build());

        let pending = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.generate(image_request("a red cube"), &Callbacks::default())
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orch.cancel_generation().await);

        let url = pending.await.unwrap();
        assert!(url.is_none());
        let task = orch.store().current_task().await.unwrap();
        assert_eq!(task.status, TaskStatus::Canceled);
        assert!(!orch.is_generating());

        // Nothing in flight anymore, so a second cancel is a no-op.
        assert!(!orch.cancel_generation().await);
    }

    #[tokio::test]
    async fn circuit_open_is_surfaced_as_transient_notice() {
        let adapter = Arc::new(StubAdapter::failing("upstream exploded", 10));
        let orch = Orchestrator::builder(adapter.clone()).build();

        let notices: Arc<Mutex<Vec<(NoticeLevel, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let notices_clone = notices.clone();
        let callbacks = Callbacks {
            on_notice: Some(Arc::new(move |level, msg| {
                notices_clone.lock().unwrap().push((level, msg.to_string()));
            })),
            ..Callbacks::default()
        };

        // Default threshold is three; the fourth call is rejected by the
        // breaker without reaching the adapter.
        for _ in 0..4 {
            let _ = orch.generate(image_request("a red cube"), &callbacks).await;
        }
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);

        let notices = notices.lock().unwrap();
        let last = notices.last().unwrap();
        assert_eq!(last.0, NoticeLevel::Warning);
        assert!(last.1.contains("try again"), "got: {}", last.1);

        let task = orch.store().current_task().await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn progress_callback_only_reports_applied_values() {
        // A tight poll interval races the poller against quick completions.
        // When the store rejects an advance because the task went terminal
        // mid-tick, the callback must not see that value, so the reported
        // sequence stays monotonic and nothing follows the final 100.
        for _ in 0..25 {
            let adapter =
                Arc::new(StubAdapter::ok("https://x/img.png").slow(Duration::from_millis(5)));
            let orch = Orchestrator::builder(adapter)
                .poll_interval(Duration::from_millis(1))
                .build();

            let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
            let seen_clone = seen.clone();
            let callbacks = Callbacks {
                on_progress: Some(Arc::new(move |p| seen_clone.lock().unwrap().push(p))),
                ..Callbacks::default()
            };

            let url = orch.generate(image_request("a red cube"), &callbacks).await;
            assert!(url.is_some());

            let seen = seen.lock().unwrap();
            assert!(
                seen.windows(2).all(|w| w[0] <= w[1]),
                "progress regressed: {seen:?}"
            );
            assert_eq!(*seen.last().unwrap(), 100);
        }
    }

    #[tokio::test]
    async fn poller_advances_progress_while_processing() {
        let adapter =
            Arc::new(StubAdapter::ok("https://x/img.png").slow(Duration::from_millis(120)));
        let orch = Orchestrator::builder(adapter)
            .poll_interval(Duration::from_millis(20))
            .build();

        let seen: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let callbacks = Callbacks {
            on_progress: Some(Arc::new(move |p| seen_clone.lock().unwrap().push(p))),
            ..Callbacks::default()
        };

        let url = orch.generate(image_request("a red cube"), &callbacks).await;
        assert!(url.is_some());

        let seen = seen.lock().unwrap();
        assert_eq!(*seen.first().unwrap(), 0);
        assert_eq!(*seen.last().unwrap(), 100);
        // Interim values exist and never decrease.
        assert!(seen.len() > 2);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }
}
