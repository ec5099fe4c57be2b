//! Shared helpers for lifecycle integration tests.

use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use genflow_core::{
    GenError, GenerateRequest, MediaParams, MediaType, ProviderAdapter, ProviderOutput,
    ProviderRequest, Result,
};

/// Provider that replays a script of canned outcomes.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ProviderOutput>>>,
    pub calls: AtomicUsize,
    delay: Duration,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn then_ok(self, media_url: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(ProviderOutput {
            media_url: media_url.to_string(),
            details: None,
        }));
        self
    }

    pub fn then_err(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(GenError::Provider(message.to_string())));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    async fn invoke(&self, _service: &str, _request: &ProviderRequest) -> Result<ProviderOutput> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| Err(GenError::Provider("script exhausted".to_string())))
    }
}

#[allow(dead_code)]
pub fn image_request(prompt: &str, model: &str) -> GenerateRequest {
    GenerateRequest {
        prompt: prompt.to_string(),
        model: model.to_string(),
        media: MediaParams::defaults_for(MediaType::Image),
        reference_url: None,
    }
}
