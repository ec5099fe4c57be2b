//! Offline provider for demos and smoke tests.
//!
//! Sleeps long enough for the progress poller to tick, then returns a fake
//! media URL. A prompt containing "fail" produces a provider failure so the
//! error path can be exercised without a gateway.

use std::time::Duration;

use async_trait::async_trait;
use genflow_core::{GenError, ProviderAdapter, ProviderOutput, ProviderRequest, Result};
use uuid::Uuid;

pub struct MockProvider {
    latency: Duration,
}

impl MockProvider {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn invoke(&self, service: &str, request: &ProviderRequest) -> Result<ProviderOutput> {
        tokio::time::sleep(self.latency).await;

        if request.prompt.to_lowercase().contains("fail") {
            return Err(GenError::Provider("mock provider failure".to_string()));
        }

        let ext = match request.media.media_type() {
            genflow_core::MediaType::Image => "png",
            genflow_core::MediaType::Video => "mp4",
            genflow_core::MediaType::Audio => "mp3",
        };
        Ok(ProviderOutput {
            media_url: format!("https://mock.genflow.dev/{service}/{}.{ext}", Uuid::new_v4()),
            details: Some(serde_json::json!({ "mock": true, "model": request.model })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_core::{MediaParams, MediaType};

    fn request(prompt: &str) -> ProviderRequest {
        ProviderRequest {
            prompt: prompt.to_string(),
            model: "mock-v1".to_string(),
            media: MediaParams::defaults_for(MediaType::Video),
            reference_url: None,
        }
    }

    #[tokio::test]
    async fn returns_media_url_matching_media_type() {
        let provider = MockProvider::new(Duration::ZERO);
        let out = provider
            .invoke("video-generation", &request("a red cube"))
            .await
            .unwrap();
        assert!(out.media_url.starts_with("https://mock.genflow.dev/video-generation/"));
        assert!(out.media_url.ends_with(".mp4"));
    }

    #[tokio::test]
    async fn fail_prompt_fails() {
        let provider = MockProvider::new(Duration::ZERO);
        let err = provider
            .invoke("video-generation", &request("please FAIL now"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "mock provider failure");
    }
}
