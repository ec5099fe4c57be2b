//! Provider adapter boundary.
//!
//! The orchestrator is transport-agnostic: an adapter turns a generation
//! request into whatever a concrete vendor or edge function expects. An
//! unsuccessful upstream result surfaces as [`GenError::Provider`] carrying
//! the upstream message verbatim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::task::{MediaParams, MediaType};

/// Service name the orchestrator routes a media type to. One circuit
/// breaker exists per service name.
pub fn service_for(media_type: MediaType) -> &'static str {
    match media_type {
        MediaType::Image => "image-generation",
        MediaType::Video => "video-generation",
        MediaType::Audio => "audio-generation",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub prompt: String,
    pub model: String,
    #[serde(flatten)]
    pub media: MediaParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOutput {
    pub media_url: String,
    /// Vendor-specific response payload, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Invoke the named generation service.
    ///
    /// `service` is the routing key from [`service_for`]; adapters that
    /// serve a single vendor may ignore it.
    async fn invoke(&self, service: &str, request: &ProviderRequest) -> Result<ProviderOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_flat_media_params() {
        let req = ProviderRequest {
            prompt: "a red cube".to_string(),
            model: "ideogram-v2".to_string(),
            media: MediaParams::Image {
                aspect_ratio: Some("1:1".to_string()),
                style: None,
            },
            reference_url: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["prompt"], "a red cube");
        assert_eq!(json["media_type"], "image");
        assert_eq!(json["aspect_ratio"], "1:1");
        assert!(json.get("reference_url").is_none());
    }

    #[test]
    fn service_routing_is_stable() {
        assert_eq!(service_for(MediaType::Image), "image-generation");
        assert_eq!(service_for(MediaType::Video), "video-generation");
        assert_eq!(service_for(MediaType::Audio), "audio-generation");
    }
}
