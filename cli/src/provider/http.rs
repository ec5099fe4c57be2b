//! HTTP gateway adapter.
//!
//! Posts the generation request to `{base_url}/invoke/{service}` and
//! expects a `{ "success": bool, "data": {...}, "error": "..." }` envelope.
//! Vendor-specific shaping happens behind the gateway, not here.

use async_trait::async_trait;
use genflow_core::config::ProviderConfig;
use genflow_core::{GenError, ProviderAdapter, ProviderOutput, ProviderRequest, Result};
use reqwest::Client;
use serde::Deserialize;

#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    success: bool,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpProvider {
    pub fn new(cfg: &ProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ProviderAdapter for HttpProvider {
    async fn invoke(&self, service: &str, request: &ProviderRequest) -> Result<ProviderOutput> {
        let url = format!("{}/invoke/{}", self.base_url, service);
        tracing::debug!(target: "genflow.provider", service, url = %url, "invoking generation gateway");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| GenError::Provider(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(GenError::Provider(format!(
                "request failed with status {status}: {error_text}"
            )));
        }

        let body: InvokeResponse = response
            .json()
            .await
            .map_err(|e| GenError::Provider(format!("invalid gateway response: {e}")))?;

        if !body.success {
            return Err(GenError::Provider(
                body.error
                    .unwrap_or_else(|| "generation failed".to_string()),
            ));
        }

        let data = body.data.unwrap_or(serde_json::Value::Null);
        let media_url = data
            .get("media_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GenError::Provider("gateway response missing media_url".to_string()))?
            .to_string();

        Ok(ProviderOutput {
            media_url,
            details: Some(data),
        })
    }
}
