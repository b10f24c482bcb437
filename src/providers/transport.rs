// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! HTTP transport for provider requests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

#[cfg(feature = "telemetry")]
use tracing::debug;
use tracing::warn;

#[cfg(feature = "telemetry")]
use crate::telemetry::metrics::GLOBAL_METRICS;

use crate::error::ProviderError;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// Sends one serialized request and returns the decoded reply body.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, request: &Value) -> Result<Value, ProviderError>;
}

/// JSON-over-HTTP transport built on reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
    headers: Vec<(&'static str, String)>,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(
        url: impl Into<String>,
        headers: Vec<(&'static str, String)>,
        timeout_ms: Option<u64>,
    ) -> Result<Self, ProviderError> {
        let timeout_ms = timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            headers,
            timeout_ms,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(&self, request: &Value) -> Result<Value, ProviderError> {
        let start = Instant::now();

        #[cfg(feature = "telemetry")]
        debug!(url = %self.url, "Sending provider request");

        let mut builder = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(request);
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }

        let result = builder.send().await;

        #[cfg(feature = "telemetry")]
        GLOBAL_METRICS.record_operation("http.request", start.elapsed());

        let response = result.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(self.timeout_ms)
            } else {
                ProviderError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            warn!(
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Provider request failed"
            );
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::ParseError(e.to_string()))
    }
}

/// Extract a message from an error body.
///
/// Relays answer with `{"message": ...}`, providers with
/// `{"error": {"message": ...}}`. Anything else is returned verbatim.
pub fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let relay = value.get("message").and_then(Value::as_str);
        let provider = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str);
        let bare = value.get("error").and_then(Value::as_str);
        if let Some(message) = relay.or(provider).or(bare) {
            return Some(message.to_string());
        }
    }

    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_relay_form() {
        assert_eq!(
            error_message(r#"{"message": "Upstream unavailable"}"#).as_deref(),
            Some("Upstream unavailable")
        );
    }

    #[test]
    fn test_error_message_provider_form() {
        let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens too large"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("max_tokens too large"));
    }

    #[test]
    fn test_error_message_raw_body() {
        assert_eq!(error_message("Bad Gateway").as_deref(), Some("Bad Gateway"));
        assert_eq!(error_message("   "), None);
    }

    #[test]
    fn test_http_transport_keeps_url() {
        let transport = HttpTransport::new(
            "http://localhost:1/v1/messages",
            vec![("x-api-key", "k".to_string())],
            Some(1000),
        )
        .unwrap();
        assert_eq!(transport.url(), "http://localhost:1/v1/messages");
    }

    #[tokio::test]
    async fn test_mock_transport() {
        let mut mock = MockProviderTransport::new();
        mock.expect_send()
            .times(1)
            .returning(|_| Ok(serde_json::json!({"ok": true})));

        let reply = mock.send(&serde_json::json!({})).await.unwrap();
        assert_eq!(reply["ok"], true);
    }
}
