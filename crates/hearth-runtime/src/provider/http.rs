//! HTTP model-provider client.
//!
//! Sends the prompts as one JSON POST and expects the reply object
//! back as the response body. Transient failures (connect, timeout,
//! 429, 5xx) are retried with exponential backoff and jitter; a
//! `Retry-After` header overrides the computed delay. Schema failures
//! and 4xx responses are returned immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, instrument, warn};

use hearth_core::reply::AssistantReply;
use hearth_core::retry::{RetryConfig, calculate_backoff_delay, parse_retry_after_header};

use super::{ModelProvider, ProviderError, ProviderResult};

/// Default per-request timeout.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// How much of an error body lands in the error message.
const ERROR_BODY_LIMIT: usize = 300;

/// Configuration for [`HttpModelProvider`].
#[derive(Clone, Debug)]
pub struct HttpProviderConfig {
    /// Base URL of the provider API, no trailing slash.
    pub base_url: String,
    /// Bearer token.
    pub api_key: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Retry policy for transient failures.
    pub retry: RetryConfig,
}

impl HttpProviderConfig {
    /// Config with default timeout and retry policy.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry: RetryConfig::default(),
        }
    }
}

/// Model provider over a JSON-completion HTTP endpoint.
pub struct HttpModelProvider {
    config: HttpProviderConfig,
    client: reqwest::Client,
}

impl HttpModelProvider {
    /// Build the provider and its HTTP client.
    pub fn new(config: HttpProviderConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { config, client })
    }

    /// Build with an existing shared client.
    #[must_use]
    pub fn with_client(config: HttpProviderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        let _ = headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value).map_err(|_| ProviderError::Api {
                status: 0,
                message: "api key is not a valid header value".into(),
                retryable: false,
            })?,
        );
        Ok(headers)
    }

    /// One request attempt. Transient failures come back as retryable
    /// errors with an optional server-directed delay.
    async fn attempt(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<AssistantReply, (ProviderError, Option<u64>)> {
        let url = format!("{}/v1/complete", self.config.base_url);
        let body = json!({
            "model": self.config.model,
            "system": system_prompt,
            "user": user_prompt,
        });

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers().map_err(|err| (err, None))?)
            .json(&body)
            .send()
            .await
            .map_err(|err| (ProviderError::Http(err), None))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_header);
            let mut message = response.text().await.unwrap_or_default();
            message.truncate(ERROR_BODY_LIMIT);
            let retryable =
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            return Err((
                ProviderError::Api {
                    status: status.as_u16(),
                    message,
                    retryable,
                },
                retry_after_ms,
            ));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|err| (ProviderError::Http(err), None))?;
        AssistantReply::from_value(value).map_err(|err| (ProviderError::InvalidReply(err), None))
    }
}

#[async_trait]
impl ModelProvider for HttpModelProvider {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip_all, fields(model = %self.config.model))]
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> ProviderResult<AssistantReply> {
        let max_retries = self.config.retry.max_retries;
        let mut attempt = 0u32;
        loop {
            match self.attempt(system_prompt, user_prompt).await {
                Ok(reply) => {
                    debug!(attempt, "model call succeeded");
                    return Ok(reply);
                }
                Err((err, retry_after_ms)) => {
                    if !err.is_retryable() || attempt >= max_retries {
                        return Err(err);
                    }
                    let delay_ms = retry_after_ms.unwrap_or_else(|| {
                        calculate_backoff_delay(attempt, &self.config.retry, rand::random::<f64>())
                    });
                    warn!(attempt, delay_ms, %err, "model call failed, retrying");
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply_body() -> serde_json::Value {
        json!({
            "reflection": "That sounds rough, thanks for sharing.",
            "interpretation": "Often this is a tension headache.",
            "guidance": ["Rest and hydration help"],
            "redFlags": ["Sudden severe headache"],
            "followUp": "When did it start?",
            "recommendations": ["See your doctor if it lasts"]
        })
    }

    fn fast_config(base_url: &str) -> HttpProviderConfig {
        let mut config = HttpProviderConfig::new(base_url, "test-key", "hearth-chat-1");
        config.retry = RetryConfig {
            base_delay_ms: 1,
            max_delay_ms: 5,
            ..RetryConfig::default()
        };
        config
    }

    #[tokio::test]
    async fn successful_call_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "hearth-chat-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpModelProvider::new(fast_config(&server.uri())).unwrap();
        let reply = provider.complete("system", "user").await.unwrap();
        assert_eq!(reply.red_flags.len(), 1);
    }

    #[tokio::test]
    async fn server_error_is_retried_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpModelProvider::new(fast_config(&server.uri())).unwrap();
        let reply = provider.complete("system", "user").await.unwrap();
        assert!(!reply.reflection.is_empty());
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpModelProvider::new(fast_config(&server.uri())).unwrap();
        let err = provider.complete("system", "user").await.unwrap_err();
        assert_matches!(err, ProviderError::Api { status: 400, .. });
    }

    #[tokio::test]
    async fn rate_limit_honors_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "0")
                    .set_body_string("slow down"),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply_body()))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpModelProvider::new(fast_config(&server.uri())).unwrap();
        assert!(provider.complete("system", "user").await.is_ok());
    }

    #[tokio::test]
    async fn schema_violation_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"reflection": "only this"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpModelProvider::new(fast_config(&server.uri())).unwrap();
        let err = provider.complete("system", "user").await.unwrap_err();
        assert_matches!(err, ProviderError::InvalidReply(_));
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            // One initial attempt plus max_retries (3).
            .expect(4)
            .mount(&server)
            .await;

        let provider = HttpModelProvider::new(fast_config(&server.uri())).unwrap();
        let err = provider.complete("system", "user").await.unwrap_err();
        assert_matches!(err, ProviderError::Api { status: 500, .. });
    }
}
