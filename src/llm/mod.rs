//! Inference-service client.
//!
//! The service is consumed, not reimplemented: one blocking request with
//! `{prompt, model, temperature}` in, free-form `{text}` out. The default
//! implementation talks to a local Ollama server over HTTP; tests swap in
//! mocks through the `InferenceClient` trait.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::TransportError;

/// Options sent with every generation request.
const NUM_PREDICT: u32 = 512;

/// One request to the inference service.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f32,
}

/// Raw response text. The caller owns extraction — arbitrary free-form
/// content is expected here, never an error.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
}

/// Seam for the inference transport.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Identifier used in rationales and logs.
    fn endpoint(&self) -> &str;

    /// Issue one blocking call. Transport problems are the only failure
    /// mode; response content is never validated here.
    async fn complete(&self, request: CompletionRequest)
    -> Result<CompletionResponse, TransportError>;
}

/// Call the service with a bounded timeout and at most one retry on
/// transport failure. A timeout counts as a transport failure.
///
/// There is no in-flight cancellation: an issued call runs to its
/// timeout bound.
pub async fn complete_with_retry(
    client: &dyn InferenceClient,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<CompletionResponse, TransportError> {
    match attempt(client, request.clone(), timeout).await {
        Ok(response) => Ok(response),
        Err(first) => {
            warn!(error = %first, "Inference call failed, retrying once");
            attempt(client, request, timeout).await
        }
    }
}

async fn attempt(
    client: &dyn InferenceClient,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<CompletionResponse, TransportError> {
    match tokio::time::timeout(timeout, client.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

// ── Ollama client ───────────────────────────────────────────────────

/// HTTP client for an Ollama `/api/generate` endpoint.
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    /// Create a client for the given base URL (e.g. `http://localhost:11434`).
    ///
    /// The reqwest-level timeout backstops the caller's `tokio::time::timeout`;
    /// it is set slightly above typical bounds so the caller's budget wins.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, TransportError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": NUM_PREDICT,
            },
        });

        debug!(model = %request.model, url = %url, "Calling inference service");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout { seconds: 0 }
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
            });
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        let text = payload.response.trim().to_string();
        if text.is_empty() {
            return Err(TransportError::EmptyResponse);
        }

        Ok(CompletionResponse { text })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Mock that fails a fixed number of times before succeeding.
    struct FlakyClient {
        failures: AtomicUsize,
    }

    #[async_trait]
    impl InferenceClient for FlakyClient {
        fn endpoint(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, TransportError> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            }).is_ok()
            {
                Err(TransportError::Connect("refused".into()))
            } else {
                Ok(CompletionResponse { text: "ok".into() })
            }
        }
    }

    /// Mock that never returns within the timeout.
    struct HangingClient;

    #[async_trait]
    impl InferenceClient for HangingClient {
        fn endpoint(&self) -> &str {
            "mock"
        }

        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> Result<CompletionResponse, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "classify this".into(),
            model: "mistral:latest".into(),
            temperature: 0.3,
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_single_failure() {
        let client = FlakyClient {
            failures: AtomicUsize::new(1),
        };
        let result =
            complete_with_retry(&client, request(), Duration::from_secs(5)).await;
        assert_eq!(result.unwrap().text, "ok");
    }

    #[tokio::test]
    async fn retry_gives_up_after_second_failure() {
        let client = FlakyClient {
            failures: AtomicUsize::new(2),
        };
        let result =
            complete_with_retry(&client, request(), Duration::from_secs(5)).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn timeout_is_a_transport_failure() {
        let result =
            complete_with_retry(&HangingClient, request(), Duration::from_millis(10)).await;
        assert!(matches!(result, Err(TransportError::Timeout { .. })));
    }
}
