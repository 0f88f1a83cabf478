use reqwest::{Client, Response};
use std::time::Duration;

use crate::error::PredictorError;
use crate::models::openai::{ChatCompletionRequest, ChatCompletionResponse};

/// HTTP client for an OpenAI-compatible chat-completion service.
///
/// Requests are sent once. Failures are categorised and surfaced, never retried.
pub struct CompletionClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Base URL, e.g. `https://openrouter.ai/api/v1`
    base_url: String,

    /// Bearer token
    api_key: String,
}

impl CompletionClient {
    /// Create a new HTTP client
    pub fn new(
        base_url: &str,
        api_key: &str,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self, PredictorError> {
        if api_key.trim().is_empty() {
            return Err(PredictorError::MissingCredential);
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .map_err(|e| {
                PredictorError::Internal(anyhow::anyhow!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Start a streaming completion. The returned response body is the event stream.
    pub async fn stream_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<Response, PredictorError> {
        self.send(request).await
    }

    /// Run a single-shot completion and return the content of `choices[0]`,
    /// together with any separately delivered reasoning.
    pub async fn complete_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<(String, Option<String>), PredictorError> {
        let response = self.send(request).await?;
        let body = response.text().await?;

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            PredictorError::InvalidResponse(format!("completion body is not valid JSON: {}", e))
        })?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| PredictorError::InvalidResponse("response has no choices".to_string()))?;

        let content = message.content.ok_or_else(|| {
            PredictorError::InvalidResponse("first choice has no content".to_string())
        })?;

        Ok((content, message.reasoning_content))
    }

    /// Execute a request without retries
    async fn send(&self, request: &ChatCompletionRequest) -> Result<Response, PredictorError> {
        let url = self.completions_url();
        tracing::debug!(
            url = %url,
            model = %request.model,
            stream = request.stream,
            "Sending HTTP request"
        );

        let result = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    tracing::debug!(status = %status, "Request successful");
                    return Ok(response);
                }

                let error_text = response.text().await.unwrap_or_default();
                tracing::error!(
                    status = status.as_u16(),
                    url = %url,
                    response_body = %error_text,
                    "HTTP request failed with error response"
                );

                Err(PredictorError::Api {
                    status: status.as_u16(),
                    message: error_text,
                })
            }

            Err(e) => {
                let err = PredictorError::from(e);
                tracing::error!(error = %err, url = %url, "HTTP request error");
                Err(err)
            }
        }
    }
}
