// Prediction session entry points
//
// Checks preconditions, sends the completion request and routes the response
// through the real streaming decoder or the simulated replay.

use tokio::time::Duration;
use tracing::{debug, info};

use crate::config::{Config, DeliveryMode};
use crate::decoder::{decode_stream, DecoderOptions, PredictionDecoder};
use crate::error::{PredictorError, Result};
use crate::http_client::CompletionClient;
use crate::models::openai::{ChatCompletionRequest, ChunkDelta};
use crate::models::{MessageType, PredictionSet};
use crate::prompt::build_messages;
use crate::simulated::{simulate_streaming, SimulationCadence};
use crate::streaming::response_frames;

/// Input of one prediction session
#[derive(Debug, Clone, Default)]
pub struct PredictionRequest {
    /// Rendered chat context (background plus dialogue record)
    pub context: String,
    pub message_type: MessageType,
    pub new_message: Option<String>,
    pub timestamp: Option<String>,
}

impl PredictionRequest {
    pub fn new(context: impl Into<String>, message_type: MessageType) -> Self {
        Self {
            context: context.into(),
            message_type,
            ..Self::default()
        }
    }

    pub fn with_new_message(mut self, message: Option<String>) -> Self {
        self.new_message = message;
        self
    }

    pub fn with_timestamp(mut self, timestamp: Option<String>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Generates prediction sets against a chat-completion service
pub struct Predictor {
    client: CompletionClient,
    model: String,
    temperature: f32,
    delivery_mode: DeliveryMode,
    options: DecoderOptions,
    first_token_timeout: Option<Duration>,
    cadence: SimulationCadence,
}

impl Predictor {
    /// Create a predictor. Fails with `MissingCredential` when no API key is configured.
    pub fn new(config: &Config) -> Result<Self> {
        if config.prediction_count == 0 {
            return Err(PredictorError::Config(
                "prediction count must be at least 1".to_string(),
            ));
        }

        let client = CompletionClient::new(
            &config.api_url,
            &config.api_key,
            config.http_connect_timeout,
            config.http_request_timeout,
        )?;

        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            delivery_mode: config.delivery_mode,
            options: config.decoder_options(),
            first_token_timeout: (config.first_token_timeout > 0)
                .then(|| Duration::from_secs(config.first_token_timeout)),
            cadence: SimulationCadence::default(),
        })
    }

    /// Override the timing of simulated delivery
    pub fn with_cadence(mut self, cadence: SimulationCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.delivery_mode
    }

    /// Run a session, calling `on_update` with every snapshot. The last call
    /// carries the final set, which is also returned.
    ///
    /// On failure the callback receives no final snapshot and the error is returned.
    pub async fn generate_stream<F>(
        &self,
        request: &PredictionRequest,
        on_update: F,
    ) -> Result<PredictionSet>
    where
        F: FnMut(PredictionSet),
    {
        check_request(request)?;

        info!(
            model = %self.model,
            delivery = ?self.delivery_mode,
            slot_count = self.options.slot_count,
            "Generating predictions"
        );

        match self.delivery_mode {
            DeliveryMode::Real => {
                let response = self
                    .client
                    .stream_chat(&self.completion_request(request, true))
                    .await?;
                let frames = response_frames(response, self.first_token_timeout);
                decode_stream(frames, self.options, on_update).await
            }
            DeliveryMode::Simulated => {
                let results = self.complete(request).await?;
                Ok(simulate_streaming(&results, &self.cadence, on_update).await)
            }
        }
    }

    /// Run a single-shot session and return the final set without callbacks
    pub async fn generate(&self, request: &PredictionRequest) -> Result<PredictionSet> {
        check_request(request)?;
        self.complete(request).await
    }

    async fn complete(&self, request: &PredictionRequest) -> Result<PredictionSet> {
        let (content, reasoning) = self
            .client
            .complete_chat(&self.completion_request(request, false))
            .await?;

        debug!(content_len = content.len(), "Received single-shot completion");
        finalize_response(self.options, content, reasoning)
    }

    fn completion_request(&self, request: &PredictionRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(
                &request.context,
                request.message_type,
                request.new_message.as_deref(),
                request.timestamp.as_deref(),
            ),
            stream,
            temperature: Some(self.temperature),
            // The prompt asks for every prediction in a single choice
            n: Some(1),
        }
    }
}

fn check_request(request: &PredictionRequest) -> Result<()> {
    if request.context.trim().is_empty() {
        return Err(PredictorError::Validation(
            "chat context is empty".to_string(),
        ));
    }
    Ok(())
}

/// Decode a complete response as a one-frame session
pub fn finalize_response(
    options: DecoderOptions,
    content: String,
    reasoning: Option<String>,
) -> Result<PredictionSet> {
    let mut decoder = PredictionDecoder::new(options);
    decoder.start();
    decoder.apply(&ChunkDelta {
        content: Some(content),
        reasoning_content: reasoning,
    })?;
    decoder.finish()
}
