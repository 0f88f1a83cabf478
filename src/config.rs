use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::decoder::{DecoderOptions, DEFAULT_SLOT_COUNT};
use crate::error::PredictorError;
use crate::models::{LabelLanguage, Locale, MessageType};

/// Chat Predictor - streaming reply predictions for a chat transcript
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the chat-completion API
    #[arg(long, env = "OPENROUTER_API_URL", default_value = "https://openrouter.ai/api/v1")]
    pub api_url: String,

    /// API key sent as a bearer token
    #[arg(short = 'k', long, env = "OPENROUTER_API_KEY")]
    pub api_key: Option<String>,

    /// Model identifier
    #[arg(short, long, env = "PREDICTOR_MODEL", default_value = "anthropic/claude-3.7-sonnet")]
    pub model: String,

    /// Number of prediction slots
    #[arg(short = 'n', long, env = "PREDICTION_COUNT", default_value_t = DEFAULT_SLOT_COUNT)]
    pub count: usize,

    /// Sampling temperature
    #[arg(long, env = "PREDICTOR_TEMPERATURE", default_value = "1.0")]
    pub temperature: f32,

    /// Display locale for placeholders (en, zh)
    #[arg(long, env = "PREDICTOR_LOCALE", default_value = "en")]
    pub locale: String,

    /// Label language scanned first (en, zh)
    #[arg(long, env = "LABEL_LANGUAGE", default_value = "en")]
    pub label_language: String,

    /// Delivery mode (real, simulated)
    #[arg(long, env = "DELIVERY_MODE", default_value = "real")]
    pub delivery: String,

    /// Whose reply to predict (self, other)
    #[arg(long, default_value = "other")]
    pub message_type: String,

    /// Chat context file: JSON transcript or plain text. Reads stdin when absent.
    #[arg(short = 'c', long)]
    pub context_file: Option<String>,

    /// Background information prepended to a JSON transcript
    #[arg(long)]
    pub background: Option<String>,

    /// Latest message in the conversation
    #[arg(long)]
    pub new_message: Option<String>,

    /// First token timeout in seconds
    #[arg(long, env = "FIRST_TOKEN_TIMEOUT", default_value = "60")]
    pub first_token_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "300")]
    pub http_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Completion service
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,

    // Decoding
    pub prediction_count: usize,
    pub locale: Locale,
    pub label_language: LabelLanguage,
    pub delivery_mode: DeliveryMode,

    // Request input
    pub message_type: MessageType,
    pub context_file: Option<PathBuf>,
    pub background: Option<String>,
    pub new_message: Option<String>,

    // Timeouts
    pub first_token_timeout: u64,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Stream frames from the service as they arrive
    #[default]
    Real,
    /// Single-shot completion replayed progressively
    Simulated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "anthropic/claude-3.7-sonnet".to_string(),
            temperature: 1.0,
            prediction_count: DEFAULT_SLOT_COUNT,
            locale: Locale::En,
            label_language: LabelLanguage::English,
            delivery_mode: DeliveryMode::Real,
            message_type: MessageType::Other,
            context_file: None,
            background: None,
            new_message: None,
            first_token_timeout: 60,
            http_connect_timeout: 30,
            http_request_timeout: 300,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Ok(Self::from_args(CliArgs::parse()))
    }

    /// Build configuration from parsed arguments plus env-only settings
    pub fn from_args(args: CliArgs) -> Self {
        Config {
            api_url: args.api_url,

            // Checked in validate()
            api_key: args.api_key.unwrap_or_default(),

            model: args.model,
            temperature: args.temperature,

            prediction_count: args.count,
            locale: parse_locale(&args.locale),
            label_language: parse_label_language(&args.label_language),
            delivery_mode: parse_delivery_mode(&args.delivery),

            message_type: parse_message_type(&args.message_type),
            context_file: args.context_file.map(|s| expand_tilde(&s)),
            background: args.background.filter(|s| !s.trim().is_empty()),
            new_message: args.new_message.filter(|s| !s.trim().is_empty()),

            first_token_timeout: args.first_token_timeout,

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,

            log_format: parse_log_format(&std::env::var("LOG_FORMAT").unwrap_or_default()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), PredictorError> {
        if self.api_key.trim().is_empty() {
            return Err(PredictorError::MissingCredential);
        }

        if self.prediction_count == 0 {
            return Err(PredictorError::Config(
                "PREDICTION_COUNT must be at least 1".to_string(),
            ));
        }

        if let Some(path) = &self.context_file {
            if !path.exists() {
                return Err(PredictorError::Config(format!(
                    "context file does not exist: {}",
                    path.display()
                )));
            }
        }

        Ok(())
    }

    /// Decoder settings derived from this configuration
    pub fn decoder_options(&self) -> DecoderOptions {
        DecoderOptions {
            slot_count: self.prediction_count,
            locale: self.locale,
            primary_language: self.label_language,
        }
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse display locale from string
fn parse_locale(s: &str) -> Locale {
    match s.to_lowercase().as_str() {
        "zh" | "zh-cn" | "chinese" => Locale::Zh,
        _ => Locale::En,
    }
}

/// Parse primary label language from string
fn parse_label_language(s: &str) -> LabelLanguage {
    match s.to_lowercase().as_str() {
        "zh" | "chinese" => LabelLanguage::Chinese,
        _ => LabelLanguage::English,
    }
}

/// Parse delivery mode from string
fn parse_delivery_mode(s: &str) -> DeliveryMode {
    match s.to_lowercase().as_str() {
        "simulated" => DeliveryMode::Simulated,
        _ => DeliveryMode::Real,
    }
}

/// Parse message type from string
fn parse_message_type(s: &str) -> MessageType {
    match s.to_lowercase().as_str() {
        "self" | "me" => MessageType::Me,
        _ => MessageType::Other,
    }
}

fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}
