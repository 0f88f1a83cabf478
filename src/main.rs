use anyhow::{Context, Result};
use std::io::Read;

use chat_predictor::config::{Config, LogFormat};
use chat_predictor::models::PredictionSet;
use chat_predictor::predictor::{PredictionRequest, Predictor};
use chat_predictor::prompt::{current_timestamp, parse_context};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;

    init_logging(&config);

    config.validate()?;

    tracing::info!("Chat predictor starting...");
    tracing::debug!(
        model = %config.model,
        api_url = %config.api_url,
        delivery = ?config.delivery_mode,
        slot_count = config.prediction_count,
        "Configuration loaded"
    );

    let raw_context = read_context(&config)?;
    let context = parse_context(&raw_context, config.background.as_deref());

    let request = PredictionRequest::new(context, config.message_type)
        .with_new_message(config.new_message.clone())
        .with_timestamp(Some(current_timestamp()));

    let predictor = Predictor::new(&config)?;

    let mut updates = 0usize;
    let final_set = predictor
        .generate_stream(&request, |snapshot: PredictionSet| {
            updates += 1;
            tracing::debug!(
                update = updates,
                texts = ?snapshot.texts(),
                reasoning_len = snapshot.reasoning().map(str::len).unwrap_or(0),
                "Snapshot"
            );
        })
        .await
        .context("Prediction failed")?;

    tracing::info!(updates, "✅ Predictions generated");

    let output =
        serde_json::to_string_pretty(&final_set).context("Failed to serialize predictions")?;
    println!("{}", output);

    Ok(())
}

/// Initialize logging with the configured level; RUST_LOG takes precedence
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Read the chat context from the configured file or stdin
fn read_context(config: &Config) -> Result<String> {
    match &config.context_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file: {}", path.display())),
        None => {
            tracing::debug!("Reading chat context from stdin");
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read chat context from stdin")?;
            Ok(buffer)
        }
    }
}
