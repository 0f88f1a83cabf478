// Chat Predictor - Library root for testing

pub mod config;
pub mod decoder;
pub mod error;
pub mod extractor;
pub mod finalizer;
pub mod http_client;
pub mod models;
pub mod predictor;
pub mod prompt;
pub mod simulated;
pub mod streaming;
pub mod thinking_parser;
