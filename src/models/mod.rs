// Data models for the completion API and prediction results

pub mod openai;
pub mod prediction;

pub use prediction::{LabelLanguage, Locale, MessageType, PredictionSet, PredictionSlot};
