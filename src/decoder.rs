// Incremental prediction decoder
//
// Owns one decode session: accumulates every content delta, tracks reasoning
// spans, re-extracts all K slots from the full accumulated text on each frame
// and emits a complete snapshot per frame. Finalization re-parses the whole
// text with placeholders and label/quote stripping.

use futures::stream::{Stream, StreamExt};
use tracing::{debug, error, info};

use crate::error::{PredictorError, Result};
use crate::extractor::SectionExtractor;
use crate::finalizer::Finalizer;
use crate::models::openai::ChunkDelta;
use crate::models::{LabelLanguage, Locale, PredictionSet};
use crate::thinking_parser::ThinkingParser;

/// Default number of prediction slots (positive, negative, neutral)
pub const DEFAULT_SLOT_COUNT: usize = 3;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    Streaming,
    Finalizing,
    Done,
}

/// Settings consumed by a decode session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Number of slots K
    pub slot_count: usize,
    /// Display locale, used for placeholder text only
    pub locale: Locale,
    /// Label language scanned first
    pub primary_language: LabelLanguage,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            locale: Locale::En,
            primary_language: LabelLanguage::English,
        }
    }
}

impl DecoderOptions {
    pub fn extractor(&self) -> SectionExtractor {
        SectionExtractor::new(self.slot_count, self.primary_language, self.locale)
    }
}

/// One decode session
#[derive(Debug)]
pub struct PredictionDecoder {
    options: DecoderOptions,
    extractor: SectionExtractor,
    state: DecoderState,
    slots: PredictionSet,
    content: String,
    thinking: ThinkingParser,
    reasoning_field_seen: bool,
    frames: usize,
}

impl PredictionDecoder {
    pub fn new(options: DecoderOptions) -> Self {
        Self {
            options,
            extractor: options.extractor(),
            state: DecoderState::Idle,
            slots: PredictionSet::empty(options.slot_count),
            content: String::new(),
            thinking: ThinkingParser::new(),
            reasoning_field_seen: false,
            frames: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn options(&self) -> &DecoderOptions {
        &self.options
    }

    /// Everything received through the content channel so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Copy of the current slots
    pub fn snapshot(&self) -> PredictionSet {
        self.slots.clone()
    }

    /// Begin a new generation: K empty slots, empty reasoning, tag state reset
    pub fn start(&mut self) {
        self.slots = PredictionSet::empty(self.options.slot_count);
        self.content.clear();
        self.thinking.reset();
        self.reasoning_field_seen = false;
        self.frames = 0;
        self.state = DecoderState::Streaming;

        info!(slot_count = self.options.slot_count, "Prediction session started");
    }

    /// Apply one frame and return the resulting snapshot
    pub fn apply(&mut self, delta: &ChunkDelta) -> Result<PredictionSet> {
        if self.state != DecoderState::Streaming {
            return Err(PredictorError::InvalidState(format!(
                "cannot apply a frame in state {:?}",
                self.state
            )));
        }
        self.frames += 1;

        // Reasoning delivered as its own field bypasses the tag tracker
        if let Some(reasoning) = delta.reasoning_text() {
            self.thinking.append_reasoning(reasoning);
            self.reasoning_field_seen = true;
        }

        if let Some(content) = delta.content_text() {
            self.content.push_str(content);
            self.thinking.feed(content);

            let extracted = self.extractor.extract(&self.content, false);
            for (index, text) in extracted.into_iter().enumerate() {
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    self.slots.set_text(index, text);
                }
            }
        }

        self.slots.attach_reasoning(self.thinking.reasoning());

        debug!(
            frame = self.frames,
            content_len = self.content.len(),
            reasoning_len = self.thinking.reasoning().len(),
            "Applied stream frame"
        );

        Ok(self.slots.clone())
    }

    /// End the stream and return the final, stripped snapshot
    pub fn finish(&mut self) -> Result<PredictionSet> {
        if self.state != DecoderState::Streaming {
            return Err(PredictorError::InvalidState(format!(
                "cannot finish in state {:?}",
                self.state
            )));
        }
        self.state = DecoderState::Finalizing;

        self.thinking.finalize();
        let observed = if self.thinking.tag_seen() || self.reasoning_field_seen {
            Some(self.thinking.reasoning())
        } else {
            None
        };

        let final_set = Finalizer::new(self.extractor).finalize(&self.content, observed);
        self.slots = final_set.clone();
        self.state = DecoderState::Done;

        info!(
            frames = self.frames,
            content_len = self.content.len(),
            has_reasoning = final_set.reasoning().is_some(),
            "Prediction session finalized"
        );

        Ok(final_set)
    }

    /// Abandon the session after a failure. No further snapshots are produced.
    pub fn abort(&mut self) {
        self.state = DecoderState::Done;
    }
}

/// Decode a frame stream, invoking `on_update` with a full snapshot after every
/// frame and once more with the final snapshot.
///
/// A transport error ends the session without a final snapshot; the last
/// emitted snapshot is then incomplete.
pub async fn decode_stream<S, F>(
    frames: S,
    options: DecoderOptions,
    mut on_update: F,
) -> Result<PredictionSet>
where
    S: Stream<Item = Result<ChunkDelta>>,
    F: FnMut(PredictionSet),
{
    let mut decoder = PredictionDecoder::new(options);
    decoder.start();

    let mut frames = Box::pin(frames);
    while let Some(frame) = frames.next().await {
        let delta = match frame {
            Ok(delta) => delta,
            Err(e) => {
                error!("Prediction stream failed: {}", e);
                decoder.abort();
                return Err(e);
            }
        };

        let snapshot = decoder.apply(&delta)?;
        on_update(snapshot);
    }

    let final_set = decoder.finish()?;
    on_update(final_set.clone());

    Ok(final_set)
}
