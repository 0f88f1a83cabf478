// Finalization of a decoded response
//
// Re-parses the complete text with placeholders enabled, strips labels and one
// layer of outer quotes from every slot and attaches reasoning to slot 0.

use tracing::debug;

use crate::extractor::{SectionExtractor, LEADING_LABEL};
use crate::models::PredictionSet;
use crate::thinking_parser::extract_reasoning_block;

/// Remove a leading "Prediction N (Category):" / "预测N (类别):" label
pub fn strip_label(text: &str) -> &str {
    let text = text.trim();
    match LEADING_LABEL.captures(text).and_then(|caps| caps.get(1)) {
        Some(rest) => rest.as_str().trim(),
        None => text,
    }
}

/// Remove exactly one matching pair of straight quotes around the whole text
pub fn remove_outer_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Label stripping followed by quote stripping
pub fn clean_prediction_text(text: &str) -> String {
    remove_outer_quotes(strip_label(text)).to_string()
}

/// Produces the terminal snapshot of a session
#[derive(Debug, Clone, Copy)]
pub struct Finalizer {
    extractor: SectionExtractor,
}

impl Finalizer {
    pub fn new(extractor: SectionExtractor) -> Self {
        Self { extractor }
    }

    /// Build the final prediction set from the complete response text.
    ///
    /// `reasoning` is what the stream delivered through tags or a reasoning
    /// field; `None` means nothing was observed, in which case a tag-free
    /// "Reasoning Process:" block is looked up in `content` instead.
    pub fn finalize(&self, content: &str, reasoning: Option<&str>) -> PredictionSet {
        let slots = self.extractor.extract(content, true);
        let mut set = PredictionSet::from_texts(
            slots
                .iter()
                .map(|slot| clean_prediction_text(slot.as_deref().unwrap_or_default())),
        );

        let reasoning = match reasoning {
            Some(observed) => Some(observed.to_string()),
            None => extract_reasoning_block(content),
        };
        if let Some(reasoning) = reasoning {
            debug!(reasoning_len = reasoning.len(), "Attaching reasoning to first slot");
            set.attach_reasoning(&reasoning);
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabelLanguage, Locale};
    use proptest::prelude::*;

    fn finalizer(k: usize) -> Finalizer {
        Finalizer::new(SectionExtractor::new(k, LabelLanguage::English, Locale::En))
    }

    #[test]
    fn test_strip_label() {
        assert_eq!(strip_label("Prediction 1 (Positive): Sure!"), "Sure!");
        assert_eq!(strip_label("Prediction 2: nope"), "nope");
        assert_eq!(strip_label("预测3 (中立): 随便"), "随便");
        assert_eq!(strip_label("  plain text  "), "plain text");
        assert_eq!(strip_label("Prediction 1:"), "Prediction 1:");
    }

    #[test]
    fn test_remove_outer_quotes() {
        assert_eq!(remove_outer_quotes("\"hello\""), "hello");
        assert_eq!(remove_outer_quotes("'hello'"), "hello");
        assert_eq!(remove_outer_quotes("\"\"nested\"\""), "\"nested\"");
        assert_eq!(remove_outer_quotes("\"mismatched'"), "\"mismatched'");
        assert_eq!(remove_outer_quotes("\""), "\"");
        assert_eq!(remove_outer_quotes("\"\""), "");
        assert_eq!(remove_outer_quotes("no quotes"), "no quotes");
    }

    #[test]
    fn test_clean_prediction_text_order() {
        // Label first, then quotes
        assert_eq!(
            clean_prediction_text("Prediction 1 (Positive): \"Sure!\""),
            "Sure!"
        );
        // A quoted label is not a label
        assert_eq!(
            clean_prediction_text("\"Prediction 1: hi\""),
            "Prediction 1: hi"
        );
    }

    #[test]
    fn test_finalize_orders_and_strips() {
        let text = "Prediction 2 (Negative): \"No way.\"\nPrediction 1 (Positive): 'Sure!'\nPrediction 3 (Neutral): Maybe.";
        let set = finalizer(3).finalize(text, None);

        assert_eq!(set.texts(), vec!["Sure!", "No way.", "Maybe."]);
        assert!(set.reasoning().is_none());
    }

    #[test]
    fn test_finalize_placeholder_for_missing_slot() {
        let set = finalizer(3).finalize("Prediction 1: a\nPrediction 2: b", None);

        assert_eq!(set.len(), 3);
        assert_eq!(set.texts()[2], "[Failed to generate prediction 3]");
    }

    #[test]
    fn test_finalize_attaches_observed_reasoning() {
        let set = finalizer(2).finalize("Prediction 1: a\nPrediction 2: b", Some("thinking"));

        assert_eq!(set.reasoning(), Some("thinking"));
        assert_eq!(set.get(1).unwrap().reasoning(), None);
    }

    #[test]
    fn test_finalize_scans_tag_free_reasoning() {
        let text = "Reasoning Process: they seem busy.\nPrediction 1: Later then.";
        let set = finalizer(1).finalize(text, None);

        assert_eq!(set.texts(), vec!["Later then."]);
        assert_eq!(set.reasoning(), Some("they seem busy."));
    }

    #[test]
    fn test_observed_empty_reasoning_skips_scan() {
        let text = "Reasoning Process: ignored\nPrediction 1: ok";
        let set = finalizer(1).finalize(text, Some(""));
        assert!(set.reasoning().is_none());
    }

    proptest! {
        #[test]
        fn prop_one_quote_pair_round_trips(text in "\\PC*") {
            for quote in ['"', '\''] {
                let wrapped = format!("{}{}{}", quote, text, quote);
                prop_assert_eq!(remove_outer_quotes(&wrapped), text.as_str());
            }
        }

        #[test]
        fn prop_mismatched_quotes_unchanged(text in "\\PC*") {
            let wrapped = format!("\"{}'", text);
            prop_assert_eq!(remove_outer_quotes(&wrapped), wrapped.as_str());
        }
    }
}
