// Dual-language section extractor
//
// Finds "Prediction N (Category): ..." / "预测N (类别): ..." sections in a block
// of text and places each by its declared ordinal.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::models::{LabelLanguage, Locale};
use crate::thinking_parser::strip_think_spans;

// ==================================================================================================
// Label patterns
// ==================================================================================================

/// Ordinal, optional parenthetical category, colon
static ENGLISH_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Prediction\s*(\d+)(?:\s*[(（]\s*(?:Positive|Negative|Neutral)\s*[)）])?\s*[:：]\s*",
    )
    .unwrap()
});

static ENGLISH_TERMINATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"Prediction\s*\d+").unwrap());

static CHINESE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"预测\s*(\d+)(?:\s*[(（]\s*(?:正向|负向|中立)\s*[)）])?\s*[:：]\s*").unwrap()
});

static CHINESE_TERMINATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"预测\s*\d+").unwrap());

/// Label at the very start of a text, either language, with the remainder captured
pub(crate) static LEADING_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)^(?:预测\s*\d+(?:\s*[(（]\s*(?:正向|负向|中立)\s*[)）])?|Prediction\s*\d+(?:\s*[(（]\s*(?:Positive|Negative|Neutral)\s*[)）])?)\s*[:：]\s*(.+)$",
    )
    .unwrap()
});

fn patterns(language: LabelLanguage) -> (&'static Regex, &'static Regex) {
    match language {
        LabelLanguage::English => (&ENGLISH_LABEL, &ENGLISH_TERMINATOR),
        LabelLanguage::Chinese => (&CHINESE_LABEL, &CHINESE_TERMINATOR),
    }
}

// ==================================================================================================
// Extraction
// ==================================================================================================

/// Extracts labeled sections into K positional slots
#[derive(Debug, Clone, Copy)]
pub struct SectionExtractor {
    slot_count: usize,
    primary: LabelLanguage,
    locale: Locale,
}

impl SectionExtractor {
    pub fn new(slot_count: usize, primary: LabelLanguage, locale: Locale) -> Self {
        Self {
            slot_count,
            primary,
            locale,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Extract K slots from `text`.
    ///
    /// Reasoning spans are removed before scanning. The primary label language
    /// is tried first and the other one only if the primary finds no label at
    /// all. In final mode every unmatched slot gets the locale's placeholder;
    /// otherwise it stays `None`.
    pub fn extract(&self, text: &str, final_mode: bool) -> Vec<Option<String>> {
        let cleaned = strip_think_spans(text);

        let mut slots = match self.scan(&cleaned, self.primary) {
            Some(slots) => slots,
            None => {
                let fallback = self.primary.other();
                debug!(language = ?fallback, "No primary labels found, trying fallback language");
                self.scan(&cleaned, fallback)
                    .unwrap_or_else(|| vec![None; self.slot_count])
            }
        };

        if final_mode {
            for (i, slot) in slots.iter_mut().enumerate() {
                if slot.is_none() {
                    debug!(position = i + 1, "No section found, using placeholder");
                    *slot = Some(self.locale.placeholder(i + 1));
                }
            }
        }

        slots
    }

    /// Scan with one language. Returns `None` when no label matched at all.
    fn scan(&self, text: &str, language: LabelLanguage) -> Option<Vec<Option<String>>> {
        let (label, terminator) = patterns(language);
        let mut slots = vec![None; self.slot_count];
        let mut matched = false;
        let mut pos = 0;

        while let Some(caps) = label.captures_at(text, pos) {
            matched = true;

            let Some(whole) = caps.get(0) else {
                break;
            };
            let content_start = whole.end();
            let content_end = terminator
                .find_at(text, content_start)
                .map(|m| m.start())
                .unwrap_or(text.len());

            let content = text[content_start..content_end].trim();
            let ordinal = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok());

            match ordinal {
                Some(n) if n >= 1 && n <= self.slot_count => {
                    if !content.is_empty() {
                        slots[n - 1] = Some(content.to_string());
                    }
                }
                _ => debug!(ordinal = ?ordinal, "Dropping out-of-range section"),
            }

            pos = content_end;
        }

        matched.then_some(slots)
    }
}
