use serde::{Deserialize, Serialize};

// ==================================================================================================
// Prediction slots
// ==================================================================================================

/// One positional element of a prediction result.
///
/// `text` is the human-readable reply. While a stream is in flight it may be a
/// partial prefix of the eventual text. `reasoning` is only ever set on slot 0;
/// [`PredictionSet`] is the only place that can attach it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PredictionSlot {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning: Option<String>,
}

impl PredictionSlot {
    /// A slot with text and no reasoning
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reasoning: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Fixed-length, positional set of prediction slots.
///
/// Position 0 is conventionally "positive", 1 "negative" and 2 "neutral", but
/// slots are filled by the ordinal declared in each label, not by appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PredictionSet {
    slots: Vec<PredictionSlot>,
}

impl PredictionSet {
    /// K empty slots
    pub fn empty(slot_count: usize) -> Self {
        Self {
            slots: vec![PredictionSlot::default(); slot_count],
        }
    }

    /// Build a set from plain texts. The length of `texts` becomes K.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: texts.into_iter().map(PredictionSlot::plain).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[PredictionSlot] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&PredictionSlot> {
        self.slots.get(index)
    }

    /// Texts of all slots, in position order
    pub fn texts(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.text()).collect()
    }

    /// Reasoning attached to slot 0, if any
    pub fn reasoning(&self) -> Option<&str> {
        self.slots.first().and_then(|s| s.reasoning())
    }

    /// Overwrite the text of one slot. Out-of-range indices are ignored.
    pub fn set_text(&mut self, index: usize, text: impl Into<String>) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.text = text.into();
        }
    }

    /// Attach reasoning to slot 0. Empty reasoning is ignored.
    pub fn attach_reasoning(&mut self, reasoning: &str) {
        if reasoning.is_empty() {
            return;
        }
        if let Some(first) = self.slots.first_mut() {
            first.reasoning = Some(reasoning.to_string());
        }
    }

    /// Apply `f` to every slot's text, leaving reasoning untouched
    pub fn map_texts<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        Self {
            slots: self
                .slots
                .iter()
                .map(|slot| PredictionSlot {
                    text: f(&slot.text),
                    reasoning: slot.reasoning.clone(),
                })
                .collect(),
        }
    }
}

// ==================================================================================================
// Languages
// ==================================================================================================

/// Display locale of the caller. Only used for placeholder text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    /// Placeholder shown for a slot that never received a label match
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Locale::En => format!("[Failed to generate prediction {}]", position),
            Locale::Zh => format!("[无法生成预测 {}]", position),
        }
    }
}

/// Language of the `Prediction N` / `预测N` labels in a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelLanguage {
    #[default]
    English,
    Chinese,
}

impl LabelLanguage {
    /// The language tried when this one yields no matches
    pub fn other(&self) -> Self {
        match self {
            LabelLanguage::English => LabelLanguage::Chinese,
            LabelLanguage::Chinese => LabelLanguage::English,
        }
    }
}

/// Whose reply is being predicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// The user's own next reply
    #[serde(rename = "self")]
    Me,
    /// The other participant's next reply
    #[default]
    Other,
}
