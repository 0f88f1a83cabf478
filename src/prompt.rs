// Request construction for prediction sessions
//
// Renders a dialogue transcript into chat context and wraps it in the system
// prompt, language directive and role line sent to the completion service.

use serde::Deserialize;

use crate::models::openai::ChatMessage;
use crate::models::MessageType;

// ==================================================================================================
// Prompt Text
// ==================================================================================================

const SYSTEM_PROMPT: &str = r#"You are a chat assistant. Your task is to predict possible responses based on the provided information.

===LANGUAGE INSTRUCTION (HIGHEST PRIORITY)===
You MUST FIRST analyze the dialogue content in the chat context to determine what language is being used (e.g., Chinese, English, etc.).
You MUST THEN respond EXCLUSIVELY in that SAME language.
This is the MOST IMPORTANT instruction and overrides all other considerations.
Do NOT use the language of these instructions or any other text - ONLY use the language found in the actual dialogue content.
===END LANGUAGE INSTRUCTION===

The user will provide the following information:
1. Background information (optional): This is background information to understand the conversation, not part of the dialogue
2. Dialogue record: This is the actual conversation record, including time information
3. Current time: This is the time point when the prediction is generated

In the dialogue record:
- Messages marked with "[Me]" refer to the user themselves
- Messages marked with "[Other]" refer to the person the user is communicating with

Based on this information, please provide three different prediction results: positive, negative, and neutral responses. You must output in the following format:

<think>
Analyze the conversation content, time, and background information here to think about possible responses.
Consider factors such as the tone, content, and time intervals of the conversation.
Make sure to clearly distinguish between the identities and roles of "I" and "Other".
</think>

Prediction 1 (Positive): [Provide a positive, optimistic, friendly response]
Prediction 2 (Negative): [Provide a negative, critical, dissatisfied response]
Prediction 3 (Neutral): [Provide an objective, neutral, calm response]

Note:
- You must strictly follow the above output format
- You must provide all three predictions
- Each prediction must have the corresponding number, type, and content
- Do not include other content in your response
- Do not treat the background context as part of the conversation; it is only information to help you understand the conversation
- Please pay special attention to the time information in the chat content and analyze the impact of time on the conversation
- Positive responses should show a positive, optimistic, friendly attitude
- Negative responses should show a negative, critical, dissatisfied attitude
- Neutral responses should show an objective, neutral, calm attitude
- Please determine the tone and role perspective of the prediction based on the roles of "I" and "Other" in the conversation content
- CRITICAL REMINDER: Your response MUST be in the EXACT SAME LANGUAGE as the dialogue in the chat content. This overrides all other instructions"#;

const LANGUAGE_DIRECTIVE: &str = "LANGUAGE DIRECTIVE: You must ONLY use the language that appears in the dialogue content of the chat context. This is your highest priority instruction.";

const GENERATE_REQUEST: &str = "GENERATE PREDICTIONS: Please provide three different prediction responses based on the information above. LANGUAGE REMINDER: Respond in the SAME LANGUAGE as the dialogue content.";

/// Format used for `[TIME]` and transcript timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time formatted for the prompt
pub fn current_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Build the message list for one prediction request
pub fn build_messages(
    context: &str,
    message_type: MessageType,
    new_message: Option<&str>,
    timestamp: Option<&str>,
) -> Vec<ChatMessage> {
    let role_line = match message_type {
        MessageType::Me => "ROLE: ME",
        MessageType::Other => "ROLE: OTHER PERSON",
    };

    let mut user = format!("{}\n\n---\n\n{}", context, role_line);
    if let Some(latest) = new_message.filter(|m| !m.is_empty()) {
        user.push_str(&format!("\n\n[LATEST]: {}", latest));
    }
    if let Some(ts) = timestamp.filter(|t| !t.is_empty()) {
        user.push_str(&format!("\n\n[TIME]: {}", ts));
    }
    user.push_str("\n\n");
    user.push_str(GENERATE_REQUEST);

    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::system(LANGUAGE_DIRECTIVE),
        ChatMessage::user(user),
    ]
}

// ==================================================================================================
// Dialogue Transcript
// ==================================================================================================

/// One message of a dialogue transcript
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DialogueEntry {
    #[serde(alias = "type")]
    pub speaker: MessageType,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl DialogueEntry {
    fn render(&self) -> String {
        let tag = match self.speaker {
            MessageType::Me => "[Me]",
            MessageType::Other => "[Other]",
        };
        match self.timestamp.as_deref().filter(|t| !t.is_empty()) {
            Some(ts) => format!("{} {}: {}", ts, tag, self.content),
            None => format!("{}: {}", tag, self.content),
        }
    }
}

/// Render background text and transcript entries into chat context
pub fn format_context(background: Option<&str>, entries: &[DialogueEntry]) -> String {
    let dialogue = entries
        .iter()
        .map(DialogueEntry::render)
        .collect::<Vec<_>>()
        .join("\n");

    with_background(background, &dialogue)
}

/// Interpret raw context input: a JSON array of transcript entries, or plain text
pub fn parse_context(raw: &str, background: Option<&str>) -> String {
    match serde_json::from_str::<Vec<DialogueEntry>>(raw.trim()) {
        Ok(entries) => {
            tracing::debug!(entries = entries.len(), "Parsed dialogue transcript");
            format_context(background, &entries)
        }
        Err(_) => match background.filter(|b| !b.trim().is_empty()) {
            Some(bg) => format!("# Background Information\n{}\n\n{}", bg, raw.trim()),
            None => raw.trim().to_string(),
        },
    }
}

fn with_background(background: Option<&str>, dialogue: &str) -> String {
    match background.filter(|b| !b.trim().is_empty()) {
        Some(bg) => format!(
            "# Background Information\n{}\n\n# Dialogue Record\n{}",
            bg, dialogue
        ),
        None => format!("# Dialogue Record\n{}", dialogue),
    }
}
