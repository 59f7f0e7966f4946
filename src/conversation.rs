//! Conversation state - append-only message log and the loading flags

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label shown for a source with no `source_file`
pub const UNKNOWN_SOURCE_LABEL: &str = "Unknown source";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Role string used in request history
    pub fn role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

/// Backend-provided citation, kept verbatim
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source(serde_json::Map<String, serde_json::Value>);

impl Source {
    /// Convenience for the common `{ "source_file": ... }` shape
    pub fn from_file(path: impl Into<String>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("source_file".to_string(), path.into().into());
        Self(fields)
    }

    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    pub fn label(&self) -> &str {
        self.0
            .get("source_file")
            .and_then(|v| v.as_str())
            .unwrap_or(UNKNOWN_SOURCE_LABEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// A message in the log. Fields are private; a message never changes once
/// appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    id: MessageId,
    text: String,
    sender: Sender,
    sources: Vec<Source>,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One prior turn as sent to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

/// Ordered message log plus the in-flight flags
#[derive(Debug, Default)]
pub struct ConversationState {
    messages: Vec<Message>,
    next_id: u64,
    loading: bool,
    typing: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message; the only way the log changes.
    pub fn append(
        &mut self,
        sender: Sender,
        text: impl Into<String>,
        sources: Vec<Source>,
    ) -> &Message {
        self.next_id += 1;
        self.messages.push(Message {
            id: MessageId(self.next_id),
            text: text.into(),
            sender,
            sources,
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// Idle -> Sending
    pub fn begin_turn(&mut self) {
        self.loading = true;
        self.typing = true;
    }

    /// Sending -> Idle
    pub fn finish_turn(&mut self) {
        self.loading = false;
        self.typing = false;
    }

    /// Every message so far, oldest first, as role/content pairs
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages
            .iter()
            .map(|m| HistoryEntry {
                role: m.sender.role().to_string(),
                content: m.text.clone(),
            })
            .collect()
    }
}
