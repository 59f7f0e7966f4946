//! Wire shapes for the two chat endpoints

use serde::{Deserialize, Deserializer, Serialize};

use crate::conversation::{HistoryEntry, Source};

pub const GENERAL_MESSAGE_PATH: &str = "/api/v1/chat/message";
pub const SELECTION_QUERY_PATH: &str = "/api/v1/chat/query_with_selection";

/// Whether the next question is scoped to a highlighted passage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Normal,
    SelectionScoped,
}

/// Which endpoint a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    GeneralMessage,
    SelectionQuery,
}

/// Body for the general-message endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralMessageRequest {
    pub message: String,
    pub selected_text: Option<String>,
    pub history: Vec<HistoryEntry>,
}

/// Body for the selection-scoped endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionQueryRequest {
    pub question: String,
    pub selected_text: String,
    pub history: Vec<HistoryEntry>,
}

/// A request ready to submit. Serializes as the bare body of its variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatRequest {
    General(GeneralMessageRequest),
    SelectionScoped(SelectionQueryRequest),
}

impl ChatRequest {
    pub fn general(
        message: impl Into<String>,
        selected_text: Option<String>,
        history: Vec<HistoryEntry>,
    ) -> Self {
        ChatRequest::General(GeneralMessageRequest {
            message: message.into(),
            selected_text,
            history,
        })
    }

    pub fn selection_scoped(
        question: impl Into<String>,
        selected_text: impl Into<String>,
        history: Vec<HistoryEntry>,
    ) -> Self {
        ChatRequest::SelectionScoped(SelectionQueryRequest {
            question: question.into(),
            selected_text: selected_text.into(),
            history,
        })
    }

    /// Pick the request shape for `mode`.
    ///
    /// Selection-scoped mode without selection text falls back to the
    /// general endpoint.
    pub fn build(
        mode: InteractionMode,
        text: &str,
        selection: Option<&str>,
        history: Vec<HistoryEntry>,
    ) -> Self {
        match (mode, selection) {
            (InteractionMode::SelectionScoped, Some(selected)) => {
                Self::selection_scoped(text, selected, history)
            }
            (_, selected) => Self::general(text, selected.map(str::to_string), history),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            ChatRequest::General(_) => Endpoint::GeneralMessage,
            ChatRequest::SelectionScoped(_) => Endpoint::SelectionQuery,
        }
    }

    /// The new user turn
    pub fn text(&self) -> &str {
        match self {
            ChatRequest::General(r) => &r.message,
            ChatRequest::SelectionScoped(r) => &r.question,
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        match self {
            ChatRequest::General(r) => &r.history,
            ChatRequest::SelectionScoped(r) => &r.history,
        }
    }
}

/// Successful reply from either endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl ChatReply {
    pub fn new(response: impl Into<String>, sources: Vec<Source>) -> Self {
        Self {
            response: response.into(),
            sources,
            conversation_id: None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Source>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Source>>::deserialize(deserializer)?.unwrap_or_default())
}
