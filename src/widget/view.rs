//! Render model handed to the host after every update

use serde::Serialize;

use crate::affordance::Point;
use crate::conversation::{MessageId, Sender};
use crate::panel::ColorMode;

pub const WELCOME_LINES: [&str; 2] = [
    "Hello! I'm your Physical AI & Humanoid Robotics textbook assistant.",
    "Ask me anything about the content in your textbook, and I'll help you find relevant information.",
];

pub const ASK_AI_LABEL: &str = "Ask AI";
pub const MODE_INDICATOR_LABEL: &str = "Selected text mode";
pub const SCOPED_INPUT_PLACEHOLDER: &str = "Ask about the selected text...";
pub const GENERAL_INPUT_PLACEHOLDER: &str = "Ask a question about the textbook...";

/// Characters of the selection shown in the welcome context preview
pub const CONTEXT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetView {
    pub color_mode: ColorMode,
    pub affordance: AffordanceView,
    /// `None` while closed; the host shows only the launcher then
    pub panel: Option<PanelView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AffordanceView {
    Hidden,
    Button {
        at: Point,
        label: &'static str,
    },
    Popover {
        at: Point,
        draft: String,
        placeholder: String,
        can_send: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelView {
    pub title: String,
    /// Set while answering is scoped to a selection; the host shows a clear button
    pub mode_indicator: Option<&'static str>,
    /// Shown instead of messages while the log is empty
    pub welcome: Option<WelcomeView>,
    pub messages: Vec<MessageView>,
    pub typing: bool,
    pub input: InputView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WelcomeView {
    pub lines: Vec<&'static str>,
    pub context_preview: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    /// Source labels; always empty for user messages
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputView {
    pub draft: String,
    pub placeholder: &'static str,
    pub disabled: bool,
    pub can_send: bool,
}
