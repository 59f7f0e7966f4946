//! Widget renderers
//!
//! Defines the interface a host implements to display the widget, plus a
//! plain-text renderer that prints the conversation as a transcript.

use anyhow::Result;
use std::io::Write;

use crate::conversation::{MessageId, Sender};
use crate::widget::{AffordanceView, WidgetEffect, WidgetView};

/// Trait that every host surface implements
pub trait WidgetRenderer {
    /// Display the current state. Called after every processed update.
    fn render(&mut self, view: &WidgetView) -> Result<()>;

    /// Carry out a one-shot effect (focus, scroll).
    fn apply(&mut self, effect: WidgetEffect) -> Result<()>;
}

/// Writes new messages and visibility changes as lines of text.
///
/// Only changes are printed, so rendering after every update produces a
/// readable transcript.
pub struct TextRenderer<W: Write> {
    out: W,
    last_message: Option<MessageId>,
    typing: bool,
    affordance: String,
    panel_open: Option<bool>,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_message: None,
            typing: false,
            affordance: String::new(),
            panel_open: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> WidgetRenderer for TextRenderer<W> {
    fn render(&mut self, view: &WidgetView) -> Result<()> {
        let affordance = match &view.affordance {
            AffordanceView::Hidden => String::new(),
            AffordanceView::Button { at, label } => {
                format!("[{}] at ({:.0}, {:.0})", label, at.x, at.y)
            }
            AffordanceView::Popover {
                at, placeholder, ..
            } => format!("[{}] at ({:.0}, {:.0})", placeholder, at.x, at.y),
        };
        if affordance != self.affordance {
            if !affordance.is_empty() {
                writeln!(self.out, "{}", affordance)?;
            }
            self.affordance = affordance;
        }

        let open = view.panel.is_some();
        if self.panel_open != Some(open) {
            match &view.panel {
                Some(panel) => {
                    writeln!(self.out, "== {} ({}) ==", panel.title, view.color_mode)?;
                    if let Some(welcome) = &panel.welcome {
                        for line in &welcome.lines {
                            writeln!(self.out, "{}", line)?;
                        }
                        if let Some(preview) = &welcome.context_preview {
                            writeln!(self.out, "Context: \"{}\"", preview)?;
                        }
                    }
                }
                None if self.panel_open.is_some() => writeln!(self.out, "== panel closed ==")?,
                None => {}
            }
            self.panel_open = Some(open);
        }

        let Some(panel) = &view.panel else {
            return Ok(());
        };

        for message in &panel.messages {
            if Some(message.id) <= self.last_message {
                continue;
            }
            let who = match message.sender {
                Sender::User => "you",
                Sender::Assistant => "assistant",
            };
            writeln!(self.out, "{}> {}", who, message.text)?;
            if !message.sources.is_empty() {
                writeln!(self.out, "  Sources:")?;
                for source in &message.sources {
                    writeln!(self.out, "  - {}", source)?;
                }
            }
            self.last_message = Some(message.id);
        }

        if panel.typing && !self.typing {
            writeln!(self.out, "assistant is typing...")?;
        }
        self.typing = panel.typing;

        self.out.flush()?;
        Ok(())
    }

    fn apply(&mut self, effect: WidgetEffect) -> Result<()> {
        tracing::trace!(?effect, "text renderer ignoring effect");
        Ok(())
    }
}
