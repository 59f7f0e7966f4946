//! Floating "Ask AI" affordance
//!
//! Computes fixed-position coordinates for the button shown above a
//! selection and for the input popover that replaces it once clicked.
//! Positions are captured once, in scroll-adjusted page pixels, and are not
//! re-tracked when the page scrolls afterwards.

use serde::{Deserialize, Serialize};

use crate::selection::Selection;

/// Characters of the selection quoted in the popover placeholder
const PLACEHOLDER_QUOTE_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Horizontal edge of the selection the button lines up with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "edge")]
pub enum Anchor {
    Left,
    Right { inset: f64 },
}

impl Default for Anchor {
    fn default() -> Self {
        Self::Left
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffordanceLayout {
    /// Distance of the button above the selection's top edge
    pub button_offset_y: f64,
    /// Distance of the popover below the button
    pub popover_offset_y: f64,
    pub anchor: Anchor,
}

impl Default for AffordanceLayout {
    fn default() -> Self {
        Self {
            button_offset_y: 40.0,
            popover_offset_y: 40.0,
            anchor: Anchor::Left,
        }
    }
}

impl AffordanceLayout {
    pub fn button_position(&self, selection: &Selection) -> Point {
        let rect = selection.rect();
        let scroll = selection.scroll();
        let x = match self.anchor {
            Anchor::Left => rect.left,
            Anchor::Right { inset } => rect.right() - inset,
        };
        Point::new(x + scroll.x, rect.top + scroll.y - self.button_offset_y)
    }

    pub fn popover_position(&self, button: Point) -> Point {
        Point::new(button.x, button.y + self.popover_offset_y)
    }
}

/// What the affordance currently shows
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Affordance {
    #[default]
    Hidden,
    Button {
        at: Point,
    },
    Popover {
        button_at: Point,
        at: Point,
        draft: String,
    },
}

/// Owns the affordance state machine: Hidden -> Button -> Popover -> Hidden
#[derive(Debug, Default)]
pub struct AffordancePositioner {
    layout: AffordanceLayout,
    state: Affordance,
}

impl AffordancePositioner {
    pub fn new(layout: AffordanceLayout) -> Self {
        Self {
            layout,
            state: Affordance::Hidden,
        }
    }

    pub fn state(&self) -> &Affordance {
        &self.state
    }

    /// Show the button for a freshly accepted selection. Any open popover is
    /// replaced.
    pub fn show_for(&mut self, selection: &Selection) -> Point {
        let at = self.layout.button_position(selection);
        self.state = Affordance::Button { at };
        at
    }

    /// Button click: swap the button for the popover.
    ///
    /// Returns the popover position, or `None` when no button was showing.
    pub fn activate(&mut self) -> Option<Point> {
        let Affordance::Button { at } = self.state else {
            return None;
        };
        let popover_at = self.layout.popover_position(at);
        self.state = Affordance::Popover {
            button_at: at,
            at: popover_at,
            draft: String::new(),
        };
        Some(popover_at)
    }

    pub fn hide(&mut self) {
        self.state = Affordance::Hidden;
    }

    pub fn is_popover_open(&self) -> bool {
        matches!(self.state, Affordance::Popover { .. })
    }

    pub fn draft(&self) -> Option<&str> {
        match &self.state {
            Affordance::Popover { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Replace the popover draft. Ignored when the popover is closed.
    pub fn set_draft(&mut self, text: impl Into<String>) -> bool {
        match &mut self.state {
            Affordance::Popover { draft, .. } => {
                *draft = text.into();
                true
            }
            _ => false,
        }
    }
}

/// Placeholder for the popover input, quoting the start of the selection
pub fn popover_placeholder(selection_text: &str) -> String {
    format!("Ask about: \"{}\"", truncate_chars(selection_text, PLACEHOLDER_QUOTE_CHARS))
}

/// First `max` characters, with "..." appended when something was cut
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
