//! Widget Events
//!
//! Host input flowing into the widget, and one-shot effects flowing back out.

use crate::selection::{ScrollOffset, SelectionSnapshot, SelectionTrigger};

/// Events reported by the host page
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    // ========== Page Selection ==========
    /// `pointerup`, `keyup` or `selectionchange` with the selection read at that moment
    Selection {
        trigger: SelectionTrigger,
        snapshot: SelectionSnapshot,
        scroll: ScrollOffset,
    },

    /// The mode indicator's clear button
    SelectionCleared,

    // ========== Affordance ==========
    /// The floating "Ask AI" button was clicked
    AskAiClicked,

    /// The popover input changed
    PopoverInput(String),

    /// Enter or Send in the popover
    PopoverSubmitted,

    /// Cancel in the popover
    PopoverCancelled,

    // ========== Panel ==========
    /// Launcher or close button
    PanelToggled,

    /// The panel input changed
    PanelInput(String),

    /// Enter or Send in the panel
    PanelSubmitted,

    ColorModeToggled,

    /// Stop the driver
    Shutdown,
}

/// Imperative work the host performs on the engine's behalf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetEffect {
    /// Focus the panel's input box
    FocusPanelInput,
    /// Focus the popover's input box
    FocusAskInput,
    /// Scroll the message list to its newest entry
    ScrollToBottom,
}
