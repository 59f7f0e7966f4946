//! docsite-assist: contextual assistant engine for documentation sites
//!
//! This library provides:
//! - Selection observer with debounce, length filtering and auto-expiry
//! - Floating "Ask AI" affordance positioning
//! - Append-only conversation state
//! - Dispatch client for the general and selection-scoped chat endpoints
//! - Panel controller with a persisted color mode
//! - A `Widget` composing all of the above, plus an async driver

pub mod affordance;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod panel;
pub mod render;
pub mod selection;
pub mod timer;
pub mod widget;

pub use config::AssistConfig;
pub use dispatch::{ChatBackend, DispatchClient};
pub use widget::{Widget, WidgetDriver, WidgetEvent};
