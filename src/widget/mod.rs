//! Widget - composes the selection observer, affordance, conversation and
//! panel into one event-driven engine.
//!
//! ## Architecture
//!
//! - **Widget**: single owner of every state slice; each slice is written only
//!   through the widget's entry points
//! - **WidgetEvent**: host input (selection reports, clicks, typing)
//! - **WidgetEffect**: one-shot work for the host (focus, scroll)
//! - **WidgetView**: render model rebuilt after each update
//! - **WidgetDriver**: async loop interleaving events, timers and responses
//!
//! Sending is split into `begin_send` and `complete_send` so other events can
//! be processed while a request is in flight. At most one request is in
//! flight at a time.

mod driver;
mod events;
mod view;

use std::time::{Duration, Instant};

pub use driver::{channel, WidgetDriver};
pub use events::{WidgetEffect, WidgetEvent};
pub use view::{
    AffordanceView, InputView, MessageView, PanelView, WelcomeView, WidgetView, ASK_AI_LABEL,
    CONTEXT_PREVIEW_CHARS, GENERAL_INPUT_PLACEHOLDER, MODE_INDICATOR_LABEL,
    SCOPED_INPUT_PLACEHOLDER, WELCOME_LINES,
};

use crate::affordance::{popover_placeholder, truncate_chars, Affordance, AffordancePositioner};
use crate::config::AssistConfig;
use crate::conversation::{ConversationState, Sender};
use crate::dispatch::{
    assistant_reply, ChatRequest, DispatchClient, DispatchResult, Endpoint, InteractionMode,
};
use crate::panel::{PanelController, PreferenceStore};
use crate::selection::{
    ScrollOffset, SelectionChange, SelectionId, SelectionObserver, SelectionSnapshot,
    SelectionTrigger,
};
use crate::timer::{earliest, TimerSlot};

/// A request that has been recorded in the log and must now be submitted.
/// Its result goes back through `Widget::complete_send` with the same ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSend {
    pub ticket: u64,
    pub request: ChatRequest,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: u64,
    /// Selection the request was scoped to, cleared on completion
    consumed: Option<SelectionId>,
}

pub struct Widget {
    title: String,
    selection: SelectionObserver,
    affordance: AffordancePositioner,
    conversation: ConversationState,
    panel: PanelController,
    mode: InteractionMode,
    panel_draft: String,
    focus_delay: Duration,
    ask_focus_timer: TimerSlot,
    in_flight: Option<InFlight>,
    next_ticket: u64,
    effects: Vec<WidgetEffect>,
}

impl Widget {
    pub fn new(
        config: &AssistConfig,
        store: Box<dyn PreferenceStore>,
        os_prefers_dark: Option<bool>,
    ) -> Self {
        let selection = SelectionObserver::new(
            config.selection.bounds(),
            config.selection.debounce(),
            config.selection.expiry(),
        );
        let panel = PanelController::new(
            store,
            config.panel.color_mode_key.clone(),
            os_prefers_dark,
            config.panel.focus_delay(),
        )
        .with_open(config.panel.initially_open);

        Self {
            title: config.panel.title.clone(),
            selection,
            affordance: AffordancePositioner::new(config.affordance),
            conversation: ConversationState::new(),
            panel,
            mode: InteractionMode::Normal,
            panel_draft: String::new(),
            focus_delay: config.panel.focus_delay(),
            ask_focus_timer: TimerSlot::new(),
            in_flight: None,
            next_ticket: 0,
            effects: Vec::new(),
        }
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn selection(&self) -> &SelectionObserver {
        &self.selection
    }

    pub fn affordance(&self) -> &Affordance {
        self.affordance.state()
    }

    pub fn panel(&self) -> &PanelController {
        &self.panel
    }

    pub fn panel_draft(&self) -> &str {
        &self.panel_draft
    }

    pub fn is_loading(&self) -> bool {
        self.conversation.is_loading()
    }

    /// Drain effects produced since the last call
    pub fn take_effects(&mut self) -> Vec<WidgetEffect> {
        std::mem::take(&mut self.effects)
    }

    // ========== Selection ==========

    pub fn observe_selection(
        &mut self,
        trigger: SelectionTrigger,
        snapshot: SelectionSnapshot,
        scroll: ScrollOffset,
        now: Instant,
    ) {
        if let Some(change) = self.selection.observe(trigger, snapshot, scroll, now) {
            self.apply_selection_change(change);
        }
    }

    /// The mode indicator's clear button
    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.reset_to_normal();
    }

    fn apply_selection_change(&mut self, change: SelectionChange) {
        match change {
            SelectionChange::Activated(selection) => {
                self.mode = InteractionMode::SelectionScoped;
                self.affordance.show_for(&selection);
                self.ask_focus_timer.cancel();
            }
            SelectionChange::Invalidated { .. } | SelectionChange::Expired { .. } => {
                self.reset_to_normal();
            }
        }
    }

    fn reset_to_normal(&mut self) {
        self.mode = InteractionMode::Normal;
        self.affordance.hide();
        self.ask_focus_timer.cancel();
    }

    // ========== Timers ==========

    /// Run every timer due at `now`
    pub fn tick(&mut self, now: Instant) {
        if let Some(change) = self.selection.tick(now) {
            self.apply_selection_change(change);
        }
        if self.panel.focus_due(now) {
            self.effects.push(WidgetEffect::FocusPanelInput);
        }
        if self.ask_focus_timer.fire_if_due(now) && self.affordance.is_popover_open() {
            self.effects.push(WidgetEffect::FocusAskInput);
        }
    }

    /// When `tick` next needs to run
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.selection.next_deadline(),
            self.panel.next_deadline(),
            self.ask_focus_timer.deadline(),
        ])
    }

    // ========== Affordance ==========

    /// Swap the Ask AI button for the popover and schedule its focus
    pub fn click_ask_ai(&mut self, now: Instant) -> bool {
        if self.selection.active().is_none() || self.affordance.activate().is_none() {
            return false;
        }
        self.selection.pin();
        self.ask_focus_timer.schedule(now, self.focus_delay);
        true
    }

    /// Hide the popover. The selection stays active but can expire or be
    /// invalidated again.
    pub fn cancel_popover(&mut self, now: Instant) {
        self.affordance.hide();
        self.ask_focus_timer.cancel();
        self.selection.unpin(now);
    }

    pub fn set_popover_draft(&mut self, text: impl Into<String>) -> bool {
        self.affordance.set_draft(text)
    }

    /// Send the popover draft scoped to the active selection
    pub fn submit_popover(&mut self) -> Option<PendingSend> {
        let draft = self.affordance.draft()?.trim().to_string();
        if draft.is_empty() || self.selection.active().is_none() {
            return None;
        }

        let pending = self.begin_send(&draft)?;
        self.affordance.hide();
        self.ask_focus_timer.cancel();
        Some(pending)
    }

    // ========== Panel ==========

    pub fn toggle_panel(&mut self, now: Instant) -> bool {
        self.panel.toggle(now)
    }

    pub fn toggle_color_mode(&mut self) {
        self.panel.toggle_color_mode();
    }

    pub fn set_panel_draft(&mut self, text: impl Into<String>) {
        self.panel_draft = text.into();
    }

    /// Send the panel draft; the draft is kept if nothing was sent
    pub fn submit_panel(&mut self) -> Option<PendingSend> {
        let draft = self.panel_draft.clone();
        let pending = self.begin_send(&draft)?;
        self.panel_draft.clear();
        Some(pending)
    }

    // ========== Sending ==========

    /// Record a user turn and build its request.
    ///
    /// Returns `None`, changing nothing, when the trimmed text is empty or a
    /// request is already in flight.
    pub fn begin_send(&mut self, text: &str) -> Option<PendingSend> {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!("ignoring empty message");
            return None;
        }
        if self.conversation.is_loading() {
            tracing::debug!("ignoring send while a request is in flight");
            return None;
        }

        let history = self.conversation.history();
        let selected = self
            .selection
            .active()
            .map(|s| (s.id(), s.text().to_string()));
        let request = ChatRequest::build(
            self.mode,
            text,
            selected.as_ref().map(|(_, text)| text.as_str()),
            history,
        );

        let consumed = match request.endpoint() {
            Endpoint::SelectionQuery => {
                self.selection.pin();
                selected.map(|(id, _)| id)
            }
            Endpoint::GeneralMessage => None,
        };

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight = Some(InFlight { ticket, consumed });

        self.conversation.append(Sender::User, text, Vec::new());
        self.conversation.begin_turn();
        self.effects.push(WidgetEffect::ScrollToBottom);

        tracing::info!(ticket, endpoint = ?request.endpoint(), "message submitted");
        Some(PendingSend { ticket, request })
    }

    /// Turn a finished request into an assistant message and return to idle.
    ///
    /// Results for unknown tickets are dropped. Returns whether the result
    /// was applied.
    pub fn complete_send(&mut self, ticket: u64, result: DispatchResult, now: Instant) -> bool {
        let in_flight = match self.in_flight {
            Some(in_flight) if in_flight.ticket == ticket => in_flight,
            _ => {
                tracing::warn!(ticket, "dropping result for a request that is not in flight");
                return false;
            }
        };
        self.in_flight = None;

        if let Err(e) = &result {
            tracing::warn!(ticket, "request failed: {}", e);
        }
        let (text, sources) = assistant_reply(result);
        self.conversation.append(Sender::Assistant, text, sources);
        self.conversation.finish_turn();
        self.effects.push(WidgetEffect::ScrollToBottom);

        if let Some(id) = in_flight.consumed {
            self.selection.clear_if(id);
        }
        self.affordance.hide();
        self.ask_focus_timer.cancel();
        // a selection made while the request was in flight stays active
        // without its affordance
        self.selection.unpin(now);
        if self.selection.active().is_none() {
            self.reset_to_normal();
        }
        true
    }

    /// Begin, dispatch and complete a send in one call.
    ///
    /// Returns false when the send was rejected. Backend failures are
    /// recorded as assistant messages, never returned. Completion is stamped
    /// with the system clock.
    pub async fn send(&mut self, client: &DispatchClient, text: &str) -> bool {
        let Some(pending) = self.begin_send(text) else {
            return false;
        };
        let result = client.dispatch(&pending.request).await;
        self.complete_send(pending.ticket, result, Instant::now())
    }

    // ========== Rendering ==========

    pub fn render(&self) -> WidgetView {
        WidgetView {
            color_mode: self.panel.color_mode(),
            affordance: self.render_affordance(),
            panel: self.panel.is_open().then(|| self.render_panel()),
        }
    }

    fn render_affordance(&self) -> AffordanceView {
        match self.affordance.state() {
            Affordance::Hidden => AffordanceView::Hidden,
            Affordance::Button { at } => AffordanceView::Button {
                at: *at,
                label: ASK_AI_LABEL,
            },
            Affordance::Popover { at, draft, .. } => AffordanceView::Popover {
                at: *at,
                draft: draft.clone(),
                placeholder: popover_placeholder(
                    self.selection.active().map(|s| s.text()).unwrap_or_default(),
                ),
                can_send: !draft.trim().is_empty(),
            },
        }
    }

    fn render_panel(&self) -> PanelView {
        let scoped_text = match self.mode {
            InteractionMode::SelectionScoped => self.selection.active().map(|s| s.text()),
            InteractionMode::Normal => None,
        };

        let welcome = self.conversation.is_empty().then(|| WelcomeView {
            lines: WELCOME_LINES.to_vec(),
            context_preview: scoped_text.map(|t| truncate_chars(t, CONTEXT_PREVIEW_CHARS)),
        });

        let messages = self
            .conversation
            .messages()
            .iter()
            .map(|m| MessageView {
                id: m.id(),
                sender: m.sender(),
                text: m.text().to_string(),
                sources: match m.sender() {
                    Sender::Assistant => m
                        .sources()
                        .iter()
                        .map(|s| s.label().to_string())
                        .collect(),
                    Sender::User => Vec::new(),
                },
            })
            .collect();

        let loading = self.conversation.is_loading();
        PanelView {
            title: self.title.clone(),
            mode_indicator: scoped_text.map(|_| MODE_INDICATOR_LABEL),
            welcome,
            messages,
            typing: self.conversation.is_typing(),
            input: InputView {
                draft: self.panel_draft.clone(),
                placeholder: match self.mode {
                    InteractionMode::SelectionScoped => SCOPED_INPUT_PLACEHOLDER,
                    InteractionMode::Normal => GENERAL_INPUT_PLACEHOLDER,
                },
                disabled: loading,
                can_send: !loading && !self.panel_draft.trim().is_empty(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Source;
    use crate::dispatch::{ChatReply, DispatchError, SERVER_ERROR_TEXT};
    use crate::panel::MemoryPreferenceStore;
    use crate::selection::Rect;

    fn widget() -> Widget {
        Widget::new(
            &AssistConfig::default(),
            Box::new(MemoryPreferenceStore::new()),
            None,
        )
    }

    fn select(widget: &mut Widget, text: &str, now: Instant) {
        widget.observe_selection(
            SelectionTrigger::PointerUp,
            SelectionSnapshot::new(text, vec![Rect::new(100.0, 300.0, 120.0, 18.0)]),
            ScrollOffset::new(0.0, 500.0),
            now,
        );
        widget.tick(now + Duration::from_millis(100));
    }

    #[test]
    fn test_selection_drives_mode_and_button() {
        let now = Instant::now();
        let mut w = widget();
        select(&mut w, "bipedal locomotion", now);

        assert_eq!(w.mode(), InteractionMode::SelectionScoped);
        assert!(matches!(w.affordance(), Affordance::Button { .. }));

        select(&mut w, "", now + Duration::from_secs(1));
        assert_eq!(w.mode(), InteractionMode::Normal);
        assert_eq!(w.affordance(), &Affordance::Hidden);
    }

    #[test]
    fn test_expiry_returns_to_normal() {
        let now = Instant::now();
        let mut w = widget();
        select(&mut w, "bipedal locomotion", now);

        w.tick(now + Duration::from_millis(100) + Duration::from_secs(5));
        assert_eq!(w.mode(), InteractionMode::Normal);
        assert_eq!(w.affordance(), &Affordance::Hidden);
    }

    #[test]
    fn test_click_opens_popover_and_focuses_after_delay() {
        let now = Instant::now();
        let mut w = widget();
        assert!(!w.click_ask_ai(now));

        select(&mut w, "bipedal locomotion", now);
        let clicked_at = now + Duration::from_secs(1);
        assert!(w.click_ask_ai(clicked_at));
        assert!(matches!(w.affordance(), Affordance::Popover { .. }));

        w.tick(clicked_at + Duration::from_millis(100));
        assert_eq!(w.take_effects(), vec![WidgetEffect::FocusAskInput]);

        // pinned: the expiry that would have fired is gone
        w.tick(now + Duration::from_secs(30));
        assert_eq!(w.mode(), InteractionMode::SelectionScoped);
    }

    #[test]
    fn test_begin_send_rejects_blank_and_concurrent() {
        let mut w = widget();
        assert_eq!(w.begin_send("   \n"), None);
        assert!(w.conversation().is_empty());

        let first = w.begin_send("What is a URDF?").unwrap();
        assert!(w.is_loading());
        assert_eq!(w.begin_send("second"), None);
        assert_eq!(w.conversation().len(), 1);

        w.complete_send(
            first.ticket,
            Ok(ChatReply::new("A URDF is...", vec![])),
            Instant::now(),
        );
        assert!(!w.is_loading());
        assert!(w.begin_send("second").is_some());
    }

    #[test]
    fn test_general_send_scenario() {
        let mut w = widget();
        let pending = w.begin_send("What is a URDF?").unwrap();
        assert_eq!(
            serde_json::to_value(&pending.request).unwrap(),
            serde_json::json!({"message": "What is a URDF?", "selected_text": null, "history": []})
        );

        assert!(w.complete_send(
            pending.ticket,
            Ok(ChatReply::new(
                "A URDF is...",
                vec![Source::from_file("urdf_for_humanoid_robots.md")]
            )),
            Instant::now(),
        ));

        let messages = w.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender(), Sender::User);
        assert_eq!(messages[1].text(), "A URDF is...");
        assert_eq!(messages[1].sources().len(), 1);
    }

    #[test]
    fn test_popover_send_is_scoped_and_clears_on_completion() {
        let now = Instant::now();
        let mut w = widget();
        select(&mut w, "bipedal locomotion", now);
        w.click_ask_ai(now + Duration::from_secs(1));
        w.set_popover_draft("explain this");

        let pending = w.submit_popover().unwrap();
        assert_eq!(pending.request.endpoint(), Endpoint::SelectionQuery);
        assert_eq!(w.affordance(), &Affordance::Hidden);
        assert_eq!(w.mode(), InteractionMode::SelectionScoped);

        let failure = DispatchError::Status {
            status: 500,
            body: String::new(),
        };
        w.complete_send(pending.ticket, Err(failure), now + Duration::from_secs(2));
        assert_eq!(w.mode(), InteractionMode::Normal);
        assert!(w.selection().active().is_none());
        assert_eq!(w.conversation().messages()[1].text(), SERVER_ERROR_TEXT);
    }

    #[test]
    fn test_selection_made_in_flight_survives_completion() {
        let now = Instant::now();
        let mut w = widget();
        select(&mut w, "bipedal locomotion", now);
        let pending = w.begin_send("explain this").unwrap();

        select(&mut w, "zero moment point", now + Duration::from_secs(1));
        let done_at = now + Duration::from_secs(2);
        w.complete_send(pending.ticket, Ok(ChatReply::new("ok", vec![])), done_at);

        assert_eq!(w.mode(), InteractionMode::SelectionScoped);
        assert_eq!(
            w.selection().active().map(|s| s.text()),
            Some("zero moment point")
        );
        assert_eq!(w.affordance(), &Affordance::Hidden);
    }

    #[test]
    fn test_completion_closes_popover_opened_in_flight() {
        let now = Instant::now();
        let mut w = widget();
        let pending = w.begin_send("What is a URDF?").unwrap();

        select(&mut w, "zero moment point", now);
        assert!(w.click_ask_ai(now + Duration::from_millis(200)));
        w.set_popover_draft("half typed");

        let done_at = now + Duration::from_millis(250);
        w.complete_send(pending.ticket, Ok(ChatReply::new("ok", vec![])), done_at);
        assert_eq!(w.affordance(), &Affordance::Hidden);
        assert!(!w.selection().is_pinned());

        // no focus request for the closed popover
        w.tick(done_at + Duration::from_millis(100));
        assert!(!w.take_effects().contains(&WidgetEffect::FocusAskInput));

        // the surviving selection expires on its own again
        w.tick(done_at + Duration::from_secs(5));
        assert_eq!(w.mode(), InteractionMode::Normal);
        assert!(w.selection().active().is_none());
    }

    #[test]
    fn test_cancelled_popover_does_not_trap_scoped_mode() {
        let now = Instant::now();
        let mut w = widget();
        select(&mut w, "bipedal locomotion", now);
        assert!(w.click_ask_ai(now + Duration::from_millis(200)));
        w.cancel_popover(now + Duration::from_millis(300));
        assert_eq!(w.mode(), InteractionMode::SelectionScoped);

        // clicking elsewhere collapses the page selection
        select(&mut w, "", now + Duration::from_secs(1));
        assert_eq!(w.mode(), InteractionMode::Normal);
        assert_eq!(w.affordance(), &Affordance::Hidden);

        let pending = w.begin_send("unrelated question").unwrap();
        assert_eq!(pending.request.endpoint(), Endpoint::GeneralMessage);
        assert_eq!(
            serde_json::to_value(&pending.request).unwrap(),
            serde_json::json!({
                "message": "unrelated question",
                "selected_text": null,
                "history": []
            })
        );
    }

    #[test]
    fn test_cancelled_popover_selection_expires() {
        let now = Instant::now();
        let mut w = widget();
        select(&mut w, "bipedal locomotion", now);
        w.click_ask_ai(now + Duration::from_millis(200));

        let cancelled_at = now + Duration::from_secs(30);
        w.cancel_popover(cancelled_at);
        w.tick(cancelled_at + Duration::from_millis(4999));
        assert_eq!(w.mode(), InteractionMode::SelectionScoped);

        w.tick(cancelled_at + Duration::from_secs(5));
        assert_eq!(w.mode(), InteractionMode::Normal);
        assert!(w.selection().active().is_none());
    }

    #[test]
    fn test_stale_ticket_ignored() {
        let mut w = widget();
        let pending = w.begin_send("q").unwrap();
        let stray = Ok(ChatReply::new("x", vec![]));
        assert!(!w.complete_send(pending.ticket + 1, stray, Instant::now()));
        assert!(w.is_loading());
        assert_eq!(w.conversation().len(), 1);
    }

    #[test]
    fn test_panel_draft_kept_when_rejected() {
        let mut w = widget();
        w.begin_send("first").unwrap();
        w.set_panel_draft("second");
        assert_eq!(w.submit_panel(), None);
        assert_eq!(w.panel_draft(), "second");
    }

    #[test]
    fn test_render_closed_panel_still_shows_affordance() {
        let now = Instant::now();
        let mut w = widget();
        select(&mut w, "bipedal locomotion", now);

        let view = w.render();
        assert!(view.panel.is_none());
        assert!(matches!(view.affordance, AffordanceView::Button { label: "Ask AI", .. }));
    }

    #[test]
    fn test_render_open_panel() {
        let now = Instant::now();
        let mut w = widget();
        w.toggle_panel(now);
        select(&mut w, "bipedal locomotion", now);

        let panel = w.render().panel.unwrap();
        assert_eq!(panel.mode_indicator, Some(MODE_INDICATOR_LABEL));
        assert_eq!(panel.input.placeholder, SCOPED_INPUT_PLACEHOLDER);
        let welcome = panel.welcome.unwrap();
        assert_eq!(welcome.context_preview.as_deref(), Some("bipedal locomotion"));

        w.clear_selection();
        let panel = w.render().panel.unwrap();
        assert_eq!(panel.mode_indicator, None);
        assert_eq!(panel.input.placeholder, GENERAL_INPUT_PLACEHOLDER);
    }
}
