//! Async driver for a `Widget`
//!
//! Runs on one task. Host events, timer deadlines and finished requests are
//! handled strictly one at a time; HTTP calls run on spawned tasks and report
//! back through a channel, so the page stays responsive while a request is in
//! flight.

use anyhow::Result;
use std::time::Instant;
use tokio::sync::mpsc;

use super::{PendingSend, Widget, WidgetEvent};
use crate::dispatch::{DispatchClient, DispatchResult};
use crate::render::WidgetRenderer;

type Completion = (u64, DispatchResult);

/// Event channel for feeding a driver
pub fn channel() -> (
    mpsc::UnboundedSender<WidgetEvent>,
    mpsc::UnboundedReceiver<WidgetEvent>,
) {
    mpsc::unbounded_channel()
}

enum Step {
    Event(Option<WidgetEvent>),
    Completed(Completion),
    Timer,
}

pub struct WidgetDriver<R: WidgetRenderer> {
    widget: Widget,
    client: DispatchClient,
    renderer: R,
    events: mpsc::UnboundedReceiver<WidgetEvent>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<R: WidgetRenderer> WidgetDriver<R> {
    pub fn new(
        widget: Widget,
        client: DispatchClient,
        renderer: R,
        events: mpsc::UnboundedReceiver<WidgetEvent>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            widget,
            client,
            renderer,
            events,
            completions_tx,
            completions_rx,
        }
    }

    /// Process events until `Shutdown` or until every sender is dropped.
    ///
    /// Returns the widget and renderer for inspection.
    pub async fn run(mut self) -> Result<(Widget, R)> {
        self.flush()?;

        loop {
            let deadline = self.widget.next_deadline();
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            let step = tokio::select! {
                event = self.events.recv() => Step::Event(event),
                Some(done) = self.completions_rx.recv() => Step::Completed(done),
                _ = timer => Step::Timer,
            };

            let now = now();
            match step {
                Step::Event(None) | Step::Event(Some(WidgetEvent::Shutdown)) => break,
                Step::Event(Some(event)) => {
                    // timers already due fire before the event that follows them
                    self.widget.tick(now);
                    self.handle_event(event, now);
                }
                Step::Completed((ticket, result)) => {
                    self.widget.complete_send(ticket, result, now);
                }
                Step::Timer => self.widget.tick(now),
            }

            self.flush()?;
        }

        tracing::debug!("widget driver stopped");
        Ok((self.widget, self.renderer))
    }

    fn handle_event(&mut self, event: WidgetEvent, now: Instant) {
        match event {
            WidgetEvent::Selection {
                trigger,
                snapshot,
                scroll,
            } => self.widget.observe_selection(trigger, snapshot, scroll, now),
            WidgetEvent::SelectionCleared => self.widget.clear_selection(),
            WidgetEvent::AskAiClicked => {
                self.widget.click_ask_ai(now);
            }
            WidgetEvent::PopoverInput(text) => {
                self.widget.set_popover_draft(text);
            }
            WidgetEvent::PopoverSubmitted => {
                if let Some(pending) = self.widget.submit_popover() {
                    self.spawn_dispatch(pending);
                }
            }
            WidgetEvent::PopoverCancelled => self.widget.cancel_popover(now),
            WidgetEvent::PanelToggled => {
                self.widget.toggle_panel(now);
            }
            WidgetEvent::PanelInput(text) => self.widget.set_panel_draft(text),
            WidgetEvent::PanelSubmitted => {
                if let Some(pending) = self.widget.submit_panel() {
                    self.spawn_dispatch(pending);
                }
            }
            WidgetEvent::ColorModeToggled => self.widget.toggle_color_mode(),
            WidgetEvent::Shutdown => {}
        }
    }

    fn spawn_dispatch(&self, pending: PendingSend) {
        let client = self.client.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = client.dispatch(&pending.request).await;
            let _ = completions.send((pending.ticket, result));
        });
    }

    fn flush(&mut self) -> Result<()> {
        for effect in self.widget.take_effects() {
            self.renderer.apply(effect)?;
        }
        self.renderer.render(&self.widget.render())
    }
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
