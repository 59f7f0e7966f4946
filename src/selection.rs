//! Selection observer
//!
//! Turns raw selection reports from the host page into at most one active
//! `Selection`. Reports are debounced, filtered by length, and an accepted
//! selection expires on its own unless the reader engages with it.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::timer::{earliest, TimerSlot};

/// Screen-space rectangle as reported by `Range.getBoundingClientRect()`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Document scroll position at the moment a selection was measured.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

impl ScrollOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which page interaction produced a selection report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTrigger {
    PointerUp,
    KeyUp,
    SelectionChange,
}

/// Raw selection state read from the page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    /// `selection.toString()`, untrimmed
    pub text: String,
    /// One rectangle per selection range, in range order
    #[serde(default)]
    pub ranges: Vec<Rect>,
}

impl SelectionSnapshot {
    pub fn new(text: impl Into<String>, ranges: Vec<Rect>) -> Self {
        Self {
            text: text.into(),
            ranges,
        }
    }

    /// A collapsed selection (click without drag)
    pub fn collapsed() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionId(u64);

impl SelectionId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// An accepted selection. Only the first range's rectangle is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    id: SelectionId,
    text: String,
    rect: Rect,
    scroll: ScrollOffset,
}

impl Selection {
    pub fn id(&self) -> SelectionId {
        self.id
    }

    /// Trimmed selection text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn scroll(&self) -> ScrollOffset {
        self.scroll
    }
}

/// Exclusive length bounds on the trimmed selection text, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionBounds {
    pub min_exclusive: usize,
    pub max_exclusive: usize,
}

impl SelectionBounds {
    /// Any non-empty selection under 500 characters
    pub fn coarse() -> Self {
        Self {
            min_exclusive: 0,
            max_exclusive: 500,
        }
    }

    /// Selections of 6 to 499 characters
    pub fn refined() -> Self {
        Self {
            min_exclusive: 5,
            max_exclusive: 500,
        }
    }

    pub fn qualifies(&self, trimmed: &str) -> bool {
        let len = trimmed.chars().count();
        len > self.min_exclusive && len < self.max_exclusive
    }
}

impl Default for SelectionBounds {
    fn default() -> Self {
        Self::refined()
    }
}

/// Outcome of evaluating a selection report or a timer
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionChange {
    /// A new selection replaced whatever was active
    Activated(Selection),
    /// The page selection no longer qualifies
    Invalidated { previous: SelectionId },
    /// The active selection timed out untouched
    Expired { previous: SelectionId },
}

#[derive(Debug, Clone)]
struct PendingReport {
    trigger: SelectionTrigger,
    snapshot: SelectionSnapshot,
    scroll: ScrollOffset,
}

/// Owns the active selection and its debounce and expiry timers
#[derive(Debug)]
pub struct SelectionObserver {
    bounds: SelectionBounds,
    debounce: Duration,
    ttl: Option<Duration>,
    active: Option<Selection>,
    /// Set once the reader engaged with the selection; stops expiry and
    /// keeps collapsed reports from invalidating it
    pinned: bool,
    pending: Option<PendingReport>,
    debounce_timer: TimerSlot,
    expiry_timer: TimerSlot,
    next_id: u64,
}

impl SelectionObserver {
    pub fn new(bounds: SelectionBounds, debounce: Duration, ttl: Option<Duration>) -> Self {
        Self {
            bounds,
            debounce,
            ttl,
            active: None,
            pinned: false,
            pending: None,
            debounce_timer: TimerSlot::new(),
            expiry_timer: TimerSlot::new(),
            next_id: 0,
        }
    }

    pub fn bounds(&self) -> SelectionBounds {
        self.bounds
    }

    pub fn active(&self) -> Option<&Selection> {
        self.active.as_ref()
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Record a selection report.
    ///
    /// With a debounce window the report only replaces the pending one and
    /// restarts the window; it is evaluated by a later `tick`.
    pub fn observe(
        &mut self,
        trigger: SelectionTrigger,
        snapshot: SelectionSnapshot,
        scroll: ScrollOffset,
        now: Instant,
    ) -> Option<SelectionChange> {
        if self.debounce.is_zero() {
            return self.observe_now(trigger, snapshot, scroll, now);
        }

        self.pending = Some(PendingReport {
            trigger,
            snapshot,
            scroll,
        });
        self.debounce_timer.schedule(now, self.debounce);
        None
    }

    /// Run due timers. Must be called at or after `next_deadline`.
    pub fn tick(&mut self, now: Instant) -> Option<SelectionChange> {
        if self.debounce_timer.fire_if_due(now) {
            if let Some(report) = self.pending.take() {
                if let Some(change) = self.evaluate(report.trigger, report.snapshot, report.scroll)
                {
                    self.arm_expiry(&change, now);
                    return Some(change);
                }
            }
        }

        if self.expiry_timer.fire_if_due(now) {
            if let Some(previous) = self.active.take() {
                self.pinned = false;
                tracing::debug!(selection = previous.id.0, "selection expired");
                return Some(SelectionChange::Expired {
                    previous: previous.id,
                });
            }
        }

        None
    }

    /// Evaluate a report immediately, bypassing the debounce window.
    pub fn observe_now(
        &mut self,
        trigger: SelectionTrigger,
        snapshot: SelectionSnapshot,
        scroll: ScrollOffset,
        now: Instant,
    ) -> Option<SelectionChange> {
        self.pending = None;
        self.debounce_timer.cancel();
        let change = self.evaluate(trigger, snapshot, scroll);
        if let Some(change) = &change {
            self.arm_expiry(change, now);
        }
        change
    }

    /// Stop the expiry clock; the reader is acting on this selection.
    pub fn pin(&mut self) -> bool {
        if self.active.is_none() {
            return false;
        }
        self.pinned = true;
        self.expiry_timer.cancel();
        true
    }

    /// Hand the selection back to the expiry clock, restarting it at `now`.
    pub fn unpin(&mut self, now: Instant) -> bool {
        if !self.pinned {
            return false;
        }
        self.pinned = false;
        if let (Some(_), Some(ttl)) = (&self.active, self.ttl) {
            self.expiry_timer.schedule(now, ttl);
        }
        true
    }

    /// Drop the active selection and anything pending.
    pub fn clear(&mut self) -> Option<SelectionId> {
        self.pending = None;
        self.debounce_timer.cancel();
        self.expiry_timer.cancel();
        self.pinned = false;
        self.active.take().map(|s| s.id)
    }

    /// Drop the active selection only if it is still `id`.
    pub fn clear_if(&mut self, id: SelectionId) -> bool {
        if self.active.as_ref().map(|s| s.id) != Some(id) {
            return false;
        }
        self.expiry_timer.cancel();
        self.pinned = false;
        self.active = None;
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.debounce_timer.deadline(), self.expiry_timer.deadline()])
    }

    fn evaluate(
        &mut self,
        trigger: SelectionTrigger,
        snapshot: SelectionSnapshot,
        scroll: ScrollOffset,
    ) -> Option<SelectionChange> {
        let text = snapshot.text.trim();
        let first_range = snapshot.ranges.first().copied();

        match first_range {
            Some(rect) if self.bounds.qualifies(text) => {
                if self.pinned {
                    if let Some(active) = &self.active {
                        if active.text == text && active.rect == rect {
                            return None;
                        }
                    }
                }

                self.next_id += 1;
                let selection = Selection {
                    id: SelectionId(self.next_id),
                    text: text.to_string(),
                    rect,
                    scroll,
                };
                tracing::debug!(
                    selection = self.next_id,
                    chars = text.chars().count(),
                    ?trigger,
                    "selection activated"
                );
                self.pinned = false;
                self.active = Some(selection.clone());
                Some(SelectionChange::Activated(selection))
            }
            _ => {
                if self.pinned {
                    tracing::debug!(?trigger, "ignoring non-qualifying selection while pinned");
                    return None;
                }
                self.expiry_timer.cancel();
                self.active.take().map(|previous| {
                    tracing::debug!(selection = previous.id.0, ?trigger, "selection invalidated");
                    SelectionChange::Invalidated {
                        previous: previous.id,
                    }
                })
            }
        }
    }

    fn arm_expiry(&mut self, change: &SelectionChange, now: Instant) {
        if let SelectionChange::Activated(_) = change {
            match self.ttl {
                Some(ttl) => {
                    self.expiry_timer.schedule(now, ttl);
                }
                None => {
                    self.expiry_timer.cancel();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(100);
    const TTL: Duration = Duration::from_secs(5);

    fn observer() -> SelectionObserver {
        SelectionObserver::new(SelectionBounds::refined(), DEBOUNCE, Some(TTL))
    }

    fn snapshot(text: &str) -> SelectionSnapshot {
        SelectionSnapshot::new(text, vec![Rect::new(100.0, 200.0, 80.0, 16.0)])
    }

    fn select(obs: &mut SelectionObserver, text: &str, now: Instant) -> Option<SelectionChange> {
        obs.observe(
            SelectionTrigger::PointerUp,
            snapshot(text),
            ScrollOffset::default(),
            now,
        );
        obs.tick(now + DEBOUNCE)
    }

    #[test]
    fn test_bounds() {
        let refined = SelectionBounds::refined();
        assert!(!refined.qualifies(""));
        assert!(!refined.qualifies("12345"));
        assert!(refined.qualifies("123456"));
        assert!(refined.qualifies(&"x".repeat(499)));
        assert!(!refined.qualifies(&"x".repeat(500)));

        let coarse = SelectionBounds::coarse();
        assert!(coarse.qualifies("a"));
        assert!(!coarse.qualifies(""));
    }

    #[test]
    fn test_unpin_restarts_expiry() {
        let now = Instant::now();
        let mut obs = observer();
        select(&mut obs, "bipedal locomotion", now);
        assert!(obs.pin());
        assert_eq!(obs.next_deadline(), None);

        let released = now + Duration::from_secs(10);
        assert!(obs.unpin(released));
        assert!(!obs.unpin(released));
        assert!(!obs.is_pinned());
        assert_eq!(obs.next_deadline(), Some(released + TTL));

        let change = select(&mut obs, "", released + Duration::from_secs(1));
        assert!(matches!(change, Some(SelectionChange::Invalidated { .. })));
    }

    #[test]
    fn test_zero_debounce_evaluates_immediately() {
        let now = Instant::now();
        let mut obs = SelectionObserver::new(SelectionBounds::refined(), Duration::ZERO, Some(TTL));
        let change = obs.observe(
            SelectionTrigger::KeyUp,
            snapshot("bipedal locomotion"),
            ScrollOffset::default(),
            now,
        );
        assert!(matches!(change, Some(SelectionChange::Activated(_))));
        assert_eq!(obs.next_deadline(), Some(now + TTL));
    }

    #[test]
    fn test_bounds_count_characters_not_bytes() {
        // six characters, eighteen bytes
        assert!(SelectionBounds::refined().qualifies("日本語の文章"));
    }

    #[test]
    fn test_debounce_coalesces_reports() {
        let now = Instant::now();
        let mut obs = observer();

        obs.observe(
            SelectionTrigger::SelectionChange,
            snapshot("bipedal"),
            ScrollOffset::default(),
            now,
        );
        obs.observe(
            SelectionTrigger::SelectionChange,
            snapshot("bipedal locomotion"),
            ScrollOffset::default(),
            now + Duration::from_millis(50),
        );

        // first window would have closed here, but it was restarted
        assert_eq!(obs.tick(now + Duration::from_millis(100)), None);

        let change = obs.tick(now + Duration::from_millis(150));
        match change {
            Some(SelectionChange::Activated(sel)) => {
                assert_eq!(sel.text(), "bipedal locomotion");
                assert_eq!(sel.id().get(), 1);
            }
            other => panic!("expected activation, got {:?}", other),
        }
    }

    #[test]
    fn test_text_is_trimmed_and_first_range_used() {
        let now = Instant::now();
        let mut obs = observer();
        let snap = SelectionSnapshot::new(
            "  joint limits \n",
            vec![
                Rect::new(10.0, 20.0, 30.0, 40.0),
                Rect::new(500.0, 600.0, 1.0, 1.0),
            ],
        );
        let change = obs.observe_now(SelectionTrigger::KeyUp, snap, ScrollOffset::default(), now);
        let Some(SelectionChange::Activated(sel)) = change else {
            panic!("expected activation");
        };
        assert_eq!(sel.text(), "joint limits");
        assert_eq!(sel.rect(), Rect::new(10.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn test_collapse_invalidates_active_selection() {
        let now = Instant::now();
        let mut obs = observer();
        select(&mut obs, "bipedal locomotion", now);
        assert!(obs.active().is_some());

        let change = select(&mut obs, "", now + Duration::from_secs(1));
        assert!(matches!(change, Some(SelectionChange::Invalidated { .. })));
        assert!(obs.active().is_none());
        assert_eq!(obs.next_deadline(), None);
    }

    #[test]
    fn test_too_long_selection_invalidates() {
        let now = Instant::now();
        let mut obs = observer();
        select(&mut obs, "bipedal locomotion", now);
        let change = select(&mut obs, &"y".repeat(500), now + Duration::from_secs(1));
        assert!(matches!(change, Some(SelectionChange::Invalidated { .. })));
    }

    #[test]
    fn test_expires_after_ttl() {
        let now = Instant::now();
        let mut obs = observer();
        select(&mut obs, "bipedal locomotion", now);
        let activated_at = now + DEBOUNCE;

        assert_eq!(obs.tick(activated_at + TTL - Duration::from_millis(1)), None);
        let change = obs.tick(activated_at + TTL);
        assert!(matches!(change, Some(SelectionChange::Expired { .. })));
        assert!(obs.active().is_none());
    }

    #[test]
    fn test_new_selection_resets_expiry() {
        let now = Instant::now();
        let mut obs = observer();
        select(&mut obs, "bipedal locomotion", now);

        let second_at = now + Duration::from_secs(4);
        select(&mut obs, "center of mass", second_at);

        // the first selection's deadline passes without effect
        assert_eq!(obs.tick(now + DEBOUNCE + TTL), None);
        assert_eq!(obs.active().map(|s| s.text()), Some("center of mass"));

        let change = obs.tick(second_at + DEBOUNCE + TTL);
        assert!(matches!(change, Some(SelectionChange::Expired { .. })));
    }

    #[test]
    fn test_pinned_selection_survives_collapse_and_timeout() {
        let now = Instant::now();
        let mut obs = observer();
        select(&mut obs, "bipedal locomotion", now);
        assert!(obs.pin());

        assert_eq!(select(&mut obs, "", now + Duration::from_secs(1)), None);
        assert_eq!(obs.tick(now + Duration::from_secs(60)), None);
        assert!(obs.active().is_some());

        let change = select(&mut obs, "zero moment point", now + Duration::from_secs(61));
        assert!(matches!(change, Some(SelectionChange::Activated(_))));
        assert!(!obs.is_pinned());
    }

    #[test]
    fn test_clear_if_ignores_superseded_selection() {
        let now = Instant::now();
        let mut obs = observer();
        let Some(SelectionChange::Activated(first)) = select(&mut obs, "bipedal locomotion", now)
        else {
            panic!("expected activation");
        };
        select(&mut obs, "center of mass", now + Duration::from_secs(1));

        assert!(!obs.clear_if(first.id()));
        assert_eq!(obs.active().map(|s| s.text()), Some("center of mass"));
    }
}
