//! Debounced rebuild triggering.
//!
//! Time is passed in by the caller as a [`Duration`] since any fixed origin
//! (`performance.now()` on the web, an `Instant` natively), so nothing here
//! depends on an event loop or timer primitive.

use std::time::Duration;

/// Quiet period after the last edit before a rebuild fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// A single-slot scheduled task. Scheduling again replaces the pending
/// payload and pushes the deadline back.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<(Duration, T)>,
}

impl<T> Debouncer<T> {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Cancels whatever was pending and schedules `payload` for `now + window`.
    /// Returns `true` when a pending task was replaced.
    pub fn schedule(&mut self, now: Duration, payload: T) -> bool {
        self.pending.replace((now + self.window, payload)).is_some()
    }

    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take().map(|(_, payload)| payload)
    }

    /// Takes the payload once its deadline has passed.
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if *deadline <= now => self.cancel(),
            _ => None,
        }
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

/// Live-preview gate in front of a [`Debouncer`].
#[derive(Debug, Clone)]
pub struct LiveUpdateScheduler<T> {
    enabled: bool,
    debouncer: Debouncer<T>,
}

impl<T> LiveUpdateScheduler<T> {
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self::with_window(enabled, DEBOUNCE_WINDOW)
    }

    #[must_use]
    pub const fn with_window(enabled: bool, window: Duration) -> Self {
        Self {
            enabled,
            debouncer: Debouncer::new(window),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records an edit carrying the latest configuration. Ignored while live
    /// preview is off.
    pub fn on_edit(&mut self, now: Duration, latest: T) {
        if !self.enabled {
            return;
        }
        if self.debouncer.schedule(now, latest) {
            log::trace!("rebuild rescheduled");
        }
    }

    /// Switches live preview. Turning it on hands back `latest` for one
    /// immediate rebuild; turning it off drops any pending rebuild.
    pub fn set_enabled(&mut self, enabled: bool, latest: T) -> Option<T> {
        let was_enabled = std::mem::replace(&mut self.enabled, enabled);
        if !enabled {
            self.debouncer.cancel();
            return None;
        }
        if was_enabled {
            return None;
        }
        // The immediate rebuild supersedes anything still pending.
        self.debouncer.cancel();
        Some(latest)
    }

    /// Returns the configuration to rebuild with, if the window has elapsed.
    pub fn poll(&mut self, now: Duration) -> Option<T> {
        if !self.enabled {
            return None;
        }
        self.debouncer.poll(now)
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.debouncer.deadline()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DEBOUNCE_WINDOW, Debouncer, LiveUpdateScheduler};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn burst_of_edits_fires_once_with_last_payload() {
        let mut scheduler = LiveUpdateScheduler::new(true);
        let mut fired = Vec::new();

        for (i, t) in [0, 25, 50, 75, 100].into_iter().enumerate() {
            scheduler.on_edit(ms(t), i);
            fired.extend(scheduler.poll(ms(t)));
        }
        for t in (110..=1000).step_by(10) {
            fired.extend(scheduler.poll(ms(t)));
        }

        assert_eq!(fired, vec![4]);
    }

    #[test]
    fn deadline_moves_with_each_edit() {
        let mut debouncer = Debouncer::default();
        assert!(!debouncer.schedule(ms(0), "a"));
        assert!(debouncer.schedule(ms(200), "b"));
        assert_eq!(debouncer.deadline(), Some(ms(200) + DEBOUNCE_WINDOW));

        assert_eq!(debouncer.poll(ms(499)), None);
        assert_eq!(debouncer.poll(ms(500)), Some("b"));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn cancel_clears_the_slot() {
        let mut debouncer = Debouncer::new(ms(10));
        debouncer.schedule(ms(0), 1);
        assert_eq!(debouncer.cancel(), Some(1));
        assert_eq!(debouncer.poll(ms(100)), None);
    }

    #[test]
    fn disabled_scheduler_ignores_edits() {
        let mut scheduler = LiveUpdateScheduler::new(false);
        scheduler.on_edit(ms(0), "edit");
        assert_eq!(scheduler.poll(ms(1000)), None);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn enabling_rebuilds_immediately_and_disabling_cancels() {
        let mut scheduler = LiveUpdateScheduler::new(false);
        assert_eq!(scheduler.set_enabled(true, "now"), Some("now"));
        assert_eq!(scheduler.set_enabled(true, "again"), None);

        scheduler.on_edit(ms(0), "pending");
        assert_eq!(scheduler.set_enabled(false, "off"), None);
        assert_eq!(scheduler.set_enabled(true, "back"), Some("back"));
        assert_eq!(scheduler.poll(ms(1000)), None);
    }
}
