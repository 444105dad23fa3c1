//! Throttled progress reporting.

use std::time::{Duration, Instant};

use crate::model::ProgressState;

/// Gap between progress snapshots when the host does not ask for another.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(1000);

/// Converts a host supplied interval to a duration.
///
/// The sign is ignored; `None` selects [`DEFAULT_PROGRESS_INTERVAL`].
#[must_use]
pub fn interval_from_millis(millis: Option<i64>) -> Duration {
    millis.map_or(DEFAULT_PROGRESS_INTERVAL, |ms| {
        Duration::from_millis(ms.unsigned_abs())
    })
}

/// Keeps the progress counters of one traversal and decides when a snapshot
/// is due.
pub struct ProgressTracker<P> {
    state: ProgressState,
    interval: Duration,
    started: Instant,
    last_tick: Instant,
    on_progress: P,
}

impl<P: FnMut(&ProgressState)> ProgressTracker<P> {
    /// Starts tracking and emits the initial zero snapshot.
    pub fn start(interval: Duration, mut on_progress: P) -> Self {
        let state = ProgressState::default();
        on_progress(&state);
        let now = Instant::now();
        Self {
            state,
            interval,
            started: now,
            last_tick: now,
            on_progress,
        }
    }

    /// Current counters.
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Counts a discovered subfolder.
    pub fn folder_found(&mut self) {
        self.state.count_folder += 1;
        self.state.count_total += 1;
    }

    /// Counts an indexed message.
    pub fn email_found(&mut self) {
        self.state.count_email += 1;
        self.state.count_total += 1;
    }

    /// Counts a collected attachment.
    pub fn attachment_found(&mut self) {
        self.state.count_attachment += 1;
        self.state.count_total += 1;
    }

    /// Emits a snapshot if the interval has elapsed since the last one.
    pub fn tick(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= self.interval {
            self.state.elapsed = millis(now.duration_since(self.started));
            (self.on_progress)(&self.state);
            self.last_tick = now;
        }
    }

    /// Finalizes the elapsed time and returns the terminal snapshot.
    pub fn finish(mut self) -> (ProgressState, Instant) {
        self.state.elapsed = millis(self.started.elapsed());
        (self.state, self.started)
    }
}

/// Whole milliseconds of a duration, saturating.
#[must_use]
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_millis() {
        assert_eq!(interval_from_millis(None), DEFAULT_PROGRESS_INTERVAL);
        assert_eq!(interval_from_millis(Some(250)), Duration::from_millis(250));
        assert_eq!(interval_from_millis(Some(-250)), Duration::from_millis(250));
    }

    #[test]
    fn test_initial_snapshot_is_emitted() {
        let mut seen = Vec::new();
        let tracker = ProgressTracker::start(Duration::from_secs(3600), |s| seen.push(*s));
        let (state, _) = tracker.finish();
        assert_eq!(state.count_total, 0);
        assert_eq!(seen, vec![ProgressState::default()]);
    }

    #[test]
    fn test_tick_respects_interval() {
        let mut seen = 0;
        {
            let mut tracker = ProgressTracker::start(Duration::from_secs(3600), |_| seen += 1);
            tracker.email_found();
            tracker.tick();
            tracker.attachment_found();
            tracker.tick();
            assert_eq!(tracker.state().count_total, 2);
        }
        assert_eq!(seen, 1);

        let mut seen = 0;
        {
            let mut tracker = ProgressTracker::start(Duration::ZERO, |_| seen += 1);
            tracker.email_found();
            tracker.tick();
            tracker.email_found();
            tracker.tick();
        }
        assert_eq!(seen, 3);
    }
}
