//! Per-symbol synchronization state machine.

use booksync_core::{SymbolHealth, SymbolKey, SyncError, SyncState};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// A transition the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal sync transition {from} -> {to}")]
pub struct TransitionError {
    /// State before the attempted transition.
    pub from: SyncState,
    /// Requested state.
    pub to: SyncState,
}

/// What happens after an error was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Resync immediately.
    Resync,
    /// More errors in the window than allowed; stay in ERROR until restarted.
    Degraded,
}

/// Counts errors inside a rolling time window.
///
/// Trips once the count exceeds the threshold, so a threshold of 5 allows
/// five errors and degrades on the sixth.
#[derive(Debug)]
pub struct ErrorWindow {
    window: Duration,
    threshold: u32,
    recent: VecDeque<Instant>,
}

impl ErrorWindow {
    /// Creates a window that trips at more than `threshold` errors within
    /// `window`.
    #[must_use]
    pub fn new(threshold: u32, window: Duration) -> Self {
        Self {
            window,
            threshold,
            recent: VecDeque::new(),
        }
    }

    /// Records an error at `now` and returns true if the threshold is exceeded.
    pub fn record(&mut self, now: Instant) -> bool {
        self.recent.push_back(now);
        self.expire(now);
        self.recent.len() > self.threshold as usize
    }

    /// Returns the number of errors inside the window at `now`.
    pub fn count(&mut self, now: Instant) -> usize {
        self.expire(now);
        self.recent.len()
    }

    /// Forgets all recorded errors.
    pub fn clear(&mut self) {
        self.recent.clear();
    }

    fn expire(&mut self, now: Instant) {
        while let Some(&oldest) = self.recent.front() {
            if now.duration_since(oldest) > self.window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Owns the [`SyncState`] of one symbol and its error bookkeeping.
#[derive(Debug)]
pub struct SyncStateMachine {
    state: SyncState,
    consecutive_errors: u32,
    last_error: Option<SyncError>,
    degraded: bool,
    window: ErrorWindow,
}

impl SyncStateMachine {
    /// Creates a machine in `UNSYNCED`.
    #[must_use]
    pub fn new(error_threshold: u32, error_window: Duration) -> Self {
        Self {
            state: SyncState::Unsynced,
            consecutive_errors: 0,
            last_error: None,
            degraded: false,
            window: ErrorWindow::new(error_threshold, error_window),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Returns true once the error threshold was exceeded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Returns the errors recorded since the last successful apply.
    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Returns the most recent error.
    #[must_use]
    pub fn last_error(&self) -> Option<&SyncError> {
        self.last_error.as_ref()
    }

    /// Returns true if `from -> to` is a legal transition.
    #[must_use]
    pub const fn is_allowed(from: SyncState, to: SyncState) -> bool {
        use SyncState::{Error, Synced, Syncing, Unsynced};
        matches!(
            (from, to),
            (Unsynced, Syncing)
                | (Syncing, Synced)
                | (Synced, Synced)
                | (Synced, Syncing)
                | (Syncing | Synced, Error)
                | (Error, Syncing)
                | (_, Unsynced)
        )
    }

    /// Moves to `to`, returning the previous state.
    ///
    /// # Errors
    /// Returns [`TransitionError`] if the transition is not allowed, or if a
    /// degraded symbol would leave `ERROR` without a reset.
    pub fn transition(&mut self, to: SyncState) -> Result<SyncState, TransitionError> {
        let from = self.state;
        if !Self::is_allowed(from, to) || (self.degraded && to == SyncState::Syncing) {
            return Err(TransitionError { from, to });
        }
        self.state = to;
        Ok(from)
    }

    /// Enters `SYNCING` from `UNSYNCED`, `ERROR` (resync) or `SYNCED` (refresh).
    ///
    /// # Errors
    /// See [`SyncStateMachine::transition`].
    pub fn begin_sync(&mut self) -> Result<SyncState, TransitionError> {
        self.transition(SyncState::Syncing)
    }

    /// Enters `SYNCED` after a snapshot was installed.
    ///
    /// # Errors
    /// See [`SyncStateMachine::transition`].
    pub fn mark_synced(&mut self) -> Result<SyncState, TransitionError> {
        self.transition(SyncState::Synced)
    }

    /// Enters `ERROR` and decides whether to resync or escalate.
    ///
    /// Records the error even when the machine is already in `ERROR`.
    pub fn record_error(&mut self, error: SyncError, now: Instant) -> ErrorDisposition {
        self.state = SyncState::Error;
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.last_error = Some(error);

        if self.window.record(now) {
            self.degraded = true;
        }

        if self.degraded {
            ErrorDisposition::Degraded
        } else {
            ErrorDisposition::Resync
        }
    }

    /// Records an error that does not leave the current state, such as a
    /// snapshot fetch that will be retried.
    pub fn note_error(&mut self, error: SyncError) {
        self.last_error = Some(error);
    }

    /// Records a successfully applied update.
    ///
    /// Errors before it no longer count towards degradation.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
        self.window.clear();
    }

    /// Returns to `UNSYNCED`, clearing degradation and error history.
    pub fn reset(&mut self) {
        self.state = SyncState::Unsynced;
        self.consecutive_errors = 0;
        self.last_error = None;
        self.degraded = false;
        self.window.clear();
    }

    /// Builds the health record for this machine.
    #[must_use]
    pub fn health(&self, key: &SymbolKey) -> SymbolHealth {
        let mut health = SymbolHealth::new(key, self.state);
        health.consecutive_errors = self.consecutive_errors;
        health.last_error = self.last_error.as_ref().map(ToString::to_string);
        health.degraded = self.degraded;
        health
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap() -> SyncError {
        SyncError::SequenceGap {
            last_applied: 100,
            first: 102,
            prev: None,
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut machine = SyncStateMachine::new(5, Duration::from_secs(60));
        assert_eq!(machine.state(), SyncState::Unsynced);

        assert_eq!(machine.begin_sync(), Ok(SyncState::Unsynced));
        assert_eq!(machine.mark_synced(), Ok(SyncState::Syncing));
        assert_eq!(machine.state(), SyncState::Synced);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut machine = SyncStateMachine::new(5, Duration::from_secs(60));

        let err = machine.mark_synced().unwrap_err();
        assert_eq!(err.from, SyncState::Unsynced);
        assert_eq!(err.to, SyncState::Synced);
        assert_eq!(err.to_string(), "illegal sync transition UNSYNCED -> SYNCED");
        assert_eq!(machine.state(), SyncState::Unsynced);

        assert!(machine.transition(SyncState::Error).is_err());
    }

    #[test]
    fn test_error_then_resync() {
        let mut machine = SyncStateMachine::new(5, Duration::from_secs(60));
        machine.begin_sync().unwrap();
        machine.mark_synced().unwrap();

        let disposition = machine.record_error(gap(), Instant::now());
        assert_eq!(disposition, ErrorDisposition::Resync);
        assert_eq!(machine.state(), SyncState::Error);
        assert_eq!(machine.consecutive_errors(), 1);

        machine.begin_sync().unwrap();
        assert_eq!(machine.state(), SyncState::Syncing);
    }

    #[test]
    fn test_degrades_beyond_threshold() {
        let mut machine = SyncStateMachine::new(2, Duration::from_secs(60));
        let now = Instant::now();
        machine.begin_sync().unwrap();

        assert_eq!(machine.record_error(gap(), now), ErrorDisposition::Resync);
        machine.begin_sync().unwrap();
        assert_eq!(machine.record_error(gap(), now), ErrorDisposition::Resync);
        machine.begin_sync().unwrap();
        assert_eq!(machine.record_error(gap(), now), ErrorDisposition::Degraded);

        assert!(machine.is_degraded());
        assert!(machine.begin_sync().is_err());

        let health = machine.health(&SymbolKey::new("binance", "spot", "BTCUSDT"));
        assert!(health.degraded);
        assert_eq!(health.state, SyncState::Error);
        assert_eq!(health.consecutive_errors, 3);
        assert!(health.last_error.unwrap().contains("sequence gap"));
    }

    #[test]
    fn test_reset_clears_degradation() {
        let mut machine = SyncStateMachine::new(0, Duration::from_secs(60));
        machine.begin_sync().unwrap();
        machine.record_error(gap(), Instant::now());
        assert!(machine.is_degraded());

        machine.reset();
        assert!(!machine.is_degraded());
        assert_eq!(machine.state(), SyncState::Unsynced);
        assert!(machine.last_error().is_none());
        assert!(machine.begin_sync().is_ok());
    }

    #[test]
    fn test_success_resets_consecutive_errors() {
        let mut machine = SyncStateMachine::new(5, Duration::from_secs(60));
        machine.begin_sync().unwrap();
        machine.record_error(gap(), Instant::now());
        machine.begin_sync().unwrap();
        machine.mark_synced().unwrap();

        machine.record_success();
        assert_eq!(machine.consecutive_errors(), 0);
    }

    #[test]
    fn test_success_forgets_errors_in_window() {
        let mut machine = SyncStateMachine::new(1, Duration::from_secs(60));
        let now = Instant::now();
        machine.begin_sync().unwrap();
        assert_eq!(machine.record_error(gap(), now), ErrorDisposition::Resync);

        machine.begin_sync().unwrap();
        machine.mark_synced().unwrap();
        machine.record_success();

        assert_eq!(machine.record_error(gap(), now), ErrorDisposition::Resync);
        assert!(!machine.is_degraded());
        assert_eq!(machine.consecutive_errors(), 1);
    }

    #[test]
    fn test_error_window_expires_old_errors() {
        let mut window = ErrorWindow::new(1, Duration::from_secs(10));
        let start = Instant::now();

        assert!(!window.record(start));
        // Second error falls outside the window of the first.
        assert!(!window.record(start + Duration::from_secs(11)));
        assert_eq!(window.count(start + Duration::from_secs(11)), 1);
        assert!(window.record(start + Duration::from_secs(12)));
    }
}
