//! Auto-save debouncing: an edit arms a deadline, a later edit inside the window pushes it back,
//! and the save runs once when the deadline passes with no further edits.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<DateTime<Utc>>,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::milliseconds(i64::try_from(window_ms).unwrap_or(i64::MAX / 2)),
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arms (or re-arms) the deadline `window` after `now`.
    pub fn schedule(&mut self, now: DateTime<Utc>) {
        self.deadline = Some(
            now.checked_add_signed(self.window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Returns `true` exactly once per quiet period: when a deadline is armed and `now` has
    /// reached it. The deadline is disarmed on firing.
    pub fn fire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
