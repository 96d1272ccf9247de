//! Per-key fixed-window bucket.

use parking_lot::Mutex;
use std::time::Duration;

use super::clock::Clock;
use super::decision::{Decision, Quota};

/// Mutable window state, only touched under the bucket lock.
#[derive(Debug)]
struct WindowState {
    /// Origin of tick computation for this key
    window_start: u64,
    /// Index of the most recently serviced window
    last_tick: u64,
    /// Admissions left in the window identified by `last_tick`
    available: u64,
}

/// Fixed-window admission counter for a single key.
///
/// Windows are derived from elapsed time on every access rather than
/// refilled by a timer, so an idle bucket costs nothing and a bucket that
/// skipped many windows resumes with exactly one window's worth of tokens.
#[derive(Debug)]
pub struct Bucket {
    state: Mutex<WindowState>,
    window_nanos: u64,
}

impl Bucket {
    /// Create a full bucket whose first window starts at `now`.
    pub fn new(capacity: u64, window: Duration, now: u64) -> Self {
        let window_nanos = u64::try_from(window.as_nanos()).unwrap_or(u64::MAX).max(1);
        Self {
            state: Mutex::new(WindowState {
                window_start: now,
                last_tick: 0,
                // Tick 0 never triggers the refill branch, so fill here.
                available: capacity,
            }),
            window_nanos,
        }
    }

    /// Try to consume one admission.
    ///
    /// The clock is read inside the critical section so that concurrent
    /// callers on the same key observe time in lock order.
    pub fn take(&self, capacity: u64, clock: &dyn Clock) -> Decision {
        let mut state = self.state.lock();
        let now = clock.now_nanos();

        if now < state.window_start {
            state.window_start = now;
            state.last_tick = 0;
        }

        let curr_tick = (now - state.window_start) / self.window_nanos;
        let reset_at = state
            .window_start
            .saturating_add(curr_tick.saturating_add(1).saturating_mul(self.window_nanos));

        if state.last_tick < curr_tick {
            state.available = capacity;
            state.last_tick = curr_tick;
        }

        if state.available > 0 {
            state.available -= 1;
            Decision::Allowed(Quota {
                limit: capacity,
                remaining: state.available,
                reset_at,
            })
        } else {
            Decision::Limited(Quota {
                limit: capacity,
                remaining: 0,
                reset_at,
            })
        }
    }

    /// Start of the most recently serviced window.
    pub fn last_activity(&self) -> u64 {
        let state = self.state.lock();
        state
            .window_start
            .saturating_add(state.last_tick.saturating_mul(self.window_nanos))
    }
}
