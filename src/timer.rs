// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;

/// Counts housekeeping ticks a Block-Ack flow has been idle. Used to decide
/// when to tear a session down because the missing frame never arrived.
///
/// The countdown is logical: the owner calls `tick()` once per housekeeping
/// interval and `reset()` whenever a frame for the flow is successfully
/// processed. Expiry is detected on the first tick at or past the timeout,
/// a soft deadline rather than a hard real-time guarantee.
pub struct InactivityTimer {
    /// Ticks of idleness tolerated before the session expires. Zero disables
    /// the timer.
    timeout_ticks: u32,

    /// Ticks since the last successfully processed frame.
    ticks_idle: u32,
}

impl InactivityTimer {
    pub fn start(timeout_ticks: u32) -> Self {
        Self { timeout_ticks, ticks_idle: 0 }
    }

    /// Records activity on the flow, restarting the countdown.
    pub fn reset(&mut self) {
        self.ticks_idle = 0;
    }

    /// Records one elapsed housekeeping interval.
    pub fn tick(&mut self) {
        self.ticks_idle = self.ticks_idle.saturating_add(1);
    }

    pub fn expired(&self) -> bool {
        self.timeout_ticks != 0 && self.ticks_idle >= self.timeout_ticks
    }
}

impl fmt::Debug for InactivityTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InactivityTimer")
            .field("timeout_ticks", &self.timeout_ticks)
            .field("ticks_idle", &self.ticks_idle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TIMEOUT_TICKS: u32 = 5;

    #[test]
    fn uninterrupted_idle_period() {
        let mut timer = InactivityTimer::start(TEST_TIMEOUT_TICKS);
        // About to expire but not yet.
        for _ in 0..TEST_TIMEOUT_TICKS - 1 {
            timer.tick();
        }
        assert!(!timer.expired());
        // Any further tick expires the session.
        timer.tick();
        assert!(timer.expired());
    }

    #[test]
    fn activity_restarts_countdown() {
        let mut timer = InactivityTimer::start(TEST_TIMEOUT_TICKS);
        for _ in 0..TEST_TIMEOUT_TICKS - 1 {
            timer.tick();
        }
        assert!(!timer.expired());

        // A frame arrives, resetting the countdown.
        timer.reset();
        timer.tick();
        assert!(!timer.expired());
        for _ in 0..TEST_TIMEOUT_TICKS - 1 {
            timer.tick();
        }
        assert!(timer.expired());
    }

    #[test]
    fn zero_timeout_never_expires() {
        let mut timer = InactivityTimer::start(0);
        for _ in 0..1000 {
            timer.tick();
        }
        assert!(!timer.expired());
    }
}
