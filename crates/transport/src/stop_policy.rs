// SPDX-License-Identifier: MIT

//! Per-component circuit breaker (§4.D): after too many consecutive
//! transport errors the processor stops polling that component until a
//! cooldown elapses, rather than hammering a transport that's down.

use dproc_core::Clock;
use parking_lot::Mutex;
use std::time::Duration;

pub const DEFAULT_CONSECUTIVE_ERROR_THRESHOLD: u32 = 10;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15 * 60);

struct State {
    consecutive_errors: u32,
    tripped_at_ms: Option<u64>,
}

/// Tracks consecutive errors for one component and gates polling while the
/// breaker is tripped. Generic over [`Clock`] so cooldown expiry is
/// testable without real sleeps, matching the rest of the workspace's
/// everything-goes-through-`Clock` convention.
pub struct StopPolicy<C: Clock> {
    threshold: u32,
    cooldown: Duration,
    clock: C,
    state: Mutex<State>,
}

impl<C: Clock> StopPolicy<C> {
    pub fn new(clock: C, threshold: u32, cooldown: Duration) -> Self {
        Self { threshold, cooldown, clock, state: Mutex::new(State { consecutive_errors: 0, tripped_at_ms: None }) }
    }

    pub fn with_defaults(clock: C) -> Self {
        Self::new(clock, DEFAULT_CONSECUTIVE_ERROR_THRESHOLD, DEFAULT_COOLDOWN)
    }

    /// Record a transport error. Trips the breaker once the consecutive
    /// count reaches the threshold.
    pub fn record_error(&self) {
        let mut state = self.state.lock();
        state.consecutive_errors += 1;
        if state.consecutive_errors >= self.threshold && state.tripped_at_ms.is_none() {
            state.tripped_at_ms = Some(self.clock.epoch_ms());
        }
    }

    /// A successful call resets the breaker entirely.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_errors = 0;
        state.tripped_at_ms = None;
    }

    /// Whether this component may be polled right now. If the cooldown has
    /// elapsed since the trip, the breaker resets and healthiness resumes.
    pub fn is_healthy(&self) -> bool {
        let mut state = self.state.lock();
        let Some(tripped_at_ms) = state.tripped_at_ms else { return true };
        let elapsed = self.clock.epoch_ms().saturating_sub(tripped_at_ms);
        if elapsed >= self.cooldown.as_millis() as u64 {
            state.consecutive_errors = 0;
            state.tripped_at_ms = None;
            true
        } else {
            false
        }
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.state.lock().consecutive_errors
    }
}

#[cfg(test)]
#[path = "stop_policy_tests.rs"]
mod tests;
