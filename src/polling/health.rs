// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-path failure accounting.
//!
//! Single dropped datagrams are normal for these units, so one timeout
//! never makes a device unavailable. Errors are counted and the device is
//! only reported as failed once the count reaches the threshold while the
//! previous cycle was still healthy. A read that succeeds after an
//! unusually long silence counts as an error too, at most once per
//! polling interval. The next healthy cycle, or any command result,
//! clears the failure.

use std::time::{Duration, Instant};

use super::PollingConfig;

/// Whether the read path currently considers the device reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    /// The last cycle succeeded or failed within tolerance.
    #[default]
    Available,
    /// Consecutive errors reached the threshold.
    Unavailable,
    /// No session key could be negotiated.
    NotBound,
}

impl Availability {
    /// Returns true if the device is available.
    #[must_use]
    pub fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }
}

/// Snapshot of a coordinator's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingHealth {
    /// Consecutive read errors.
    pub error_count: u32,
    /// When the device last answered a read or command.
    pub last_response: Instant,
    /// When a stale read was last counted as an error.
    pub last_error: Option<Instant>,
    /// Current determination.
    pub availability: Availability,
}

/// Result of accounting one read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    /// The cycle counts as a success.
    Healthy,
    /// The device just became unavailable.
    Escalated,
    /// The device was already unavailable and still is.
    StillFailing,
}

/// Mutable counters behind a [`PollingHealth`] snapshot.
#[derive(Debug, Clone)]
pub(crate) struct HealthTracker {
    error_count: u32,
    last_response: Instant,
    last_error: Option<Instant>,
    availability: Availability,
}

impl HealthTracker {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            error_count: 0,
            last_response: now,
            last_error: None,
            availability: Availability::Available,
        }
    }

    pub(crate) fn snapshot(&self) -> PollingHealth {
        PollingHealth {
            error_count: self.error_count,
            last_response: self.last_response,
            last_error: self.last_error,
            availability: self.availability,
        }
    }

    pub(crate) fn availability(&self) -> Availability {
        self.availability
    }

    /// Binding prerequisites are missing. Fails the cycle without counting.
    pub(crate) fn record_not_bound(&mut self) -> CycleOutcome {
        let outcome = if self.availability == Availability::NotBound {
            CycleOutcome::StillFailing
        } else {
            CycleOutcome::Escalated
        };
        self.availability = Availability::NotBound;
        outcome
    }

    /// The read timed out.
    pub(crate) fn record_timeout(&mut self, now: Instant, config: &PollingConfig) -> CycleOutcome {
        self.error_count = self.error_count.saturating_add(1);
        self.settle(now, config)
    }

    /// The device answered the read.
    ///
    /// Returns the outcome and, if the answer came after an unusually long
    /// silence, the elapsed time.
    pub(crate) fn record_success(
        &mut self,
        now: Instant,
        config: &PollingConfig,
    ) -> (CycleOutcome, Option<Duration>) {
        let elapsed = now.saturating_duration_since(self.last_response);
        let stale = elapsed >= config.max_response_interval();
        if stale {
            // Count one error per stale interval
            let counted_recently = self.last_error.is_some_and(|last| {
                now.checked_sub(config.interval())
                    .is_some_and(|window_start| window_start < last)
            });
            if !counted_recently {
                self.last_error = Some(now);
                self.error_count = self.error_count.saturating_add(1);
            }
        } else {
            self.error_count = 0;
        }
        (self.settle(now, config), stale.then_some(elapsed))
    }

    /// A command result arrived outside the read path.
    ///
    /// Clears a read failure. A device without a session key stays
    /// [`Availability::NotBound`].
    pub(crate) fn record_response(&mut self, now: Instant) {
        self.error_count = 0;
        self.last_response = now;
        if self.availability == Availability::Unavailable {
            self.availability = Availability::Available;
        }
    }

    fn settle(&mut self, now: Instant, config: &PollingConfig) -> CycleOutcome {
        // Every cycle restarts the staleness clock, whatever its outcome
        self.last_response = now;
        if self.error_count >= config.error_threshold() {
            let was_available = self.availability.is_available();
            self.availability = Availability::Unavailable;
            return if was_available {
                CycleOutcome::Escalated
            } else {
                CycleOutcome::StillFailing
            };
        }
        self.availability = Availability::Available;
        CycleOutcome::Healthy
    }
}
