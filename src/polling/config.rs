// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polling schedule and failure detection settings.

use std::time::Duration;

/// Default time between two state reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default number of consecutive errors before a device is unavailable.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 2;

/// Default longest gap between two answers before a read is suspicious.
pub const DEFAULT_MAX_RESPONSE_INTERVAL: Duration = Duration::from_secs(600);

/// Settings for a [`PollingCoordinator`](super::PollingCoordinator).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use amberac_lib::polling::PollingConfig;
///
/// let config = PollingConfig::default()
///     .with_interval(Duration::from_secs(30))
///     .with_error_threshold(3);
/// assert_eq!(config.error_threshold(), 3);
/// assert_eq!(config.max_response_interval(), Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    interval: Duration,
    error_threshold: u32,
    max_response_interval: Duration,
}

impl PollingConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time between two state reads.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets how many consecutive errors make a device unavailable.
    ///
    /// A threshold of zero is treated as one.
    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold.max(1);
        self
    }

    /// Sets the longest expected gap between two answers.
    #[must_use]
    pub fn with_max_response_interval(mut self, interval: Duration) -> Self {
        self.max_response_interval = interval;
        self
    }

    /// Returns the time between two state reads.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns the consecutive error threshold.
    #[must_use]
    pub fn error_threshold(&self) -> u32 {
        self.error_threshold
    }

    /// Returns the longest expected gap between two answers.
    #[must_use]
    pub fn max_response_interval(&self) -> Duration {
        self.max_response_interval
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            max_response_interval: DEFAULT_MAX_RESPONSE_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threshold_is_clamped() {
        assert_eq!(PollingConfig::new().with_error_threshold(0).error_threshold(), 1);
    }
}
