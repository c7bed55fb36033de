// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device timeouts.

use std::time::Duration;

/// Default deadline for status and command round trips.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default deadline for a single bind trial.
pub const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeouts used by a [`Device`](super::Device).
///
/// The bind timeout applies to each cipher trial separately and should be
/// short, so a wrong guess fails fast and the next variant is tried.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use amberac_lib::DeviceConfig;
///
/// let config = DeviceConfig::default()
///     .with_timeout(Duration::from_secs(30))
///     .with_bind_timeout(Duration::from_secs(3));
/// assert_eq!(config.timeout(), Duration::from_secs(30));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    timeout: Duration,
    bind_timeout: Duration,
}

impl DeviceConfig {
    /// Creates a configuration with default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the round trip deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the per-trial bind deadline.
    #[must_use]
    pub fn with_bind_timeout(mut self, bind_timeout: Duration) -> Self {
        self.bind_timeout = bind_timeout;
        self
    }

    /// Returns the round trip deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the per-trial bind deadline.
    #[must_use]
    pub fn bind_timeout(&self) -> Duration {
        self.bind_timeout
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            bind_timeout: DEFAULT_BIND_TIMEOUT,
        }
    }
}
