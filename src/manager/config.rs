// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Settings applied to every device the manager creates.

use crate::device::DeviceConfig;
use crate::discovery::DiscoveryOptions;
use crate::polling::PollingConfig;

/// Bundle of device, polling and discovery settings.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use amberac_lib::DeviceConfig;
/// use amberac_lib::manager::ManagerConfig;
/// use amberac_lib::polling::PollingConfig;
///
/// let config = ManagerConfig::default()
///     .with_device(DeviceConfig::default().with_timeout(Duration::from_secs(30)))
///     .with_polling(PollingConfig::default().with_error_threshold(3));
/// assert_eq!(config.polling().error_threshold(), 3);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagerConfig {
    device: DeviceConfig,
    polling: PollingConfig,
    discovery: DiscoveryOptions,
}

impl ManagerConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeouts for created devices.
    #[must_use]
    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    /// Sets the polling settings for created coordinators.
    #[must_use]
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Sets the options of discoveries created by the manager.
    #[must_use]
    pub fn with_discovery(mut self, discovery: DiscoveryOptions) -> Self {
        self.discovery = discovery;
        self
    }

    /// Returns the device timeouts.
    #[must_use]
    pub fn device(&self) -> DeviceConfig {
        self.device
    }

    /// Returns the polling settings.
    #[must_use]
    pub fn polling(&self) -> PollingConfig {
        self.polling
    }

    /// Returns the discovery options.
    #[must_use]
    pub fn discovery(&self) -> DiscoveryOptions {
        self.discovery
    }
}
