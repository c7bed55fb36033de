// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity of a device on the network.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Default UDP port devices listen on.
pub const DEFAULT_PORT: u16 = 7000;

/// Network identity of a device, as reported by a scan response.
///
/// The MAC is the identity key. Everything else is fixed once received,
/// except the IP which a later scan may refresh.
///
/// # Examples
///
/// ```
/// use amberac_lib::types::DeviceInfo;
///
/// let info = DeviceInfo::new("192.168.1.40".parse().unwrap(), "f4911e7aca59")
///     .with_name("Living room");
/// assert_eq!(info.port(), 7000);
/// assert_eq!(info.to_string(), "Device: Living room @ 192.168.1.40:7000 (mac: f4911e7aca59)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    ip: IpAddr,
    port: u16,
    mac: String,
    name: String,
    brand: Option<String>,
    model: Option<String>,
    version: Option<String>,
}

impl DeviceInfo {
    /// Creates an identity on the default port; the name defaults to the MAC.
    #[must_use]
    pub fn new(ip: IpAddr, mac: impl Into<String>) -> Self {
        let mac = mac.into();
        Self {
            ip,
            port: DEFAULT_PORT,
            name: mac.clone(),
            mac,
            brand: None,
            model: None,
            version: None,
        }
    }

    /// Sets the UDP port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the optional vendor metadata.
    #[must_use]
    pub fn with_vendor(
        mut self,
        brand: Option<String>,
        model: Option<String>,
        version: Option<String>,
    ) -> Self {
        self.brand = brand;
        self.model = model;
        self.version = version;
        self
    }

    /// Returns the IP address.
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Returns the UDP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the socket address of the device.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Returns the MAC, the device's identity key.
    #[must_use]
    pub fn mac(&self) -> &str {
        &self.mac
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the brand reported by the device.
    #[must_use]
    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }

    /// Returns the model reported by the device.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Returns the module version reported in the scan response.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Refreshes the IP address. Returns true if it changed.
    pub fn set_ip(&mut self, ip: IpAddr) -> bool {
        if self.ip == ip {
            return false;
        }
        self.ip = ip;
        true
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device: {} @ {}:{} (mac: {})",
            self.name, self.ip, self.port, self.mac
        )
    }
}
