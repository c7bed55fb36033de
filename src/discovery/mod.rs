// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LAN discovery of climate units.
//!
//! A scan broadcasts the cleartext probe `{"t":"scan"}` to each supplied
//! broadcast address and collects the encrypted `dev` replies until the
//! discovery timeout expires. Devices are identified by MAC and remembered
//! across scans, so registered [`DiscoveryListener`]s hear about a new MAC
//! once through [`DiscoveryListener::device_found`] and about address
//! changes through [`DiscoveryListener::device_update`].
//!
//! The caller supplies the broadcast addresses; interfaces are not
//! enumerated here.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use amberac_lib::discovery::{Discovery, DiscoveryListener, DiscoveryOptions};
//! use amberac_lib::types::DeviceInfo;
//!
//! struct Printer;
//!
//! #[async_trait::async_trait]
//! impl DiscoveryListener for Printer {
//!     async fn device_found(&self, info: &DeviceInfo) {
//!         println!("found {info}");
//!     }
//! }
//!
//! # async fn example() -> amberac_lib::Result<()> {
//! let discovery = Discovery::new(DiscoveryOptions::new());
//! discovery.add_listener(Arc::new(Printer));
//!
//! let devices = discovery.scan(&["192.168.1.255".parse().unwrap()]).await?;
//! println!("{} devices answered", devices.len());
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::net::UdpSocket;

use crate::error::{ProtocolError, Result};
use crate::protocol::Response;
use crate::protocol::message::{self, SCAN_PAYLOAD};
use crate::subscription::{IdGenerator, SubscriptionId};
use crate::types::{DEFAULT_PORT, DeviceInfo};

/// Default time to collect scan replies.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(8);

const MAX_DATAGRAM: usize = 65_536;

/// Options for a discovery scan.
///
/// # Examples
///
/// ```
/// use amberac_lib::discovery::DiscoveryOptions;
/// use std::time::Duration;
///
/// let options = DiscoveryOptions::new().with_timeout(Duration::from_secs(2));
/// assert_eq!(options.port(), 7000);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryOptions {
    /// How long to collect replies.
    timeout: Option<Duration>,
    /// Port the probe is sent to.
    port: Option<u16>,
}

impl DiscoveryOptions {
    /// Creates options with default settings: 8 seconds on port 7000.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long replies are collected.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the port the probe is sent to.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Returns the collection window.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_DISCOVERY_TIMEOUT)
    }

    /// Returns the probe port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Receiver of discovery events.
///
/// Listeners are awaited one after another, in registration order.
#[async_trait]
pub trait DiscoveryListener: Send + Sync {
    /// Called once for every MAC not seen before.
    async fn device_found(&self, info: &DeviceInfo);

    /// Called when a known MAC answers from a new address.
    async fn device_update(&self, info: &DeviceInfo) {
        let _ = info;
    }
}

/// A device seen by at least one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenDevice {
    /// The latest identity reported.
    pub info: DeviceInfo,
    /// When the MAC first answered.
    pub first_seen: DateTime<Utc>,
    /// When the MAC last answered.
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Found,
    Updated,
}

/// Broadcast scanner with a listener registry.
pub struct Discovery {
    options: DiscoveryOptions,
    ids: IdGenerator,
    listeners: RwLock<BTreeMap<SubscriptionId, Arc<dyn DiscoveryListener>>>,
    known: RwLock<HashMap<String, SeenDevice>>,
}

impl Discovery {
    /// Creates a scanner.
    #[must_use]
    pub fn new(options: DiscoveryOptions) -> Self {
        Self {
            options,
            ids: IdGenerator::new(),
            listeners: RwLock::new(BTreeMap::new()),
            known: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the scan options.
    #[must_use]
    pub fn options(&self) -> DiscoveryOptions {
        self.options
    }

    /// Registers a listener.
    pub fn add_listener(&self, listener: Arc<dyn DiscoveryListener>) -> SubscriptionId {
        let id = self.ids.next();
        self.listeners.write().insert(id, listener);
        id
    }

    /// Removes a listener. Returns true if it was registered.
    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }

    /// Returns every device seen so far.
    #[must_use]
    pub fn devices(&self) -> Vec<SeenDevice> {
        self.known.read().values().cloned().collect()
    }

    /// Returns the record for one MAC.
    #[must_use]
    pub fn device(&self, mac: &str) -> Option<SeenDevice> {
        self.known.read().get(mac).cloned()
    }

    /// Broadcasts a scan and returns the devices that answered.
    ///
    /// An empty address list probes the limited broadcast address.
    /// Listeners are notified after the collection window closes, in reply
    /// order. Replies that fail to decode are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the broadcast socket cannot be opened.
    pub async fn scan(&self, broadcast: &[IpAddr]) -> Result<Vec<DeviceInfo>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(ProtocolError::from)?;
        socket.set_broadcast(true).map_err(ProtocolError::from)?;

        let targets: Vec<IpAddr> = if broadcast.is_empty() {
            vec![IpAddr::V4(Ipv4Addr::BROADCAST)]
        } else {
            broadcast.to_vec()
        };

        tracing::info!(
            targets = ?targets,
            timeout_ms = self.options.timeout().as_millis(),
            "Starting device discovery"
        );
        for ip in &targets {
            let target = SocketAddr::new(*ip, self.options.port());
            if let Err(error) = socket.send_to(SCAN_PAYLOAD, target).await {
                tracing::warn!(%target, %error, "Failed to send scan");
            }
        }

        let found = collect_replies(&socket, self.options.timeout()).await;
        tracing::info!(count = found.len(), "Discovery finished");

        for info in &found {
            match self.record(info) {
                Some(Change::Found) => {
                    tracing::info!(mac = info.mac(), ip = %info.ip(), "Found device");
                    for listener in self.listener_snapshot() {
                        listener.device_found(info).await;
                    }
                }
                Some(Change::Updated) => {
                    tracing::info!(mac = info.mac(), ip = %info.ip(), "Device moved");
                    for listener in self.listener_snapshot() {
                        listener.device_update(info).await;
                    }
                }
                None => {}
            }
        }
        Ok(found)
    }

    fn listener_snapshot(&self) -> Vec<Arc<dyn DiscoveryListener>> {
        self.listeners.read().values().cloned().collect()
    }

    /// Remembers a reply and returns what changed.
    fn record(&self, info: &DeviceInfo) -> Option<Change> {
        let now = Utc::now();
        let mut known = self.known.write();
        if let Some(seen) = known.get_mut(info.mac()) {
            seen.last_seen = now;
            if seen.info.addr() == info.addr() {
                return None;
            }
            seen.info = info.clone();
            return Some(Change::Updated);
        }
        known.insert(
            info.mac().to_string(),
            SeenDevice {
                info: info.clone(),
                first_seen: now,
                last_seen: now,
            },
        );
        Some(Change::Found)
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery")
            .field("options", &self.options)
            .field("listeners", &self.listeners.read().len())
            .field("known", &self.known.read().len())
            .finish()
    }
}

/// Collects distinct scan replies until the window closes.
async fn collect_replies(socket: &UdpSocket, window: Duration) -> Vec<DeviceInfo> {
    let deadline = tokio::time::Instant::now() + window;
    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    loop {
        let (len, from) = match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await
        {
            Err(_) => break,
            Ok(Ok(received)) => received,
            Ok(Err(error)) => {
                tracing::debug!(%error, "Discovery receive failed");
                continue;
            }
        };

        match message::decode(&buf[..len], None) {
            Ok(Response::DeviceFound(reply)) if !reply.mac.is_empty() => {
                let info = reply.into_device_info(from.ip(), from.port());
                tracing::debug!(mac = info.mac(), %from, "Scan reply");
                if seen.insert(info.mac().to_string()) {
                    found.push(info);
                }
            }
            Ok(other) => tracing::trace!(%from, kind = ?other.kind(), "Ignoring reply"),
            Err(error) => tracing::trace!(%from, %error, "Dropping datagram"),
        }
    }
    found
}
