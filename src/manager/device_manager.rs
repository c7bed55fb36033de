// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery-driven registry of polled devices.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::device::Device;
use crate::discovery::{Discovery, DiscoveryListener};
use crate::polling::PollingCoordinator;
use crate::subscription::{IdGenerator, SubscriptionId};
use crate::types::DeviceInfo;

use super::config::ManagerConfig;

type AddedCallback = Arc<dyn Fn(&Arc<PollingCoordinator>) + Send + Sync>;

/// Turns discovered units into bound, polled devices.
///
/// Register the manager as a [`DiscoveryListener`] (or let
/// [`DeviceManager::discovery`] do it). Every new MAC becomes a [`Device`]
/// that is bound, wrapped in a [`PollingCoordinator`] and refreshed once.
/// Devices that fail to bind are kept; their coordinator reports them as
/// not bound.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use amberac_lib::manager::{DeviceManager, ManagerConfig};
///
/// # async fn example() -> amberac_lib::Result<()> {
/// let manager = Arc::new(DeviceManager::new(ManagerConfig::default()));
/// manager.on_device_added(|coordinator| {
///     println!("added {}", coordinator.device().info());
/// });
///
/// let discovery = manager.discovery();
/// discovery.scan(&["192.168.1.255".parse().unwrap()]).await?;
///
/// for mac in manager.macs() {
///     if let Some(coordinator) = manager.coordinator(&mac) {
///         let _ = coordinator.refresh().await;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct DeviceManager {
    config: ManagerConfig,
    coordinators: RwLock<HashMap<String, Arc<PollingCoordinator>>>,
    ids: IdGenerator,
    added: RwLock<BTreeMap<SubscriptionId, AddedCallback>>,
}

impl DeviceManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            coordinators: RwLock::new(HashMap::new()),
            ids: IdGenerator::new(),
            added: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the manager settings.
    #[must_use]
    pub fn config(&self) -> ManagerConfig {
        self.config
    }

    /// Creates a discovery that reports to this manager.
    #[must_use]
    pub fn discovery(self: &Arc<Self>) -> Discovery {
        let discovery = Discovery::new(self.config.discovery());
        discovery.add_listener(Arc::clone(self) as Arc<dyn DiscoveryListener>);
        discovery
    }

    /// Registers a callback run after a new device was bound and refreshed.
    pub fn on_device_added<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Arc<PollingCoordinator>) + Send + Sync + 'static,
    {
        let id = self.ids.next();
        self.added.write().insert(id, Arc::new(callback));
        id
    }

    /// Removes a callback. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.added.write().remove(&id).is_some()
    }

    /// Returns the coordinator of a device.
    #[must_use]
    pub fn coordinator(&self, mac: &str) -> Option<Arc<PollingCoordinator>> {
        self.coordinators.read().get(mac).cloned()
    }

    /// Returns the MACs of all managed devices, sorted.
    #[must_use]
    pub fn macs(&self) -> Vec<String> {
        let mut macs: Vec<String> = self.coordinators.read().keys().cloned().collect();
        macs.sort();
        macs
    }

    /// Returns the number of managed devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coordinators.read().len()
    }

    /// Returns true if no device is managed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coordinators.read().is_empty()
    }

    /// Stops managing a device and returns its coordinator.
    pub fn remove(&self, mac: &str) -> Option<Arc<PollingCoordinator>> {
        let removed = self.coordinators.write().remove(mac);
        if removed.is_some() {
            tracing::info!(%mac, "Device removed");
        }
        removed
    }

    async fn add(&self, info: &DeviceInfo) {
        let device = Arc::new(Device::new(info.clone(), self.config.device()));
        if let Err(error) = device.bind(None).await {
            tracing::error!(%error, device = %info, "Failed to bind device");
        }

        tracing::debug!(mac = info.mac(), addr = %info.addr(), "Adding device");
        let coordinator = Arc::new(PollingCoordinator::new(device, self.config.polling()));
        self.coordinators
            .write()
            .insert(info.mac().to_string(), Arc::clone(&coordinator));
        // Failures are logged by the coordinator
        let _ = coordinator.refresh().await;

        let callbacks: Vec<AddedCallback> = self.added.read().values().cloned().collect();
        for callback in callbacks {
            callback(&coordinator);
        }
    }
}

#[async_trait]
impl DiscoveryListener for DeviceManager {
    async fn device_found(&self, info: &DeviceInfo) {
        let known = self.coordinators.read().contains_key(info.mac());
        if known {
            self.device_update(info).await;
            return;
        }
        self.add(info).await;
    }

    async fn device_update(&self, info: &DeviceInfo) {
        let Some(coordinator) = self.coordinator(info.mac()) else {
            return;
        };
        coordinator.device().set_ip(info.ip()).await;
        let _ = coordinator.refresh().await;
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("config", &self.config)
            .field("devices", &self.macs())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::net::UdpSocket;

    use super::*;
    use crate::DeviceConfig;
    use crate::polling::Availability;

    fn manager() -> DeviceManager {
        let device = DeviceConfig::default()
            .with_timeout(Duration::from_millis(20))
            .with_bind_timeout(Duration::from_millis(20));
        DeviceManager::new(ManagerConfig::default().with_device(device))
    }

    async fn silent_info() -> (DeviceInfo, UdpSocket) {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let info = DeviceInfo::new("127.0.0.1".parse().unwrap(), "aabbccddeeff")
            .with_port(silent.local_addr().unwrap().port());
        (info, silent)
    }

    #[tokio::test]
    async fn unbound_device_is_still_registered() {
        let manager = manager();
        let added = Arc::new(AtomicUsize::new(0));
        let added_clone = Arc::clone(&added);
        manager.on_device_added(move |coordinator| {
            assert_eq!(coordinator.availability(), Availability::NotBound);
            added_clone.fetch_add(1, Ordering::SeqCst);
        });

        let (info, _silent) = silent_info().await;
        manager.device_found(&info).await;

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.macs(), vec!["aabbccddeeff".to_string()]);
        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert!(!manager.coordinator("aabbccddeeff").unwrap().device().is_bound());
    }

    #[tokio::test]
    async fn update_moves_known_device() {
        let manager = manager();
        let (info, _silent) = silent_info().await;
        manager.device_found(&info).await;

        let mut moved = info.clone();
        moved.set_ip("127.0.0.2".parse().unwrap());
        manager.device_update(&moved).await;

        let coordinator = manager.coordinator("aabbccddeeff").unwrap();
        assert_eq!(coordinator.device().info().ip().to_string(), "127.0.0.2");
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn update_for_unknown_device_is_ignored() {
        let manager = manager();
        let (info, _silent) = silent_info().await;
        manager.device_update(&info).await;
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn remove_forgets_device() {
        let manager = manager();
        let (info, _silent) = silent_info().await;
        manager.device_found(&info).await;

        assert!(manager.remove("aabbccddeeff").is_some());
        assert!(manager.remove("aabbccddeeff").is_none());
        assert!(manager.coordinator("aabbccddeeff").is_none());
    }
}
