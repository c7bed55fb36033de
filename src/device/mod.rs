// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A single climate unit on the network.
//!
//! A [`Device`] aggregates the unit's identity, its session cipher, the
//! local [`DeviceState`] and the UDP transport. It is created from a
//! discovered [`DeviceInfo`], bound once, and then read from and pushed to
//! until the caller drops it.
//!
//! # Examples
//!
//! ```no_run
//! use amberac_lib::{Device, DeviceConfig};
//! use amberac_lib::types::{DeviceInfo, Mode};
//!
//! # async fn example() -> amberac_lib::Result<()> {
//! let info = DeviceInfo::new("192.168.1.40".parse().unwrap(), "f4911e7aca59");
//! let device = Device::new(info, DeviceConfig::default());
//!
//! device.bind(None).await?;
//! device.update_state().await?;
//!
//! device.modify_state(|state| {
//!     state.set_power(true);
//!     state.set_mode(Mode::Cool);
//!     state.set_target_temperature(22)
//! })?;
//! device.push_state_update().await?;
//! # Ok(())
//! # }
//! ```

mod binding;
mod config;

pub use binding::BindPhase;
pub use config::{DEFAULT_BIND_TIMEOUT, DEFAULT_TIMEOUT, DeviceConfig};

use std::net::IpAddr;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::cipher::{Cipher, CipherVersion};
use crate::error::{Error, Result};
use crate::protocol::{DeviceTransport, Request, ResponseHandler};
use crate::state::{BUZZER_OFF, DeviceState, FIRMWARE_ID, PropertyStore};
use crate::subscription::{CallbackRegistry, SubscriptionId};
use crate::types::DeviceInfo;

/// Parts of a device shared with its transport's receive task.
#[derive(Debug)]
struct Shared {
    info: RwLock<DeviceInfo>,
    cipher: OnceLock<Cipher>,
    state: RwLock<DeviceState>,
    callbacks: CallbackRegistry,
}

impl ResponseHandler for Shared {
    fn session(&self) -> Option<&Cipher> {
        self.cipher.get()
    }

    fn handle_status(&self, values: Map<String, Value>) {
        let snapshot = {
            let mut state = self.state.write();
            state.apply_reported(values);
            state.properties().clone()
        };
        self.callbacks.dispatch_state_updated(&snapshot);
    }

    fn handle_result(&self, mut values: Map<String, Value>) {
        values.remove(BUZZER_OFF);
        self.state.write().apply_reported(values.clone());
        self.callbacks.dispatch_command_result(&values);
    }
}

/// A climate unit reachable over UDP.
///
/// Reads and pushes on one device are serialized: each holds the device's
/// session lock for its whole round trip. Different devices are fully
/// independent.
pub struct Device {
    shared: Arc<Shared>,
    config: DeviceConfig,
    /// Held for the duration of every network operation.
    session: tokio::sync::Mutex<Option<Arc<DeviceTransport>>>,
}

impl Device {
    /// Creates an unbound device. No I/O happens until the first operation.
    #[must_use]
    pub fn new(info: DeviceInfo, config: DeviceConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                info: RwLock::new(info),
                cipher: OnceLock::new(),
                state: RwLock::new(DeviceState::new()),
                callbacks: CallbackRegistry::new(),
            }),
            config,
            session: tokio::sync::Mutex::new(None),
        }
    }

    // ========== Identity ==========

    /// Returns a copy of the device identity.
    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        self.shared.info.read().clone()
    }

    /// Returns the MAC, the device's identity key.
    #[must_use]
    pub fn mac(&self) -> String {
        self.shared.info.read().mac().to_string()
    }

    /// Returns the timeouts this device uses.
    #[must_use]
    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    /// Refreshes the device's IP address.
    ///
    /// If the address changed, the open transport is closed; the next
    /// operation reconnects to the new address. Returns true on change.
    pub async fn set_ip(&self, ip: IpAddr) -> bool {
        let changed = self.shared.info.write().set_ip(ip);
        if changed {
            tracing::info!(mac = %self.mac(), %ip, "Device address changed");
            *self.session.lock().await = None;
        }
        changed
    }

    // ========== Binding ==========

    /// Returns the session cipher, once bound.
    #[must_use]
    pub fn cipher(&self) -> Option<Cipher> {
        self.shared.cipher.get().cloned()
    }

    /// Returns true once a session key is set.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.shared.cipher.get().is_some()
    }

    /// Binds with an already known session key. No network I/O.
    ///
    /// # Errors
    ///
    /// Returns `Error::Value` if the key is not 16 bytes long, or
    /// `Error::AlreadyBound` if a session key is already set.
    pub fn bind_with_key(&self, version: CipherVersion, key: &str) -> Result<()> {
        let cipher = Cipher::new(version, key)?;
        self.shared
            .cipher
            .set(cipher)
            .map_err(|_| Error::AlreadyBound)?;
        tracing::info!(mac = %self.mac(), cipher = %version, "Device bound with provided key");
        Ok(())
    }

    /// Negotiates a session key with the device.
    ///
    /// Without an explicit variant V1 is tried first and V2 after V1 times
    /// out. Each trial waits for the configured bind timeout.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyBound` if a key is already set,
    /// `Error::Timeout` if every trial timed out, and `Error::NotBound` if
    /// the device answered without a usable key.
    pub async fn bind(&self, version: Option<CipherVersion>) -> Result<CipherVersion> {
        let mut session = self.session.lock().await;
        if self.is_bound() {
            return Err(Error::AlreadyBound);
        }
        self.negotiate(&mut session, version).await
    }

    async fn negotiate(
        &self,
        session: &mut Option<Arc<DeviceTransport>>,
        version: Option<CipherVersion>,
    ) -> Result<CipherVersion> {
        let transport = self.transport(session).await?;
        let cipher =
            binding::negotiate(&transport, &self.mac(), version, self.config.bind_timeout())
                .await?;
        let version = cipher.version();
        // Only one negotiation runs at a time under the session lock
        self.shared
            .cipher
            .set(cipher)
            .map_err(|_| Error::AlreadyBound)?;
        Ok(version)
    }

    /// Returns the session cipher, negotiating one first if needed.
    async fn ensure_bound(&self, session: &mut Option<Arc<DeviceTransport>>) -> Result<Cipher> {
        if let Some(cipher) = self.shared.cipher.get() {
            return Ok(cipher.clone());
        }
        if let Err(error) = self.negotiate(session, None).await {
            tracing::warn!(mac = %self.mac(), %error, "Automatic binding failed");
            return Err(Error::NotBound);
        }
        self.shared.cipher.get().cloned().ok_or(Error::NotBound)
    }

    async fn transport(
        &self,
        session: &mut Option<Arc<DeviceTransport>>,
    ) -> Result<Arc<DeviceTransport>> {
        if let Some(transport) = session {
            return Ok(Arc::clone(transport));
        }
        let peer = self.shared.info.read().addr();
        let handler: Arc<dyn ResponseHandler> = Arc::clone(&self.shared) as _;
        let transport = Arc::new(DeviceTransport::connect(peer, handler).await?);
        *session = Some(Arc::clone(&transport));
        Ok(transport)
    }

    // ========== Round Trips ==========

    /// Reads every known property from the device.
    ///
    /// Binds first if no session key is set. The firmware id is requested
    /// along with the properties until it has been received.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotBound` if binding was needed and failed, or
    /// `Error::Timeout` if the device did not answer in time.
    pub async fn update_state(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let cipher = self.ensure_bound(&mut session).await?;
        let transport = self.transport(&mut session).await?;

        let cols = self.shared.state.read().status_columns();
        let mac = self.mac();
        tracing::debug!(%mac, count = cols.len(), "Updating device properties");
        transport
            .request(&Request::status(mac, cols), &cipher, self.config.timeout())
            .await?;
        Ok(())
    }

    /// Requests only the firmware id.
    ///
    /// # Errors
    ///
    /// Same as [`Device::update_state`].
    pub async fn request_version(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let cipher = self.ensure_bound(&mut session).await?;
        let transport = self.transport(&mut session).await?;

        let request = Request::status(self.mac(), vec![FIRMWARE_ID.to_string()]);
        transport
            .request(&request, &cipher, self.config.timeout())
            .await?;
        Ok(())
    }

    /// Pushes locally changed properties to the device.
    ///
    /// Does nothing if no property is dirty. The dirty set is cleared when
    /// the command is built, so a timed out push is not retried.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotBound` if binding was needed and failed, or
    /// `Error::Timeout` if the device did not acknowledge in time.
    pub async fn push_state_update(&self) -> Result<()> {
        if self.shared.state.read().is_clean() {
            return Ok(());
        }

        let mut session = self.session.lock().await;
        let cipher = self.ensure_bound(&mut session).await?;
        let transport = self.transport(&mut session).await?;

        let pairs = self.shared.state.write().take_command();
        if pairs.is_empty() {
            return Ok(());
        }
        let mac = self.mac();
        tracing::debug!(
            %mac,
            properties = ?pairs.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            "Pushing state update"
        );
        transport
            .request(&Request::command(mac, pairs), &cipher, self.config.timeout())
            .await?;
        Ok(())
    }

    // ========== State ==========

    /// Returns a snapshot of the local state.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.shared.state.read().clone()
    }

    /// Runs `f` with mutable access to the local state.
    ///
    /// Changes are only sent by [`Device::push_state_update`].
    pub fn modify_state<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        f(&mut self.shared.state.write())
    }

    // ========== Subscriptions ==========

    /// Registers a callback run after every processed status response.
    pub fn on_state_updated<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PropertyStore) + Send + Sync + 'static,
    {
        self.shared.callbacks.on_state_updated(callback)
    }

    /// Registers a callback run for every command result.
    pub fn on_command_result<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Map<String, Value>) + Send + Sync + 'static,
    {
        self.shared.callbacks.on_command_result(callback)
    }

    /// Removes a callback. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.callbacks.unsubscribe(id)
    }

    /// Feeds a command result as if it had arrived from the device.
    #[cfg(test)]
    pub(crate) fn inject_result(&self, values: Map<String, Value>) {
        self.shared.handle_result(values);
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("info", &*self.shared.info.read())
            .field("bound", &self.is_bound())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn device() -> Device {
        let info = DeviceInfo::new("127.0.0.1".parse().unwrap(), "aabbccddeeff");
        Device::new(info, DeviceConfig::default())
    }

    fn values(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn bind_with_key_is_local_and_terminal() {
        let device = device();
        device
            .bind_with_key(CipherVersion::V2, "0123456789abcdef")
            .unwrap();
        assert!(device.is_bound());
        assert_eq!(device.cipher().unwrap().version(), CipherVersion::V2);

        let err = device
            .bind_with_key(CipherVersion::V1, "fedcba9876543210")
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyBound));
        assert_eq!(device.cipher().unwrap().key(), "0123456789abcdef");
    }

    #[test]
    fn bind_with_short_key_fails() {
        let device = device();
        assert!(matches!(
            device.bind_with_key(CipherVersion::V1, "short"),
            Err(Error::Value(_))
        ));
        assert!(!device.is_bound());
    }

    #[test]
    fn status_handler_updates_state_and_notifies() {
        let device = device();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        device.on_state_updated(move |store| {
            assert_eq!(store.len(), 2);
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        device
            .shared
            .handle_status(values(json!({"Pow": 1, "SetTem": 25})));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(device.state().power());
        assert!(device.state().is_clean());
    }

    #[test]
    fn result_handler_strips_buzzer_flag() {
        let device = device();
        device
            .shared
            .handle_result(values(json!({"Lig": 1, "Buzzer_ON_OFF": 1})));
        let state = device.state();
        assert!(state.light());
        assert!(state.property(BUZZER_OFF).is_none());
    }

    #[tokio::test]
    async fn push_without_changes_does_nothing() {
        let device = device();
        // Unbound and nothing listening: any I/O would fail
        device.push_state_update().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_device_reports_not_bound() {
        let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let info = DeviceInfo::new("127.0.0.1".parse().unwrap(), "aabbccddeeff")
            .with_port(silent.local_addr().unwrap().port());
        let config = DeviceConfig::default().with_bind_timeout(Duration::from_millis(20));
        let device = Device::new(info, config);

        let err = device.update_state().await.unwrap_err();
        assert!(err.is_not_bound());

        device.modify_state(|s| s.set_power(true));
        let err = device.push_state_update().await.unwrap_err();
        assert!(err.is_not_bound());
        // Nothing was sent, so the change is still pending
        assert!(!device.state().is_clean());
    }

    #[tokio::test]
    async fn set_ip_reports_change() {
        let device = device();
        assert!(!device.set_ip("127.0.0.1".parse().unwrap()).await);
        assert!(device.set_ip("127.0.0.2".parse().unwrap()).await);
        assert_eq!(device.info().ip().to_string(), "127.0.0.2");
    }
}
