// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `AmberAC` Lib - A Rust library to control Gree-protocol climate units.
//!
//! This library provides async APIs to discover, bind, read and control air
//! conditioners and dehumidifiers that speak the Gree LAN protocol: JSON
//! messages encrypted with AES-128 and exchanged as UDP datagrams on
//! port 7000.
//!
//! # Supported Features
//!
//! - **Discovery**: Broadcast scans with found/moved notifications
//! - **Binding**: Session key negotiation with V1 (ECB) to V2 (GCM) fallback
//! - **State**: Typed accessors over the raw property vocabulary, with
//!   local change tracking and Fahrenheit conversion
//! - **Polling**: Periodic reads with tolerance for dropped datagrams and
//!   availability tracking
//!
//! # Quick Start
//!
//! ## Single Device
//!
//! ```no_run
//! use amberac_lib::{Device, DeviceConfig};
//! use amberac_lib::types::{DeviceInfo, FanSpeed, Mode};
//!
//! #[tokio::main]
//! async fn main() -> amberac_lib::Result<()> {
//!     let info = DeviceInfo::new("192.168.1.40".parse().unwrap(), "f4911e7aca59");
//!     let device = Device::new(info, DeviceConfig::default());
//!
//!     // Tries V1 first, then V2
//!     let version = device.bind(None).await?;
//!     println!("bound with {version}");
//!
//!     device.update_state().await?;
//!     println!("room at {:?}", device.state().current_temperature());
//!
//!     device.modify_state(|state| {
//!         state.set_power(true);
//!         state.set_mode(Mode::Heat);
//!         state.set_fan_speed(FanSpeed::Auto);
//!         state.set_target_temperature(23)
//!     })?;
//!     device.push_state_update().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Discovery and Polling
//!
//! ```no_run
//! use std::sync::Arc;
//! use amberac_lib::manager::{DeviceManager, ManagerConfig};
//!
//! #[tokio::main]
//! async fn main() -> amberac_lib::Result<()> {
//!     let manager = Arc::new(DeviceManager::new(ManagerConfig::default()));
//!     manager.on_device_added(|coordinator| {
//!         println!("{} is {:?}", coordinator.device().info(), coordinator.availability());
//!     });
//!
//!     manager.discovery().scan(&["192.168.1.255".parse().unwrap()]).await?;
//!
//!     let tasks: Vec<_> = manager
//!         .macs()
//!         .iter()
//!         .filter_map(|mac| manager.coordinator(mac))
//!         .map(|coordinator| coordinator.spawn())
//!         .collect();
//!     # drop(tasks);
//!     Ok(())
//! }
//! ```

pub mod cipher;
mod device;
pub mod discovery;
pub mod error;
pub mod manager;
pub mod polling;
pub mod protocol;
pub mod state;
pub mod subscription;
pub mod types;

pub use cipher::{Cipher, CipherVersion};
pub use device::{BindPhase, DEFAULT_BIND_TIMEOUT, DEFAULT_TIMEOUT, Device, DeviceConfig};
pub use discovery::{Discovery, DiscoveryListener, DiscoveryOptions};
pub use error::{DecodeError, Error, ProtocolError, Result, ValueError};
pub use polling::{Availability, PollError, PollingConfig, PollingCoordinator};
pub use state::{DeviceState, Property, PropertyStore};
pub use subscription::{CallbackRegistry, SubscriptionId};
pub use types::DeviceInfo;
