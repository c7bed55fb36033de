// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager tying discovery, binding and polling together.
//!
//! The [`DeviceManager`] listens to a [`Discovery`](crate::discovery::Discovery):
//!
//! - **New devices** are bound, wrapped in a
//!   [`PollingCoordinator`](crate::polling::PollingCoordinator) and
//!   refreshed once before observers are told about them
//! - **Moved devices** get their address refreshed and are read again
//!
//! Scheduling of periodic reads and rescans stays with the caller, for
//! example through [`PollingCoordinator::spawn`](crate::polling::PollingCoordinator::spawn).
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use amberac_lib::manager::{DeviceManager, ManagerConfig};
//!
//! # async fn example() -> amberac_lib::Result<()> {
//! let manager = Arc::new(DeviceManager::new(ManagerConfig::default()));
//! let discovery = manager.discovery();
//! discovery.scan(&[]).await?;
//!
//! let mut tasks = Vec::new();
//! for mac in manager.macs() {
//!     if let Some(coordinator) = manager.coordinator(&mac) {
//!         tasks.push(coordinator.spawn());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod device_manager;

pub use config::ManagerConfig;
pub use device_manager::DeviceManager;
