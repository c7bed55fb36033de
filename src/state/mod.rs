// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state management types.
//!
//! [`DeviceState`] wraps a raw [`PropertyStore`] keyed by protocol property
//! name with typed accessors and tracks which properties changed locally
//! and still need to be pushed to the unit.
//!
//! # Examples
//!
//! ```
//! use amberac_lib::state::{DeviceState, Property};
//!
//! let mut state = DeviceState::new();
//! state.set_power(true);
//! state.set_power(true);
//!
//! assert_eq!(state.dirty().len(), 1);
//! assert_eq!(state.property_int(Property::Power), Some(1));
//!
//! let command = state.take_command();
//! assert!(state.is_clean());
//! assert_eq!(command[0].0, "Pow");
//! ```

mod device_state;
mod property;

pub use device_state::{BUZZER_OFF, DeviceState, HUMIDITY_MAX, HUMIDITY_MIN};
pub use property::{FIRMWARE_ID, Property, PropertyKey, PropertyStore};
