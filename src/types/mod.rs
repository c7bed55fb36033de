// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the library.
//!
//! This module provides the device identity, the enumerations used by the
//! property model, the temperature conversion table, and the firmware
//! version parsed from the device's firmware id.

mod device_info;
mod firmware;
mod mode;
mod temperature;

pub use device_info::{DEFAULT_PORT, DeviceInfo};
pub use firmware::FirmwareVersion;
pub use mode::{
    DehumidifierMode, FanSpeed, HorizontalSwing, Mode, Preset, Quiet, SwingMode, VerticalSwing,
};
pub use temperature::{
    TEMP_MAX, TEMP_MAX_F, TEMP_MIN, TEMP_MIN_F, TEMP_OFFSET, TemperatureRecord, TemperatureUnit,
    celsius_to_fahrenheit, temperature_table,
};
