// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.

use serde_json::{Map, Value};

use crate::error::ValueError;
use crate::types::{
    DehumidifierMode, FanSpeed, FirmwareVersion, HorizontalSwing, Mode, Preset, Quiet, SwingMode,
    TEMP_OFFSET, TemperatureRecord, TemperatureUnit, VerticalSwing, celsius_to_fahrenheit,
};

use super::property::{FIRMWARE_ID, Property, PropertyKey, PropertyStore};

/// Lowest settable target humidity in percent.
pub const HUMIDITY_MIN: i32 = 30;
/// Highest settable target humidity in percent.
pub const HUMIDITY_MAX: i32 = 80;

/// Extra property sent with every push to silence the unit's buzzer.
pub const BUZZER_OFF: &str = "Buzzer_ON_OFF";

/// Local model of a device's properties.
///
/// Reads never touch the dirty set. Every setter goes through
/// [`DeviceState::set_property`], which marks a key dirty only when its
/// value actually changes. [`DeviceState::take_command`] drains the dirty
/// set into the name/value pairs of a command message.
///
/// # Examples
///
/// ```
/// use amberac_lib::state::DeviceState;
/// use amberac_lib::types::Mode;
///
/// let mut state = DeviceState::new();
/// state.set_power(true);
/// state.set_mode(Mode::Cool);
/// state.set_target_temperature(22).unwrap();
///
/// assert!(state.power());
/// assert_eq!(state.target_temperature(), Some(22));
/// assert_eq!(state.dirty().len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    properties: PropertyStore,
    /// Insertion-ordered, no duplicates.
    dirty: Vec<PropertyKey>,
    firmware_id: Option<String>,
    version: Option<FirmwareVersion>,
    /// Set once the firmware id has been received; stops requesting `hid`.
    firmware_id_obtained: bool,
    /// Set once the first sensor reading has been inspected.
    offset_checked: bool,
    /// The first sensor reading showed the sensor reports without offset.
    /// Cleared by any firmware id received afterwards.
    sensor_without_offset: bool,
    beep: bool,
}

impl DeviceState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Raw Store ==========

    /// Returns the raw property store.
    #[must_use]
    pub fn properties(&self) -> &PropertyStore {
        &self.properties
    }

    /// Returns the raw value of a property.
    #[must_use]
    pub fn property(&self, key: impl Into<PropertyKey>) -> Option<&Value> {
        self.properties.get(&key.into())
    }

    /// Returns a known property as an integer.
    #[must_use]
    pub fn property_int(&self, property: Property) -> Option<i64> {
        self.properties.get_int(property)
    }

    /// Sets a property, marking it dirty if the value changed.
    ///
    /// Returns true if the store was modified. Values are not validated;
    /// unknown keys are accepted and pushed as-is.
    pub fn set_property(&mut self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        if self.properties.get(&key) == Some(&value) {
            return false;
        }
        self.properties.insert(key.clone(), value);
        if !self.dirty.contains(&key) {
            self.dirty.push(key);
        }
        true
    }

    /// Returns the keys changed locally but not yet pushed, in change order.
    #[must_use]
    pub fn dirty(&self) -> &[PropertyKey] {
        &self.dirty
    }

    /// Returns true if there is nothing to push.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Drains the dirty set into the pairs of a command message.
    ///
    /// A dirty target temperature brings the compensation bit and unit along
    /// when they are known. The buzzer suppression flag is appended unless
    /// beeping is enabled. The dirty set is empty afterwards.
    pub fn take_command(&mut self) -> Vec<(String, Value)> {
        let mut pairs: Vec<(String, Value)> = Vec::with_capacity(self.dirty.len() + 3);

        for key in std::mem::take(&mut self.dirty) {
            let value = self.properties.get(&key).cloned().unwrap_or(Value::Null);
            upsert(&mut pairs, key.as_str(), value);
            if key == PropertyKey::Known(Property::TemperatureSet) {
                for companion in [Property::TemperatureBit, Property::TemperatureUnit] {
                    if let Some(value) = self.properties.get(&companion.into()) {
                        upsert(&mut pairs, companion.as_str(), value.clone());
                    }
                }
            }
        }

        if !pairs.is_empty() && !self.beep {
            upsert(&mut pairs, BUZZER_OFF, Value::from(1));
        }
        pairs
    }

    /// Applies values reported by the device in a status response.
    ///
    /// Reported values never enter the dirty set, and a value still waiting
    /// to be pushed is not overwritten by the device's older one. A firmware
    /// id is consumed and parsed instead of being stored, and the first
    /// sensor reading is checked once to detect firmware that reports
    /// without the offset.
    pub fn apply_reported(&mut self, mut values: Map<String, Value>) {
        if let Some(hid) = values.remove(FIRMWARE_ID) {
            let hid = match hid {
                Value::String(s) => s,
                other => other.to_string(),
            };
            self.version = FirmwareVersion::from_hid(&hid);
            tracing::info!(
                firmware_id = %hid,
                version = ?self.version.as_ref().map(FirmwareVersion::as_str),
                "Firmware identified"
            );
            self.firmware_id = Some(hid);
            self.firmware_id_obtained = true;
            // A firmware id overrides an earlier guess from the sensor reading
            self.sensor_without_offset = false;
        }

        let sensor_reported = values.contains_key(Property::TemperatureSensor.as_str());
        for (name, value) in values {
            let key = PropertyKey::from(name);
            if !self.dirty.contains(&key) {
                self.properties.insert(key, value);
            }
        }

        if !self.offset_checked && sensor_reported {
            self.offset_checked = true;
            let raw = self
                .property_int(Property::TemperatureSensor)
                .unwrap_or_default();
            tracing::debug!(raw, "Checking temperature offset");
            if raw != 0 && raw < TEMP_OFFSET {
                self.sensor_without_offset = true;
                tracing::info!(raw, "Sensor reports without offset");
            }
        }
    }

    // ========== Firmware ==========

    /// Returns the raw firmware id, once received.
    #[must_use]
    pub fn firmware_id(&self) -> Option<&str> {
        self.firmware_id.as_deref()
    }

    /// Returns the firmware version parsed from the firmware id.
    #[must_use]
    pub fn version(&self) -> Option<&FirmwareVersion> {
        self.version.as_ref()
    }

    /// Returns true while the firmware id still needs to be requested.
    #[must_use]
    pub fn needs_firmware_id(&self) -> bool {
        !self.firmware_id_obtained
    }

    /// Returns the columns a full status request should ask for.
    #[must_use]
    pub fn status_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = Property::ALL
            .iter()
            .map(|p| p.as_str().to_string())
            .collect();
        if self.needs_firmware_id() {
            cols.push(FIRMWARE_ID.to_string());
        }
        cols
    }

    /// Returns true if the raw sensor value carries the +40 offset.
    ///
    /// Major firmware version 4 reports plain values, as does any unit
    /// whose first non-zero reading was below the offset.
    #[must_use]
    pub fn temperature_offset_applies(&self) -> bool {
        !self.sensor_without_offset && self.version.as_ref().and_then(FirmwareVersion::major) != Some(4)
    }

    // ========== Beep ==========

    /// Returns true if pushes may make the unit beep.
    #[must_use]
    pub fn beep(&self) -> bool {
        self.beep
    }

    /// Enables or disables the buzzer for pushes. Local only, never pushed.
    pub fn set_beep(&mut self, beep: bool) {
        self.beep = beep;
    }

    // ========== Flags ==========

    fn flag(&self, property: Property) -> bool {
        self.properties.get_int(property).is_some_and(|v| v != 0)
    }

    fn set_flag(&mut self, property: Property, on: bool) {
        self.set_property(property, i64::from(on));
    }

    /// Returns true if the unit is on.
    #[must_use]
    pub fn power(&self) -> bool {
        self.flag(Property::Power)
    }

    /// Turns the unit on or off.
    pub fn set_power(&mut self, on: bool) {
        self.set_flag(Property::Power, on);
    }

    /// Returns true if the fresh air valve is open.
    #[must_use]
    pub fn fresh_air(&self) -> bool {
        self.flag(Property::FreshAir)
    }

    /// Opens or closes the fresh air valve.
    pub fn set_fresh_air(&mut self, on: bool) {
        self.set_flag(Property::FreshAir, on);
    }

    /// Returns true if the coil drying fan is enabled.
    #[must_use]
    pub fn xfan(&self) -> bool {
        self.flag(Property::XFan)
    }

    /// Enables or disables the coil drying fan.
    pub fn set_xfan(&mut self, on: bool) {
        self.set_flag(Property::XFan, on);
    }

    /// Returns true if the ionizer is on.
    #[must_use]
    pub fn anion(&self) -> bool {
        self.flag(Property::Anion)
    }

    /// Turns the ionizer on or off.
    pub fn set_anion(&mut self, on: bool) {
        self.set_flag(Property::Anion, on);
    }

    /// Returns true if sleep is enabled.
    #[must_use]
    pub fn sleep(&self) -> bool {
        self.flag(Property::Sleep)
    }

    /// Enables or disables sleep. Also writes the sleep mode companion.
    pub fn set_sleep(&mut self, on: bool) {
        self.set_flag(Property::Sleep, on);
        self.set_flag(Property::SleepMode, on);
    }

    /// Returns true if the panel light is on.
    #[must_use]
    pub fn light(&self) -> bool {
        self.flag(Property::Light)
    }

    /// Turns the panel light on or off.
    pub fn set_light(&mut self, on: bool) {
        self.set_flag(Property::Light, on);
    }

    /// Returns true if turbo is enabled.
    #[must_use]
    pub fn turbo(&self) -> bool {
        self.flag(Property::Turbo)
    }

    /// Enables or disables turbo.
    pub fn set_turbo(&mut self, on: bool) {
        self.set_flag(Property::Turbo, on);
    }

    /// Returns true if 8°C steady heat is enabled.
    #[must_use]
    pub fn steady_heat(&self) -> bool {
        self.flag(Property::SteadyHeat)
    }

    /// Enables or disables 8°C steady heat.
    pub fn set_steady_heat(&mut self, on: bool) {
        self.set_flag(Property::SteadyHeat, on);
    }

    /// Returns true if power save is enabled.
    #[must_use]
    pub fn power_save(&self) -> bool {
        self.flag(Property::PowerSave)
    }

    /// Enables or disables power save.
    pub fn set_power_save(&mut self, on: bool) {
        self.set_flag(Property::PowerSave, on);
    }

    // ========== Enumerations ==========

    /// Returns the operating mode, if reported and known.
    #[must_use]
    pub fn mode(&self) -> Option<Mode> {
        self.property_int(Property::Mode)
            .and_then(|v| Mode::try_from(v).ok())
    }

    /// Sets the operating mode.
    pub fn set_mode(&mut self, mode: Mode) {
        self.set_property(Property::Mode, mode.value());
    }

    /// Returns the fan speed, if reported and known.
    #[must_use]
    pub fn fan_speed(&self) -> Option<FanSpeed> {
        self.property_int(Property::FanSpeed)
            .and_then(|v| FanSpeed::try_from(v).ok())
    }

    /// Sets the fan speed.
    pub fn set_fan_speed(&mut self, speed: FanSpeed) {
        self.set_property(Property::FanSpeed, speed.value());
    }

    /// Returns the horizontal louvre position, if reported and known.
    #[must_use]
    pub fn horizontal_swing(&self) -> Option<HorizontalSwing> {
        self.property_int(Property::HorizontalSwing)
            .and_then(|v| HorizontalSwing::try_from(v).ok())
    }

    /// Sets the horizontal louvre position.
    pub fn set_horizontal_swing(&mut self, swing: HorizontalSwing) {
        self.set_property(Property::HorizontalSwing, swing.value());
    }

    /// Returns the vertical louvre position, if reported and known.
    #[must_use]
    pub fn vertical_swing(&self) -> Option<VerticalSwing> {
        self.property_int(Property::VerticalSwing)
            .and_then(|v| VerticalSwing::try_from(v).ok())
    }

    /// Sets the vertical louvre position.
    pub fn set_vertical_swing(&mut self, swing: VerticalSwing) {
        self.set_property(Property::VerticalSwing, swing.value());
    }

    /// Returns the quiet level, if reported and known.
    #[must_use]
    pub fn quiet(&self) -> Option<Quiet> {
        self.property_int(Property::Quiet)
            .and_then(|v| Quiet::try_from(v).ok())
    }

    /// Sets the quiet level.
    pub fn set_quiet(&mut self, quiet: Quiet) {
        self.set_property(Property::Quiet, quiet.value());
    }

    /// Returns the display unit. Defaults to Celsius when not reported.
    #[must_use]
    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.property_int(Property::TemperatureUnit)
            .and_then(|v| TemperatureUnit::try_from(v).ok())
            .unwrap_or_default()
    }

    /// Sets the display unit.
    pub fn set_temperature_unit(&mut self, unit: TemperatureUnit) {
        self.set_property(Property::TemperatureUnit, unit as i64);
    }

    // ========== Temperature ==========

    /// Returns the inclusive target temperature bounds in the current unit.
    #[must_use]
    pub fn temperature_bounds(&self) -> (i32, i32) {
        self.temperature_unit().bounds()
    }

    /// Converts a Celsius wire value to the current unit.
    fn to_display_unit(&self, celsius: i64) -> Result<i32, ValueError> {
        let celsius = i32::try_from(celsius).unwrap_or(i32::MAX);
        match self.temperature_unit() {
            TemperatureUnit::Celsius => Ok(celsius),
            TemperatureUnit::Fahrenheit => {
                // Absent bit falls back to the first matching row
                let bit = self
                    .property_int(Property::TemperatureBit)
                    .and_then(|b| u8::try_from(b).ok())
                    .unwrap_or(0);
                celsius_to_fahrenheit(celsius, bit)
            }
        }
    }

    /// Returns the target temperature in the current unit.
    #[must_use]
    pub fn target_temperature(&self) -> Option<i32> {
        let celsius = self.property_int(Property::TemperatureSet)?;
        match self.to_display_unit(celsius) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(celsius, %error, "Unexpected target temperature");
                None
            }
        }
    }

    /// Sets the target temperature in the current unit.
    ///
    /// In Fahrenheit mode the value is mapped through the conversion table
    /// and both the Celsius value and the compensation bit are written.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if the value lies outside
    /// [`DeviceState::temperature_bounds`]. The state is left unchanged.
    pub fn set_target_temperature(&mut self, value: i32) -> Result<(), ValueError> {
        let unit = self.temperature_unit();
        let (min, max) = unit.bounds();
        if !(min..=max).contains(&value) {
            return Err(ValueError::OutOfRange {
                min,
                max,
                actual: value,
            });
        }

        match unit {
            TemperatureUnit::Celsius => {
                self.set_property(Property::TemperatureSet, i64::from(value));
            }
            TemperatureUnit::Fahrenheit => {
                let record = TemperatureRecord::from_fahrenheit(value);
                self.set_property(Property::TemperatureSet, i64::from(record.celsius));
                self.set_property(Property::TemperatureBit, i64::from(record.bit));
            }
        }
        Ok(())
    }

    /// Returns the room temperature in the current unit.
    ///
    /// A missing or zero sensor reading falls back to the target
    /// temperature, as does a reading that cannot be converted.
    #[must_use]
    pub fn current_temperature(&self) -> Option<i32> {
        let raw = match self.property_int(Property::TemperatureSensor) {
            Some(raw) if raw != 0 => raw,
            _ => return self.target_temperature(),
        };
        let celsius = if self.temperature_offset_applies() {
            raw - TEMP_OFFSET
        } else {
            raw
        };
        match self.to_display_unit(celsius) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(raw, %error, "Unexpected sensor temperature");
                self.target_temperature()
            }
        }
    }

    // ========== Humidity ==========

    /// Returns the target humidity in percent.
    #[must_use]
    pub fn target_humidity(&self) -> Option<i64> {
        self.property_int(Property::HumiditySet)
            .map(|step| 15 + step * 5)
    }

    /// Sets the target humidity in percent.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` outside `[30, 80]`. The state is
    /// left unchanged.
    pub fn set_target_humidity(&mut self, value: i32) -> Result<(), ValueError> {
        if !(HUMIDITY_MIN..=HUMIDITY_MAX).contains(&value) {
            return Err(ValueError::OutOfRange {
                min: HUMIDITY_MIN,
                max: HUMIDITY_MAX,
                actual: value,
            });
        }
        self.set_property(Property::HumiditySet, i64::from((value - 15) / 5));
        Ok(())
    }

    /// Returns the humidity sensor reading in percent.
    #[must_use]
    pub fn current_humidity(&self) -> Option<i64> {
        self.property_int(Property::HumiditySensor)
    }

    /// Returns true if the filter needs cleaning.
    #[must_use]
    pub fn clean_filter(&self) -> bool {
        self.flag(Property::CleanFilter)
    }

    /// Returns true if the water tank is full.
    #[must_use]
    pub fn water_full(&self) -> bool {
        self.flag(Property::WaterFull)
    }

    /// Returns the dehumidifier mode, if reported and known.
    #[must_use]
    pub fn dehumidifier_mode(&self) -> Option<DehumidifierMode> {
        self.property_int(Property::DehumidifierMode)
            .and_then(|v| DehumidifierMode::try_from(v).ok())
    }

    // ========== Composites ==========

    /// Returns which louvre axes are in full swing.
    #[must_use]
    pub fn swing_mode(&self) -> SwingMode {
        let horizontal = self.horizontal_swing() == Some(HorizontalSwing::FullSwing);
        let vertical = self.vertical_swing() == Some(VerticalSwing::FullSwing);
        match (horizontal, vertical) {
            (true, true) => SwingMode::Both,
            (true, false) => SwingMode::Horizontal,
            (false, true) => SwingMode::Vertical,
            (false, false) => SwingMode::Off,
        }
    }

    /// Sets full swing on the selected axes and centres the others.
    pub fn set_swing_mode(&mut self, mode: SwingMode) {
        self.set_horizontal_swing(if mode.horizontal() {
            HorizontalSwing::FullSwing
        } else {
            HorizontalSwing::Center
        });
        self.set_vertical_swing(if mode.vertical() {
            VerticalSwing::FullSwing
        } else {
            VerticalSwing::FixedMiddle
        });
    }

    /// Returns the active preset, checking steady heat, power save, sleep
    /// and turbo in that order.
    #[must_use]
    pub fn preset(&self) -> Preset {
        if self.steady_heat() {
            Preset::Away
        } else if self.power_save() {
            Preset::Eco
        } else if self.sleep() {
            Preset::Sleep
        } else if self.turbo() {
            Preset::Boost
        } else {
            Preset::None
        }
    }

    /// Activates one preset and clears the other preset flags.
    pub fn set_preset(&mut self, preset: Preset) {
        self.set_steady_heat(preset == Preset::Away);
        self.set_power_save(preset == Preset::Eco);
        self.set_turbo(preset == Preset::Boost);
        self.set_sleep(preset == Preset::Sleep);
    }
}

/// Inserts a pair, or replaces the value if the name is already present.
fn upsert(pairs: &mut Vec<(String, Value)>, name: &str, value: Value) {
    if let Some(slot) = pairs.iter_mut().find(|(n, _)| n == name) {
        slot.1 = value;
    } else {
        pairs.push((name.to_string(), value));
    }
}
