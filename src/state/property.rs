// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol property vocabulary and the raw property store.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Wire name of the firmware id column. Requested, never stored.
pub const FIRMWARE_ID: &str = "hid";

/// Properties the accessor layer understands.
///
/// The wire tokens returned by [`Property::as_str`] are load-bearing and
/// must match what physical devices expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Property {
    /// Power on/off (`Pow`).
    Power,
    /// Operating mode (`Mod`).
    Mode,
    /// Target humidity step (`Dwet`).
    HumiditySet,
    /// Humidity sensor (`DwatSen`).
    HumiditySensor,
    /// Filter needs cleaning (`Dfltr`).
    CleanFilter,
    /// Water tank full (`DwatFul`).
    WaterFull,
    /// Dehumidifier mode (`Dmod`).
    DehumidifierMode,
    /// Target temperature in Celsius (`SetTem`).
    TemperatureSet,
    /// Raw temperature sensor (`TemSen`).
    TemperatureSensor,
    /// Display unit (`TemUn`).
    TemperatureUnit,
    /// Fahrenheit compensation bit (`TemRec`).
    TemperatureBit,
    /// Fan speed (`WdSpd`).
    FanSpeed,
    /// Fresh air valve (`Air`).
    FreshAir,
    /// Coil drying fan (`Blo`).
    XFan,
    /// Ionizer (`Health`).
    Anion,
    /// Sleep (`SwhSlp`).
    Sleep,
    /// Sleep mode companion flag (`SlpMod`).
    SleepMode,
    /// Panel light (`Lig`).
    Light,
    /// Horizontal louvres (`SwingLfRig`).
    HorizontalSwing,
    /// Vertical louvres (`SwUpDn`).
    VerticalSwing,
    /// Quiet level (`Quiet`).
    Quiet,
    /// Turbo (`Tur`).
    Turbo,
    /// Steady heat at 8°C (`StHt`).
    SteadyHeat,
    /// Power save (`SvSt`).
    PowerSave,
    /// Heat/cool capability type (`HeatCoolType`).
    HeatCoolType,
}

impl Property {
    /// Every known property, in request order.
    pub const ALL: &'static [Self] = &[
        Self::Power,
        Self::Mode,
        Self::HumiditySet,
        Self::HumiditySensor,
        Self::CleanFilter,
        Self::WaterFull,
        Self::DehumidifierMode,
        Self::TemperatureSet,
        Self::TemperatureSensor,
        Self::TemperatureUnit,
        Self::TemperatureBit,
        Self::FanSpeed,
        Self::FreshAir,
        Self::XFan,
        Self::Anion,
        Self::Sleep,
        Self::SleepMode,
        Self::Light,
        Self::HorizontalSwing,
        Self::VerticalSwing,
        Self::Quiet,
        Self::Turbo,
        Self::SteadyHeat,
        Self::PowerSave,
        Self::HeatCoolType,
    ];

    /// Returns the wire token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Power => "Pow",
            Self::Mode => "Mod",
            Self::HumiditySet => "Dwet",
            Self::HumiditySensor => "DwatSen",
            Self::CleanFilter => "Dfltr",
            Self::WaterFull => "DwatFul",
            Self::DehumidifierMode => "Dmod",
            Self::TemperatureSet => "SetTem",
            Self::TemperatureSensor => "TemSen",
            Self::TemperatureUnit => "TemUn",
            Self::TemperatureBit => "TemRec",
            Self::FanSpeed => "WdSpd",
            Self::FreshAir => "Air",
            Self::XFan => "Blo",
            Self::Anion => "Health",
            Self::Sleep => "SwhSlp",
            Self::SleepMode => "SlpMod",
            Self::Light => "Lig",
            Self::HorizontalSwing => "SwingLfRig",
            Self::VerticalSwing => "SwUpDn",
            Self::Quiet => "Quiet",
            Self::Turbo => "Tur",
            Self::SteadyHeat => "StHt",
            Self::PowerSave => "SvSt",
            Self::HeatCoolType => "HeatCoolType",
        }
    }

    /// Looks up a property by wire token.
    #[must_use]
    pub fn from_wire(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.as_str() == token)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of the property store: a known property or an opaque wire token.
///
/// Unknown tokens reported by the device are kept so they can be written
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    /// A property the accessor layer understands.
    Known(Property),
    /// Any other wire token.
    Other(String),
}

impl PropertyKey {
    /// Returns the wire token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(p) => p.as_str(),
            Self::Other(token) => token,
        }
    }
}

impl From<Property> for PropertyKey {
    fn from(value: Property) -> Self {
        Self::Known(value)
    }
}

impl From<&str> for PropertyKey {
    fn from(token: &str) -> Self {
        Property::from_wire(token).map_or_else(|| Self::Other(token.to_string()), Self::Known)
    }
}

impl From<String> for PropertyKey {
    fn from(token: String) -> Self {
        match Property::from_wire(&token) {
            Some(p) => Self::Known(p),
            None => Self::Other(token),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw property values keyed by wire token.
///
/// Only keys the device reported or a caller set are present; absent keys
/// read as `None`, never as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyStore {
    values: HashMap<PropertyKey, Value>,
}

impl PropertyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value for a key.
    #[must_use]
    pub fn get(&self, key: &PropertyKey) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value of a known property as an integer.
    #[must_use]
    pub fn get_int(&self, property: Property) -> Option<i64> {
        self.values.get(&property.into()).and_then(Value::as_i64)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.values.contains_key(key)
    }

    /// Stores a value, returning the previous one.
    pub fn insert(&mut self, key: PropertyKey, value: Value) -> Option<Value> {
        self.values.insert(key, value)
    }

    /// Returns the number of stored properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing has been stored yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over stored key/value pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &Value)> {
        self.values.iter()
    }

    /// Returns a copy keyed by wire token, sorted for stable output.
    #[must_use]
    pub fn to_wire_map(&self) -> std::collections::BTreeMap<String, Value> {
        self.values
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tokens_round_trip() {
        for property in Property::ALL {
            assert_eq!(Property::from_wire(property.as_str()), Some(*property));
        }
        assert_eq!(Property::ALL.len(), 25);
    }

    #[test]
    fn unknown_tokens_become_other() {
        assert_eq!(PropertyKey::from("Pow"), PropertyKey::Known(Property::Power));
        assert_eq!(
            PropertyKey::from("AntiDirectBlow"),
            PropertyKey::Other("AntiDirectBlow".to_string())
        );
        assert_eq!(PropertyKey::from("AntiDirectBlow").as_str(), "AntiDirectBlow");
    }

    #[test]
    fn store_reads_absent_as_none() {
        let mut store = PropertyStore::new();
        assert!(store.get_int(Property::Power).is_none());

        store.insert(Property::Power.into(), Value::from(0));
        assert_eq!(store.get_int(Property::Power), Some(0));
        assert_eq!(store.len(), 1);
    }
}
