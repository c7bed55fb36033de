// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Temperature units and the Fahrenheit conversion table.
//!
//! The wire protocol only speaks Celsius: an integer `SetTem` plus a
//! single compensation bit `TemRec` that records which way a Fahrenheit
//! setting was rounded. Fahrenheit values are mapped through a table built
//! once, covering every integer Fahrenheit value in `[-76, 140]`.

use std::fmt;
use std::sync::LazyLock;

use crate::error::ValueError;

/// Lowest settable target temperature in Celsius.
pub const TEMP_MIN: i32 = 8;
/// Highest settable target temperature in Celsius.
pub const TEMP_MAX: i32 = 30;
/// Lowest settable target temperature in Fahrenheit.
pub const TEMP_MIN_F: i32 = 46;
/// Highest settable target temperature in Fahrenheit.
pub const TEMP_MAX_F: i32 = 86;

/// Constant some firmware adds to the raw sensor reading.
pub const TEMP_OFFSET: i64 = 40;

const TABLE_MIN_C: i32 = -60;
const TABLE_MAX_C: i32 = 60;
const TABLE_MIN_F: i32 = -76;
const TABLE_MAX_F: i32 = 140;

/// Unit the device displays and reports temperatures in (`TemUn`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    #[default]
    Celsius = 0,
    /// Degrees Fahrenheit.
    Fahrenheit = 1,
}

impl TemperatureUnit {
    /// Returns the inclusive target temperature bounds in this unit.
    #[must_use]
    pub const fn bounds(self) -> (i32, i32) {
        match self {
            Self::Celsius => (TEMP_MIN, TEMP_MAX),
            Self::Fahrenheit => (TEMP_MIN_F, TEMP_MAX_F),
        }
    }
}

impl TryFrom<i64> for TemperatureUnit {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Celsius),
            1 => Ok(Self::Fahrenheit),
            other => Err(other),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Celsius => f.write_str("°C"),
            Self::Fahrenheit => f.write_str("°F"),
        }
    }
}

/// One row of the conversion table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemperatureRecord {
    /// The Fahrenheit value.
    pub fahrenheit: i32,
    /// The rounded Celsius value sent as `SetTem`.
    pub celsius: i32,
    /// 1 if the exact Celsius value lies above `celsius`, sent as `TemRec`.
    pub bit: u8,
}

impl TemperatureRecord {
    /// Computes the wire pair for a Fahrenheit value.
    #[must_use]
    pub fn from_fahrenheit(fahrenheit: i32) -> Self {
        let exact = (f64::from(fahrenheit) - 32.0) * 5.0 / 9.0;
        let rounded = exact.round();
        // Safe: the table range keeps values far inside i32
        #[allow(clippy::cast_possible_truncation)]
        let celsius = rounded as i32;
        Self {
            fahrenheit,
            celsius,
            bit: u8::from(exact - rounded > 0.0),
        }
    }
}

static TEMPERATURE_TABLE: LazyLock<Vec<TemperatureRecord>> = LazyLock::new(|| {
    (TABLE_MIN_F..=TABLE_MAX_F)
        .map(TemperatureRecord::from_fahrenheit)
        .collect()
});

/// Returns the full conversion table, ordered by Fahrenheit value.
#[must_use]
pub fn temperature_table() -> &'static [TemperatureRecord] {
    &TEMPERATURE_TABLE
}

/// Maps a Celsius wire pair back to Fahrenheit.
///
/// Among the rows with the given Celsius value, the one whose bit matches
/// wins; without an exact match the first row for that Celsius value is
/// used.
///
/// # Errors
///
/// Returns `ValueError::OutOfRange` if `celsius` lies outside `[-60, 60]`.
pub fn celsius_to_fahrenheit(celsius: i32, bit: u8) -> Result<i32, ValueError> {
    let out_of_range = || ValueError::OutOfRange {
        min: TABLE_MIN_C,
        max: TABLE_MAX_C,
        actual: celsius,
    };
    if !(TABLE_MIN_C..=TABLE_MAX_C).contains(&celsius) {
        return Err(out_of_range());
    }

    let mut matching = temperature_table().iter().filter(|r| r.celsius == celsius);
    let first = matching.clone().next().ok_or_else(out_of_range)?;
    Ok(matching
        .find(|r| r.bit == bit)
        .unwrap_or(first)
        .fahrenheit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_full_fahrenheit_range() {
        let table = temperature_table();
        assert_eq!(table.len(), 217);
        assert_eq!(table.first().unwrap().fahrenheit, -76);
        assert_eq!(table.last().unwrap().fahrenheit, 140);
        assert_eq!(table.first().unwrap().celsius, -60);
        assert_eq!(table.last().unwrap().celsius, 60);
    }

    #[test]
    fn records_round_and_flag_direction() {
        // 73°F = 22.78°C, rounds up
        let r = TemperatureRecord::from_fahrenheit(73);
        assert_eq!((r.celsius, r.bit), (23, 0));
        // 72°F = 22.22°C, rounds down
        let r = TemperatureRecord::from_fahrenheit(72);
        assert_eq!((r.celsius, r.bit), (22, 1));
        // 50°F = 10°C exactly
        let r = TemperatureRecord::from_fahrenheit(50);
        assert_eq!((r.celsius, r.bit), (10, 0));
    }

    #[test]
    fn every_fahrenheit_value_round_trips_within_table() {
        for f in TABLE_MIN_F..=TABLE_MAX_F {
            let record = TemperatureRecord::from_fahrenheit(f);
            let back = celsius_to_fahrenheit(record.celsius, record.bit).unwrap();
            assert!((TABLE_MIN_F..=TABLE_MAX_F).contains(&back));

            let again = celsius_to_fahrenheit(record.celsius, record.bit).unwrap();
            assert_eq!(back, again, "reverse lookup must be deterministic");

            let back_record = TemperatureRecord::from_fahrenheit(back);
            assert_eq!(back_record.celsius, record.celsius);
        }
    }

    #[test]
    fn exact_bit_match_preferred() {
        assert_eq!(celsius_to_fahrenheit(22, 1).unwrap(), 72);
        assert_eq!(celsius_to_fahrenheit(22, 0).unwrap(), 71);
    }

    #[test]
    fn falls_back_to_first_row_without_bit_match() {
        // 10°C is only reachable from 50°F with bit 0
        assert_eq!(celsius_to_fahrenheit(10, 1).unwrap(), 50);
    }

    #[test]
    fn rejects_values_outside_table() {
        assert!(celsius_to_fahrenheit(61, 0).is_err());
        assert!(celsius_to_fahrenheit(-61, 0).is_err());
    }

    #[test]
    fn unit_bounds() {
        assert_eq!(TemperatureUnit::Celsius.bounds(), (8, 30));
        assert_eq!(TemperatureUnit::Fahrenheit.bounds(), (46, 86));
        assert_eq!(TemperatureUnit::try_from(1), Ok(TemperatureUnit::Fahrenheit));
        assert_eq!(TemperatureUnit::try_from(5), Err(5));
    }
}
