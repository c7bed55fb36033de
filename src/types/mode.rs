// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Enumerated property values.
//!
//! Each enumeration mirrors the small integers the device uses on the
//! wire. Converting from a raw integer yields `Err(raw)` for values the
//! enumeration does not know; setters on the raw store pass such values
//! through unchecked.

use std::fmt;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value, )+
        }

        impl $name {
            /// All variants in wire order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the wire value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self as i64
            }
        }

        impl TryFrom<i64> for $name {
            type Error = i64;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                match value {
                    $( $value => Ok(Self::$variant), )+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> Self {
                value.value()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

wire_enum! {
    /// Operating mode (`Mod`).
    pub enum Mode {
        /// Automatic heat/cool selection.
        Auto = 0,
        /// Cooling.
        Cool = 1,
        /// Dehumidifying.
        Dry = 2,
        /// Fan only.
        Fan = 3,
        /// Heating.
        Heat = 4,
    }
}

wire_enum! {
    /// Fan speed (`WdSpd`).
    pub enum FanSpeed {
        /// Automatic.
        Auto = 0,
        /// Low.
        Low = 1,
        /// Medium-low.
        MediumLow = 2,
        /// Medium.
        Medium = 3,
        /// Medium-high.
        MediumHigh = 4,
        /// High.
        High = 5,
    }
}

wire_enum! {
    /// Horizontal louvre position (`SwingLfRig`).
    pub enum HorizontalSwing {
        /// Device default.
        Default = 0,
        /// Continuous swing.
        FullSwing = 1,
        /// Fixed left.
        Left = 2,
        /// Fixed left-center.
        LeftCenter = 3,
        /// Fixed center.
        Center = 4,
        /// Fixed right-center.
        RightCenter = 5,
        /// Fixed right.
        Right = 6,
    }
}

wire_enum! {
    /// Vertical louvre position (`SwUpDn`).
    pub enum VerticalSwing {
        /// Device default.
        Default = 0,
        /// Continuous swing.
        FullSwing = 1,
        /// Fixed upper.
        FixedUpper = 2,
        /// Fixed upper-middle.
        FixedUpperMiddle = 3,
        /// Fixed middle.
        FixedMiddle = 4,
        /// Fixed lower-middle.
        FixedLowerMiddle = 5,
        /// Fixed lower.
        FixedLower = 6,
        /// Swing in the upper region.
        SwingUpper = 7,
        /// Swing in the upper-middle region.
        SwingUpperMiddle = 8,
        /// Swing in the middle region.
        SwingMiddle = 9,
        /// Swing in the lower-middle region.
        SwingLowerMiddle = 10,
        /// Swing in the lower region.
        SwingLower = 11,
    }
}

wire_enum! {
    /// Quiet level (`Quiet`).
    pub enum Quiet {
        /// Normal operation.
        Off = 0,
        /// Quiet when the room is near target.
        Auto = 1,
        /// Always quiet.
        On = 2,
    }
}

wire_enum! {
    /// Dehumidifier operating mode (`Dmod`).
    pub enum DehumidifierMode {
        /// Regular dehumidifying.
        Default = 0,
        /// Ionizer only.
        AnionOnly = 9,
    }
}

/// Combined louvre behaviour across both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SwingMode {
    /// Neither axis swings.
    Off,
    /// Only the vertical louvres swing.
    Vertical,
    /// Only the horizontal louvres swing.
    Horizontal,
    /// Both axes swing.
    Both,
}

impl SwingMode {
    /// Returns true if the horizontal louvres swing in this mode.
    #[must_use]
    pub const fn horizontal(self) -> bool {
        matches!(self, Self::Horizontal | Self::Both)
    }

    /// Returns true if the vertical louvres swing in this mode.
    #[must_use]
    pub const fn vertical(self) -> bool {
        matches!(self, Self::Vertical | Self::Both)
    }
}

/// Mutually exclusive comfort presets built from the boolean flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Preset {
    /// No preset flag set.
    None,
    /// Power save (`SvSt`).
    Eco,
    /// Steady heat at 8°C (`StHt`).
    Away,
    /// Turbo (`Tur`).
    Boost,
    /// Sleep (`SwhSlp`).
    Sleep,
}
