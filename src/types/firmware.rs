// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firmware version parsed from the device's `hid` string.

use std::fmt;

/// Dotted firmware version, e.g. `3.31`.
///
/// Devices report a firmware id such as
/// `362001000762+U-CS532AE(LT)V3.31.bin`; the version is the dotted number
/// between the last `V` and the trailing `.bin`.
///
/// # Examples
///
/// ```
/// use amberac_lib::types::FirmwareVersion;
///
/// let version = FirmwareVersion::from_hid("362001000762+U-CS532AE(LT)V3.31.bin").unwrap();
/// assert_eq!(version.as_str(), "3.31");
/// assert_eq!(version.major(), Some(3));
///
/// assert!(FirmwareVersion::from_hid("no-version-here").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct FirmwareVersion(String);

impl FirmwareVersion {
    /// Extracts the version from a firmware id, if it carries one.
    #[must_use]
    pub fn from_hid(hid: &str) -> Option<Self> {
        let stem = hid.strip_suffix(".bin")?;
        let digits = stem
            .bytes()
            .rev()
            .take_while(|b| b.is_ascii_digit() || *b == b'.')
            .count();
        let (prefix, version) = stem.split_at(stem.len() - digits);
        if version.is_empty() || !prefix.ends_with('V') {
            return None;
        }
        Some(Self(version.to_string()))
    }

    /// Creates a version from an already extracted string.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Returns the version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the major component, if numeric.
    #[must_use]
    pub fn major(&self) -> Option<u32> {
        self.0.split('.').next()?.parse().ok()
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trailing_version() {
        let v = FirmwareVersion::from_hid("362001000762+U-CS532AE(LT)V3.31.bin").unwrap();
        assert_eq!(v.as_str(), "3.31");
        assert_eq!(v.major(), Some(3));
    }

    #[test]
    fn major_four() {
        let v = FirmwareVersion::from_hid("362001065279+U-WB05RT13V4.0.bin").unwrap();
        assert_eq!(v.major(), Some(4));
    }

    #[test]
    fn requires_v_prefix_and_bin_suffix() {
        assert!(FirmwareVersion::from_hid("U-CS532AE3.31.bin").is_none());
        assert!(FirmwareVersion::from_hid("U-CS532AEV3.31").is_none());
        assert!(FirmwareVersion::from_hid("U-CS532AEV.bin").is_none());
    }

    #[test]
    fn major_of_non_numeric_version() {
        assert_eq!(FirmwareVersion::new(".5").major(), None);
    }
}
