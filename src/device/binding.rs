// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session key negotiation.
//!
//! The protocol gives no version signal, so the client probes: a bind
//! request is sealed under a variant's generic key and the device only
//! answers if it speaks that variant. Without an explicit variant V1 is
//! tried first, then V2.

use std::fmt;
use std::time::Duration;

use crate::cipher::{Cipher, CipherVersion};
use crate::error::Error;
use crate::protocol::{DeviceTransport, Request, Response};

/// Progress of a negotiated bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindPhase {
    /// Waiting for a confirmation under the given variant.
    Trial(CipherVersion),
    /// The trial under the given variant timed out.
    TimedOut(CipherVersion),
    /// A session key was received under the given variant.
    Bound(CipherVersion),
    /// Every trial timed out.
    Failed,
}

impl fmt::Display for BindPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trial(v) => write!(f, "trial {v}"),
            Self::TimedOut(v) => write!(f, "timeout {v}"),
            Self::Bound(v) => write!(f, "bound {v}"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Returns the variants to try, in order.
pub(crate) fn trial_order(version: Option<CipherVersion>) -> &'static [CipherVersion] {
    match version {
        Some(CipherVersion::V1) => &[CipherVersion::V1],
        Some(CipherVersion::V2) => &[CipherVersion::V2],
        None => &[CipherVersion::V1, CipherVersion::V2],
    }
}

/// Runs the bind trials and returns the session cipher.
///
/// Each trial waits at most `bind_timeout`. A confirmation without a usable
/// key ends negotiation with `Error::NotBound`; if every trial times out the
/// result is `Error::Timeout`.
pub(crate) async fn negotiate(
    transport: &DeviceTransport,
    mac: &str,
    version: Option<CipherVersion>,
    bind_timeout: Duration,
) -> Result<Cipher, Error> {
    let request = Request::bind(mac);
    let mut last_timeout = Error::timeout(bind_timeout);

    for &variant in trial_order(version) {
        tracing::info!(mac, phase = %BindPhase::Trial(variant), "Binding device");
        match transport
            .request(&request, &Cipher::generic(variant), bind_timeout)
            .await
        {
            Ok(Response::Bound { key: Some(key), .. }) => {
                let cipher = Cipher::new(variant, key).map_err(|error| {
                    tracing::warn!(mac, %error, "Device sent an unusable key");
                    Error::NotBound
                })?;
                tracing::info!(mac, phase = %BindPhase::Bound(variant), "Device bound");
                return Ok(cipher);
            }
            Ok(_) => {
                tracing::warn!(mac, "Bind confirmation without a key");
                return Err(Error::NotBound);
            }
            Err(error) if error.is_timeout() => {
                tracing::info!(mac, phase = %BindPhase::TimedOut(variant), "Bind trial timed out");
                last_timeout = error;
            }
            Err(error) => return Err(error),
        }
    }

    tracing::warn!(mac, phase = %BindPhase::Failed, "Binding failed");
    Err(last_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_is_tried_before_v2() {
        assert_eq!(
            trial_order(None),
            &[CipherVersion::V1, CipherVersion::V2]
        );
        assert_eq!(trial_order(Some(CipherVersion::V2)), &[CipherVersion::V2]);
    }

    #[test]
    fn phase_display() {
        assert_eq!(BindPhase::Trial(CipherVersion::V1).to_string(), "trial V1");
        assert_eq!(BindPhase::Failed.to_string(), "failed");
    }
}
