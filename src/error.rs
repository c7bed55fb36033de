// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `AmberAC` library.
//!
//! This module provides the error hierarchy for the whole stack: value
//! validation in setters, socket failures, datagram decoding and the
//! binding/round-trip failures that cross the device API boundary.

use thiserror::Error;

/// The main error type for this library.
///
/// Only [`Error::NotBound`] and [`Error::Timeout`] are produced by the
/// read and push round trips of a [`Device`](crate::Device). Value errors
/// are raised synchronously by setters before any network activity.
#[derive(Debug, Error)]
pub enum Error {
    /// A setter or constructor received a value outside its valid domain.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// A socket could not be opened or used.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A datagram could not be decrypted or parsed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The operation requires a session key and none could be negotiated.
    #[error("device is not bound")]
    NotBound,

    /// A session key is already set and cannot be replaced.
    #[error("device is already bound")]
    AlreadyBound,

    /// No response arrived before the operation's deadline.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// The deadline that expired, in milliseconds.
        timeout_ms: u64,
    },
}

impl Error {
    /// Builds a timeout error from the deadline that expired.
    #[must_use]
    pub fn timeout(deadline: std::time::Duration) -> Self {
        // Safe: practical deadlines never exceed u64::MAX milliseconds
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = deadline.as_millis() as u64;
        Self::Timeout { timeout_ms }
    }

    /// Returns `true` if this is a [`Error::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a [`Error::NotBound`].
    #[must_use]
    pub fn is_not_bound(&self) -> bool {
        matches!(self, Self::NotBound)
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i32,
        /// Maximum allowed value.
        max: i32,
        /// The actual value that was provided.
        actual: i32,
    },

    /// A session key did not have the 16 bytes AES-128 requires.
    #[error("cipher key must be 16 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// A cipher version string was not recognized.
    #[error("unknown cipher version: {0}")]
    UnknownCipherVersion(String),
}

/// Errors related to the UDP endpoints.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Socket operation failed.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// A payload could not be sealed.
    #[error("encryption failed")]
    Encrypt,
}

/// Errors raised while decoding a datagram.
///
/// These are expected for unrelated traffic or a wrong cipher guess, so
/// receive loops log them at trace level and drop the datagram.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The packed payload was not valid base64.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decryption or tag verification failed.
    #[error("decryption failed")]
    Decrypt,

    /// Expected field is missing from the message.
    #[error("missing field in message: {0}")]
    MissingField(&'static str),

    /// An encrypted payload arrived before any cipher was selected.
    #[error("no cipher available to decrypt payload")]
    NoCipher,

    /// The message kind is not one this client handles.
    #[error("unexpected message kind: {0}")]
    UnexpectedKind(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            min: 8,
            max: 30,
            actual: 31,
        };
        assert_eq!(err.to_string(), "value 31 is out of range [8, 30]");
    }

    #[test]
    fn error_from_value_error() {
        let value_err = ValueError::InvalidKeyLength(4);
        let err: Error = value_err.into();
        assert!(matches!(err, Error::Value(ValueError::InvalidKeyLength(4))));
    }

    #[test]
    fn timeout_from_duration() {
        let err = Error::timeout(std::time::Duration::from_millis(1500));
        assert!(err.is_timeout());
        assert!(!err.is_not_bound());
        assert_eq!(err.to_string(), "request timed out after 1500 ms");
    }

    #[test]
    fn encrypt_failure_surfaces_as_protocol_error() {
        let err: Error = ProtocolError::Encrypt.into();
        assert!(matches!(err, Error::Protocol(ProtocolError::Encrypt)));
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "protocol error: encryption failed");
    }

    #[test]
    fn decode_error_display() {
        let err = DecodeError::MissingField("pack");
        assert_eq!(err.to_string(), "missing field in message: pack");
    }
}
