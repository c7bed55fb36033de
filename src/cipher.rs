// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload encryption for the two protocol cipher variants.
//!
//! Devices never announce which variant they speak, so the client probes
//! during binding (see [`Device::bind`](crate::Device::bind)). Both variants
//! use AES-128; they differ in block mode and in the fixed "generic" key
//! used before a session key has been negotiated:
//!
//! - [`CipherVersion::V1`]: AES-128-ECB with PKCS#7 padding.
//! - [`CipherVersion::V2`]: AES-128-GCM with a fixed nonce and associated
//!   data; the authentication tag travels next to the payload.
//!
//! Ciphertext is carried base64-encoded inside the JSON envelope.

use std::fmt;
use std::str::FromStr;

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes_gcm::aead::AeadInPlace;
use aes_gcm::{Aes128Gcm, Nonce, Tag};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{DecodeError, ProtocolError, ValueError};

/// Length of an AES-128 key, and of every session key the devices issue.
pub const KEY_LEN: usize = 16;

const BLOCK_LEN: usize = 16;
const TAG_LEN: usize = 16;

const GENERIC_KEY_V1: &str = "a3K8Bx%2r8Y7#xDh";
const GENERIC_KEY_V2: &str = "{yxAHAY_Lm6pbC/<";

const GCM_NONCE: [u8; 12] = [
    0x54, 0x40, 0x78, 0x44, 0x49, 0x67, 0x5a, 0x51, 0x6c, 0x5e, 0x63, 0x13,
];
const GCM_AAD: &[u8] = b"qualcomm-test";

/// One of the two mutually incompatible encryption schemes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum CipherVersion {
    /// AES-128-ECB.
    V1,
    /// AES-128-GCM.
    V2,
}

impl CipherVersion {
    /// Returns the fixed key used for binding and discovery traffic.
    #[must_use]
    pub const fn generic_key(self) -> &'static str {
        match self {
            Self::V1 => GENERIC_KEY_V1,
            Self::V2 => GENERIC_KEY_V2,
        }
    }
}

impl fmt::Display for CipherVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("V1"),
            Self::V2 => f.write_str("V2"),
        }
    }
}

impl FromStr for CipherVersion {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "V1" | "1" => Ok(Self::V1),
            "V2" | "2" => Ok(Self::V2),
            _ => Err(ValueError::UnknownCipherVersion(s.to_string())),
        }
    }
}

/// An encrypted payload ready to be placed in an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Base64 ciphertext (the envelope's `pack` field).
    pub pack: String,
    /// Base64 authentication tag (the envelope's `tag` field), V2 only.
    pub tag: Option<String>,
}

/// A cipher variant bound to a key.
///
/// # Examples
///
/// ```
/// use amberac_lib::cipher::{Cipher, CipherVersion};
///
/// let cipher = Cipher::new(CipherVersion::V1, "0123456789abcdef").unwrap();
/// let sealed = cipher.encrypt(br#"{"t":"status"}"#).unwrap();
/// let opened = cipher.decrypt(&sealed.pack, sealed.tag.as_deref()).unwrap();
/// assert_eq!(opened, br#"{"t":"status"}"#);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Cipher {
    version: CipherVersion,
    key: String,
}

impl Cipher {
    /// Creates a cipher for the given variant and key.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidKeyLength` unless the key is 16 bytes.
    pub fn new(version: CipherVersion, key: impl Into<String>) -> Result<Self, ValueError> {
        let key = key.into();
        if key.len() != KEY_LEN {
            return Err(ValueError::InvalidKeyLength(key.len()));
        }
        Ok(Self { version, key })
    }

    /// Creates the variant's cipher under its fixed generic key.
    #[must_use]
    pub fn generic(version: CipherVersion) -> Self {
        Self {
            version,
            key: version.generic_key().to_string(),
        }
    }

    /// Returns the cipher variant.
    #[must_use]
    pub fn version(&self) -> CipherVersion {
        self.version
    }

    /// Returns the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Encrypts a plaintext payload.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Encrypt` if GCM refuses the payload, which
    /// only happens past its length limit.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Sealed, ProtocolError> {
        match self.version {
            CipherVersion::V1 => Ok(Sealed {
                pack: STANDARD.encode(self.ecb_encrypt(plaintext)),
                tag: None,
            }),
            CipherVersion::V2 => {
                let mut buffer = plaintext.to_vec();
                let tag = self
                    .gcm()
                    .encrypt_in_place_detached(Nonce::from_slice(&GCM_NONCE), GCM_AAD, &mut buffer)
                    .map_err(|_| ProtocolError::Encrypt)?;
                Ok(Sealed {
                    pack: STANDARD.encode(&buffer),
                    tag: Some(STANDARD.encode(tag)),
                })
            }
        }
    }

    /// Decrypts a base64 payload, verifying the tag for V2.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the payload is not base64, the tag is
    /// missing or wrong, or the block layout is invalid.
    pub fn decrypt(&self, pack: &str, tag: Option<&str>) -> Result<Vec<u8>, DecodeError> {
        let mut buffer = STANDARD.decode(pack)?;
        match self.version {
            CipherVersion::V1 => {
                if buffer.is_empty() || buffer.len() % BLOCK_LEN != 0 {
                    return Err(DecodeError::Decrypt);
                }
                let aes = self.aes();
                for block in buffer.chunks_exact_mut(BLOCK_LEN) {
                    aes.decrypt_block(GenericArray::from_mut_slice(block));
                }
                // Padding bytes are never '}', so the JSON ends at the last brace
                let end = buffer
                    .iter()
                    .rposition(|&b| b == b'}')
                    .ok_or(DecodeError::Decrypt)?;
                buffer.truncate(end + 1);
                Ok(buffer)
            }
            CipherVersion::V2 => {
                let tag = STANDARD.decode(tag.ok_or(DecodeError::MissingField("tag"))?)?;
                if tag.len() != TAG_LEN {
                    return Err(DecodeError::Decrypt);
                }
                self.gcm()
                    .decrypt_in_place_detached(
                        Nonce::from_slice(&GCM_NONCE),
                        GCM_AAD,
                        &mut buffer,
                        Tag::from_slice(&tag),
                    )
                    .map_err(|_| DecodeError::Decrypt)?;
                Ok(buffer)
            }
        }
    }

    fn ecb_encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let pad = BLOCK_LEN - plaintext.len() % BLOCK_LEN;
        let mut buffer = Vec::with_capacity(plaintext.len() + pad);
        buffer.extend_from_slice(plaintext);
        // Safe: pad is in 1..=16
        #[allow(clippy::cast_possible_truncation)]
        buffer.resize(plaintext.len() + pad, pad as u8);

        let aes = self.aes();
        for block in buffer.chunks_exact_mut(BLOCK_LEN) {
            aes.encrypt_block(GenericArray::from_mut_slice(block));
        }
        buffer
    }

    fn aes(&self) -> Aes128 {
        Aes128::new(GenericArray::from_slice(self.key.as_bytes()))
    }

    fn gcm(&self) -> Aes128Gcm {
        Aes128Gcm::new(GenericArray::from_slice(self.key.as_bytes()))
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Session keys are credentials; keep them out of logs
        f.debug_struct("Cipher")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
