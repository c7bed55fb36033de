// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire codec for the UDP protocol.
//!
//! Every datagram except the scan probe is a JSON envelope carrying an
//! encrypted, base64 encoded inner payload:
//!
//! ```text
//! {"cid":"app","i":0,"t":"pack","uid":0,"tcid":"<mac>","pack":"<base64>","tag":"<base64>"}
//! ```
//!
//! `i = 1` marks payloads sealed under the variant's generic key (bind
//! traffic and scan responses). The `tag` is only present for V2.

use std::net::IpAddr;

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::cipher::{Cipher, CipherVersion};
use crate::error::{DecodeError, ProtocolError};
use crate::types::DeviceInfo;

/// Cleartext scan probe.
pub const SCAN_PAYLOAD: &[u8] = br#"{"t":"scan"}"#;

/// A message sent to a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Broadcast discovery probe, sent in cleartext.
    Scan,
    /// Session key request, sealed under the generic key.
    Bind {
        /// Target MAC.
        mac: String,
    },
    /// Property read.
    Status {
        /// Target MAC.
        mac: String,
        /// Property names to read.
        cols: Vec<String>,
    },
    /// Property write.
    Command {
        /// Target MAC.
        mac: String,
        /// Name/value pairs to write, in order.
        pairs: Vec<(String, Value)>,
    },
}

impl Request {
    /// Creates a bind request.
    #[must_use]
    pub fn bind(mac: impl Into<String>) -> Self {
        Self::Bind { mac: mac.into() }
    }

    /// Creates a status request for the given columns.
    #[must_use]
    pub fn status(mac: impl Into<String>, cols: Vec<String>) -> Self {
        Self::Status {
            mac: mac.into(),
            cols,
        }
    }

    /// Creates a command writing the given pairs.
    #[must_use]
    pub fn command(mac: impl Into<String>, pairs: Vec<(String, Value)>) -> Self {
        Self::Command {
            mac: mac.into(),
            pairs,
        }
    }

    /// Returns the response kind that answers this request.
    #[must_use]
    pub fn expected_response(&self) -> ResponseKind {
        match self {
            Self::Scan => ResponseKind::DeviceFound,
            Self::Bind { .. } => ResponseKind::Bound,
            Self::Status { .. } => ResponseKind::Status,
            Self::Command { .. } => ResponseKind::Result,
        }
    }

    /// Returns the inner JSON payload.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Scan => json!({"t": "scan"}),
            Self::Bind { mac } => json!({"mac": mac, "t": "bind", "uid": 0}),
            Self::Status { mac, cols } => json!({"cols": cols, "mac": mac, "t": "status"}),
            Self::Command { pairs, .. } => {
                let (opt, p): (Vec<&str>, Vec<&Value>) =
                    pairs.iter().map(|(n, v)| (n.as_str(), v)).unzip();
                json!({"opt": opt, "p": p, "t": "cmd"})
            }
        }
    }

    /// Encodes the request as a datagram.
    ///
    /// Bind requests are sealed under the generic key of `cipher`'s variant;
    /// status and command requests under `cipher` itself. The scan probe is
    /// sent in cleartext.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Encrypt` if the payload cannot be sealed.
    pub fn encode(&self, cipher: &Cipher) -> Result<Vec<u8>, ProtocolError> {
        match self {
            Self::Scan => Ok(SCAN_PAYLOAD.to_vec()),
            Self::Bind { mac } => pack(
                &self.payload(),
                &Cipher::generic(cipher.version()),
                true,
                mac,
            ),
            Self::Status { mac, .. } | Self::Command { mac, .. } => {
                pack(&self.payload(), cipher, false, mac)
            }
        }
    }
}

/// Kinds of responses the client routes to waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    /// Scan response (`dev`).
    DeviceFound,
    /// Bind confirmation (`bindok`).
    Bound,
    /// Status response (`dat`).
    Status,
    /// Command result (`res`).
    Result,
}

/// Identity fields of a scan response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ScanReply {
    /// Hardware MAC.
    #[serde(default)]
    pub mac: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Brand.
    #[serde(default)]
    pub brand: Option<String>,
    /// Model.
    #[serde(default)]
    pub model: Option<String>,
    /// Module version.
    #[serde(default)]
    pub ver: Option<String>,
}

impl ScanReply {
    /// Builds the device identity for a reply received from `ip:port`.
    #[must_use]
    pub fn into_device_info(self, ip: IpAddr, port: u16) -> DeviceInfo {
        let mut info = DeviceInfo::new(ip, self.mac).with_port(port);
        if let Some(name) = self.name.filter(|n| !n.is_empty()) {
            info = info.with_name(name);
        }
        info.with_vendor(self.brand, self.model, self.ver)
    }
}

/// A decoded message from a device.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Scan response.
    DeviceFound(ScanReply),
    /// Bind confirmation, carrying the session key.
    Bound {
        /// MAC of the confirming device.
        mac: String,
        /// The negotiated session key, if the device sent one.
        key: Option<String>,
    },
    /// Status response as a name/value map.
    Status(Map<String, Value>),
    /// Command result as a name/value map.
    Result(Map<String, Value>),
}

impl Response {
    /// Returns the kind of this response.
    #[must_use]
    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::DeviceFound(_) => ResponseKind::DeviceFound,
            Self::Bound { .. } => ResponseKind::Bound,
            Self::Status(_) => ResponseKind::Status,
            Self::Result(_) => ResponseKind::Result,
        }
    }

    /// Parses an inner payload.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError::UnexpectedKind` for payload kinds the client
    /// does not handle, `DecodeError::MissingField` for incomplete payloads.
    pub fn from_payload(payload: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut body) = payload else {
            return Err(DecodeError::MissingField("t"));
        };
        let kind = match body.get("t") {
            Some(Value::String(t)) => t.clone(),
            _ => return Err(DecodeError::MissingField("t")),
        };

        match kind.as_str() {
            "dev" => Ok(Self::DeviceFound(serde_json::from_value(Value::Object(
                body,
            ))?)),
            "bindok" => Ok(Self::Bound {
                mac: take_string(&mut body, "mac").unwrap_or_default(),
                key: take_string(&mut body, "key"),
            }),
            "dat" => {
                let cols = take_array(&mut body, "cols")?;
                let dat = take_array(&mut body, "dat")?;
                Ok(Self::Status(zip_names(cols, dat)))
            }
            "res" => {
                let opt = take_array(&mut body, "opt")?;
                let values = match take_array(&mut body, "val") {
                    Ok(val) => val,
                    Err(_) => take_array(&mut body, "p")?,
                };
                Ok(Self::Result(zip_names(opt, values)))
            }
            other => Err(DecodeError::UnexpectedKind(other.to_string())),
        }
    }
}

fn take_string(body: &mut Map<String, Value>, field: &str) -> Option<String> {
    match body.remove(field) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

fn take_array(body: &mut Map<String, Value>, field: &'static str) -> Result<Vec<Value>, DecodeError> {
    match body.remove(field) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(DecodeError::MissingField(field)),
    }
}

fn zip_names(names: Vec<Value>, values: Vec<Value>) -> Map<String, Value> {
    names
        .into_iter()
        .zip(values)
        .filter_map(|(name, value)| match name {
            Value::String(name) => Some((name, value)),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    t: String,
    #[serde(default)]
    i: u8,
    pack: Option<String>,
    #[serde(default)]
    tag: Option<String>,
}

/// Seals a payload into an envelope datagram.
///
/// `generic` sets the `i` flag and must match whether `cipher` holds the
/// variant's generic key.
///
/// # Errors
///
/// Returns `ProtocolError::Encrypt` if the payload cannot be sealed.
pub fn pack(
    payload: &Value,
    cipher: &Cipher,
    generic: bool,
    tcid: &str,
) -> Result<Vec<u8>, ProtocolError> {
    let sealed = cipher.encrypt(payload.to_string().as_bytes())?;
    let mut envelope = json!({
        "cid": "app",
        "i": u8::from(generic),
        "t": "pack",
        "uid": 0,
        "tcid": tcid,
        "pack": sealed.pack,
    });
    if let (Some(tag), Value::Object(fields)) = (sealed.tag, &mut envelope) {
        fields.insert("tag".to_string(), Value::String(tag));
    }
    Ok(envelope.to_string().into_bytes())
}

/// Opens an envelope datagram and returns its inner payload.
///
/// The variant is inferred from the presence of a tag. Payloads flagged
/// with `i = 1` are opened with that variant's generic key; others need
/// the session cipher.
///
/// # Errors
///
/// Returns `DecodeError` if the datagram is not an envelope, a session
/// payload arrives without a cipher, or decryption or parsing fails.
pub fn unpack(datagram: &[u8], session: Option<&Cipher>) -> Result<Value, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(datagram)?;
    if envelope.t != "pack" {
        return Err(DecodeError::UnexpectedKind(envelope.t));
    }
    let pack = envelope.pack.ok_or(DecodeError::MissingField("pack"))?;
    let version = if envelope.tag.is_some() {
        CipherVersion::V2
    } else {
        CipherVersion::V1
    };

    let plaintext = if envelope.i == 1 {
        Cipher::generic(version).decrypt(&pack, envelope.tag.as_deref())?
    } else {
        let cipher = session.ok_or(DecodeError::NoCipher)?;
        if cipher.version() != version {
            return Err(DecodeError::Decrypt);
        }
        cipher.decrypt(&pack, envelope.tag.as_deref())?
    };
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Decodes a datagram into a response.
///
/// # Errors
///
/// Returns `DecodeError` for anything that is not a well formed response
/// this client understands. Callers drop such datagrams.
pub fn decode(datagram: &[u8], session: Option<&Cipher>) -> Result<Response, DecodeError> {
    Response::from_payload(unpack(datagram, session)?)
}
