// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process fake climate unit speaking the UDP protocol on loopback.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use amberac_lib::protocol::message::{self, SCAN_PAYLOAD};
use amberac_lib::types::DeviceInfo;
use amberac_lib::{Cipher, CipherVersion, DeviceConfig};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

pub const MAC: &str = "c8f742aabbcc";
pub const SESSION_KEY: &str = "Mx8Kp2Qw7Zt4Lb6N";
pub const FIRMWARE_ID: &str = "362001000762+U-CS532AE(LT)V3.31.bin";

/// Timeouts short enough for tests.
pub fn fast_config() -> DeviceConfig {
    DeviceConfig::default()
        .with_timeout(Duration::from_millis(300))
        .with_bind_timeout(Duration::from_millis(150))
}

/// What the fake saw and what it reports.
#[derive(Debug, Default)]
pub struct FakeState {
    /// Properties returned by status requests.
    pub properties: Map<String, Value>,
    /// Extra columns appended to every status response.
    pub extra: Map<String, Value>,
    /// Decoded inner payloads, in arrival order.
    pub received: Vec<Value>,
    /// Drop every request without answering.
    pub silent: bool,
}

/// A fake unit answering scans, binds, status reads and commands.
pub struct FakeAppliance {
    addr: SocketAddr,
    accepts: Vec<CipherVersion>,
    state: Arc<Mutex<FakeState>>,
    handle: JoinHandle<()>,
}

impl FakeAppliance {
    /// Starts a fake on a random loopback port.
    pub async fn start(accepts: &[CipherVersion]) -> Self {
        Self::start_on("127.0.0.1:0".parse().unwrap(), accepts).await
    }

    /// Starts a fake on the given address.
    pub async fn start_on(addr: SocketAddr, accepts: &[CipherVersion]) -> Self {
        let socket = UdpSocket::bind(addr).await.unwrap();
        let addr = socket.local_addr().unwrap();
        let state = Arc::new(Mutex::new(FakeState::default()));
        {
            let mut state = state.lock();
            state.properties = default_properties();
        }

        let accepts = accepts.to_vec();
        let handle = tokio::spawn(serve(socket, accepts.clone(), Arc::clone(&state)));
        Self {
            addr,
            accepts,
            state,
            handle,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Identity a client would get from discovery.
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.addr.ip(), MAC).with_port(self.addr.port())
    }

    pub fn state(&self) -> parking_lot::MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    /// Returns received payloads of one kind.
    pub fn received(&self, kind: &str) -> Vec<Value> {
        self.state
            .lock()
            .received
            .iter()
            .filter(|payload| payload["t"] == kind)
            .cloned()
            .collect()
    }

    /// Stops answering.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for FakeAppliance {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn default_properties() -> Map<String, Value> {
    let Value::Object(map) = json!({
        "Pow": 1,
        "Mod": 1,
        "SetTem": 24,
        "TemSen": 65,
        "TemUn": 0,
        "TemRec": 0,
        "WdSpd": 0,
        "Lig": 1,
        "hid": FIRMWARE_ID,
    }) else {
        unreachable!()
    };
    map
}

async fn serve(socket: UdpSocket, accepts: Vec<CipherVersion>, state: Arc<Mutex<FakeState>>) {
    let mut buf = vec![0u8; 65_536];
    loop {
        let Ok((len, from)) = socket.recv_from(&mut buf).await else {
            continue;
        };
        let datagram = &buf[..len];
        if state.lock().silent {
            continue;
        }

        if datagram == SCAN_PAYLOAD {
            let reply = json!({
                "t": "dev", "cid": MAC, "mac": MAC, "name": "Living room",
                "brand": "gree", "model": "gree", "ver": "V1.2.1",
            });
            let bytes = message::pack(&reply, &Cipher::generic(CipherVersion::V1), true, "app").unwrap();
            let _ = socket.send_to(&bytes, from).await;
            continue;
        }

        let Ok(envelope) = serde_json::from_slice::<Value>(datagram) else {
            continue;
        };
        let version = if envelope.get("tag").is_some() {
            CipherVersion::V2
        } else {
            CipherVersion::V1
        };
        if !accepts.contains(&version) {
            continue;
        }
        let session = Cipher::new(version, SESSION_KEY).unwrap();
        let Ok(payload) = message::unpack(datagram, Some(&session)) else {
            continue;
        };
        state.lock().received.push(payload.clone());

        let reply = match payload["t"].as_str() {
            Some("bind") => {
                let reply = json!({"t": "bindok", "mac": MAC, "key": SESSION_KEY, "r": 200});
                message::pack(&reply, &Cipher::generic(version), true, "app").unwrap()
            }
            Some("status") => {
                let state = state.lock();
                let mut cols = Vec::new();
                let mut dat = Vec::new();
                for col in payload["cols"].as_array().into_iter().flatten() {
                    if let Some(name) = col.as_str() {
                        cols.push(Value::from(name));
                        dat.push(state.properties.get(name).cloned().unwrap_or(Value::from(0)));
                    }
                }
                for (name, value) in &state.extra {
                    cols.push(Value::from(name.as_str()));
                    dat.push(value.clone());
                }
                let reply = json!({"t": "dat", "mac": MAC, "r": 200, "cols": cols, "dat": dat});
                message::pack(&reply, &session, false, "app").unwrap()
            }
            Some("cmd") => {
                let opt = payload["opt"].clone();
                let p = payload["p"].clone();
                {
                    let mut state = state.lock();
                    let names = opt.as_array().into_iter().flatten();
                    let values = p.as_array().into_iter().flatten();
                    for (name, value) in names.zip(values) {
                        if let Some(name) = name.as_str() {
                            state.properties.insert(name.to_string(), value.clone());
                        }
                    }
                }
                let reply = json!({"t": "res", "mac": MAC, "r": 200, "opt": opt, "p": p, "val": p});
                message::pack(&reply, &session, false, "app").unwrap()
            }
            _ => continue,
        };
        let _ = socket.send_to(&reply, from).await;
    }
}
