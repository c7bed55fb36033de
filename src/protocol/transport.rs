// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device UDP endpoint.
//!
//! Each [`DeviceTransport`] owns a socket connected to one device and a
//! background task reading from it. Incoming datagrams are decoded with
//! the device's session cipher (or the generic key for bind traffic),
//! handed to the device's [`ResponseHandler`], and then used to resolve
//! the pending waiter for their kind, if any.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::cipher::Cipher;
use crate::error::{Error, ProtocolError};

use super::message::{self, Request, Response, ResponseKind};

/// Largest datagram the receive loop accepts.
const MAX_DATAGRAM: usize = 65_536;

/// Receiver of decoded device messages.
///
/// Called on the transport's receive task, before the waiter for the
/// message kind is resolved.
pub trait ResponseHandler: Send + Sync + 'static {
    /// Returns the session cipher, once one is set.
    fn session(&self) -> Option<&Cipher>;

    /// Handles a status response.
    fn handle_status(&self, values: Map<String, Value>);

    /// Handles a command result.
    fn handle_result(&self, values: Map<String, Value>);
}

type Waiters = Arc<Mutex<HashMap<ResponseKind, oneshot::Sender<Response>>>>;

/// UDP endpoint connected to a single device.
///
/// The receive task is aborted when the transport is dropped.
pub struct DeviceTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    waiters: Waiters,
    receiver: JoinHandle<()>,
}

impl DeviceTransport {
    /// Opens a socket connected to `peer` and starts the receive task.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Io` if the socket cannot be bound or
    /// connected.
    pub async fn connect(
        peer: SocketAddr,
        handler: Arc<dyn ResponseHandler>,
    ) -> Result<Self, ProtocolError> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(peer).await?;
        let socket = Arc::new(socket);

        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let receiver = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            peer,
            Arc::clone(&waiters),
            handler,
        ));

        tracing::debug!(%peer, "Transport opened");
        Ok(Self {
            socket,
            peer,
            waiters,
            receiver,
        })
    }

    /// Returns the device address this transport is connected to.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends a request and waits for the response kind that answers it.
    ///
    /// The waiter is registered before the datagram is sent and replaces
    /// any earlier waiter for the same kind.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if no matching response arrives in time.
    /// A failed send is logged and reported as a timeout as well, since the
    /// request never reached the device.
    pub async fn request(
        &self,
        request: &Request,
        cipher: &Cipher,
        timeout: Duration,
    ) -> Result<Response, Error> {
        let kind = request.expected_response();
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(kind, tx);

        if let Err(error) = self.send(request, cipher).await {
            self.waiters.lock().remove(&kind);
            tracing::warn!(peer = %self.peer, %error, "Send failed");
            return Err(Error::timeout(timeout));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            // Replaced by a newer waiter, or the receive task ended
            Ok(Err(_)) => Err(Error::timeout(timeout)),
            Err(_) => {
                self.waiters.lock().remove(&kind);
                Err(Error::timeout(timeout))
            }
        }
    }

    /// Sends a request without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Io` if the datagram cannot be sent.
    pub async fn send(&self, request: &Request, cipher: &Cipher) -> Result<(), ProtocolError> {
        let datagram = request.encode(cipher)?;
        tracing::debug!(
            peer = %self.peer,
            kind = ?request.expected_response(),
            cipher = %cipher.version(),
            "Sending request"
        );
        self.socket.send(&datagram).await?;
        Ok(())
    }
}

impl Drop for DeviceTransport {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

impl std::fmt::Debug for DeviceTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTransport")
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    waiters: Waiters,
    handler: Arc<dyn ResponseHandler>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let len = match socket.recv(&mut buf).await {
            Ok(len) => len,
            // ICMP unreachable surfaces on the next read of a connected socket
            Err(e) if matches!(e.kind(), ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset) => {
                tracing::trace!(%peer, error = %e, "Device unreachable");
                continue;
            }
            Err(e) => {
                tracing::warn!(%peer, error = %e, "Receive loop stopped");
                return;
            }
        };

        let response = match message::decode(&buf[..len], handler.session()) {
            Ok(response) => response,
            Err(error) => {
                tracing::trace!(%peer, %error, "Dropping datagram");
                continue;
            }
        };

        let kind = response.kind();
        tracing::debug!(%peer, ?kind, "Received response");
        match &response {
            Response::Status(values) => handler.handle_status(values.clone()),
            Response::Result(values) => handler.handle_result(values.clone()),
            Response::Bound { .. } | Response::DeviceFound(_) => {}
        }

        if let Some(waiter) = waiters.lock().remove(&kind) {
            let _ = waiter.send(response);
        }
    }
}
