// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire protocol for communicating with climate units over UDP.
//!
//! - [`message`]: request builders and the response decoder
//! - [`DeviceTransport`]: a socket connected to one device, routing decoded
//!   responses to a [`ResponseHandler`] and to per-kind waiters
//!
//! Discovery uses its own broadcast socket, see
//! [`Discovery`](crate::discovery::Discovery).

pub mod message;
mod transport;

pub use message::{Request, Response, ResponseKind, ScanReply};
pub use transport::{DeviceTransport, ResponseHandler};
