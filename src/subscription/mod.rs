// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer lists for device notifications.
//!
//! Each [`Device`](crate::Device) owns a [`CallbackRegistry`]. Callbacks
//! are invoked synchronously in the step that produced the change and can
//! be removed with the [`SubscriptionId`] returned at registration.
//!
//! ```
//! use amberac_lib::subscription::CallbackRegistry;
//!
//! let registry = CallbackRegistry::new();
//! let id = registry.on_state_updated(|store| {
//!     println!("{} properties known", store.len());
//! });
//! assert!(registry.unsubscribe(id));
//! ```

mod callback;

pub(crate) use callback::IdGenerator;
pub use callback::{CallbackRegistry, SubscriptionId};
