// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for device subscriptions.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry for storing and dispatching callbacks

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::state::PropertyStore;

/// Unique identifier for a subscription.
///
/// Returned when registering a callback and used to unsubscribe later.
/// IDs are unique within the issuing registry and increase with
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Issues increasing subscription IDs, starting at 1.
#[derive(Debug)]
pub(crate) struct IdGenerator(AtomicU64);

impl IdGenerator {
    pub(crate) const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub(crate) fn next(&self) -> SubscriptionId {
        SubscriptionId::new(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Callback receiving a snapshot of the property store.
type StateUpdatedCallback = Arc<dyn Fn(&PropertyStore) + Send + Sync>;

/// Callback receiving the name/value pairs of a command result.
type CommandResultCallback = Arc<dyn Fn(&Map<String, Value>) + Send + Sync>;

/// Registry for a device's subscription callbacks.
///
/// Callbacks run synchronously, in registration order, on the task that
/// processed the device message. They are cloned out of the registry
/// before being invoked, so a callback may unsubscribe itself.
pub struct CallbackRegistry {
    ids: IdGenerator,
    state_updated: RwLock<BTreeMap<SubscriptionId, StateUpdatedCallback>>,
    command_result: RwLock<BTreeMap<SubscriptionId, CommandResultCallback>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::new(),
            state_updated: RwLock::new(BTreeMap::new()),
            command_result: RwLock::new(BTreeMap::new()),
        }
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for processed status responses.
    ///
    /// The callback receives the whole property store after the update.
    pub fn on_state_updated<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PropertyStore) + Send + Sync + 'static,
    {
        let id = self.ids.next();
        self.state_updated.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for command results.
    pub fn on_command_result<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Map<String, Value>) + Send + Sync + 'static,
    {
        let id = self.ids.next();
        self.command_result.write().insert(id, Arc::new(callback));
        id
    }

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state_updated.write().remove(&id).is_some()
            || self.command_result.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.state_updated.write().clear();
        self.command_result.write().clear();
    }

    // =========================================================================
    // Dispatch methods
    // =========================================================================

    /// Dispatches a state snapshot to the state callbacks.
    pub fn dispatch_state_updated(&self, store: &PropertyStore) {
        let callbacks: Vec<_> = self.state_updated.read().values().cloned().collect();
        for callback in callbacks {
            callback(store);
        }
    }

    /// Dispatches a command result to the result callbacks.
    pub fn dispatch_command_result(&self, values: &Map<String, Value>) {
        let callbacks: Vec<_> = self.command_result.read().values().cloned().collect();
        for callback in callbacks {
            callback(values);
        }
    }

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.state_updated.read().len() + self.command_result.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}
