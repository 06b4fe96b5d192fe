// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closure-based [`SessionOutput`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::SessionOutput;
use crate::types::{ReceiveFunction, SendFunction};

/// Unique identifier for a registered callback.
///
/// Returned on registration and used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
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

type TelemetryCallback = Arc<dyn Fn(ReceiveFunction, &str) + Send + Sync>;
type StatusCallback = Arc<dyn Fn(SendFunction, &str) + Send + Sync>;
type SubscribedCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registry of update callbacks.
///
/// Thread-safe; callbacks may be added or removed while updates are being
/// dispatched. Callbacks of one kind run in no particular order.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    telemetry_callbacks: RwLock<HashMap<SubscriptionId, TelemetryCallback>>,
    status_callbacks: RwLock<HashMap<SubscriptionId, StatusCallback>>,
    subscribed_callbacks: RwLock<HashMap<SubscriptionId, SubscribedCallback>>,
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            telemetry_callbacks: RwLock::new(HashMap::new()),
            status_callbacks: RwLock::new(HashMap::new()),
            subscribed_callbacks: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a callback for telemetry updates.
    pub fn on_telemetry<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ReceiveFunction, &str) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.telemetry_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for actuator status updates.
    pub fn on_status<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(SendFunction, &str) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.status_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for granted subscriptions.
    pub fn on_subscription<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.subscribed_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Unregisters a callback.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.telemetry_callbacks.write().remove(&id).is_some()
            || self.status_callbacks.write().remove(&id).is_some()
            || self.subscribed_callbacks.write().remove(&id).is_some()
    }

    /// Removes every callback.
    pub fn clear(&self) {
        self.telemetry_callbacks.write().clear();
        self.status_callbacks.write().clear();
        self.subscribed_callbacks.write().clear();
    }

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.telemetry_callbacks.read().len()
            + self.status_callbacks.read().len()
            + self.subscribed_callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

/// Clones the callbacks out so none runs while the lock is held.
fn snapshot<C: Clone>(callbacks: &RwLock<HashMap<SubscriptionId, C>>) -> Vec<C> {
    callbacks.read().values().cloned().collect()
}

impl SessionOutput for CallbackRegistry {
    fn on_telemetry_update(&self, function: ReceiveFunction, payload: &str) {
        for callback in snapshot(&self.telemetry_callbacks) {
            callback(function, payload);
        }
    }

    fn on_status_update(&self, function: SendFunction, payload: &str) {
        for callback in snapshot(&self.status_callbacks) {
            callback(function, payload);
        }
    }

    fn on_subscribed(&self, topic: &str) {
        for callback in snapshot(&self.subscribed_callbacks) {
            callback(topic);
        }
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
