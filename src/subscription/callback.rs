// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for outlet state subscriptions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::state::StateChange;

/// Unique identifier for a subscription.
///
/// Returned when subscribing and used to unsubscribe later. IDs are unique
/// within an outlet's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
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

type BoolCallback = Arc<dyn Fn(bool) + Send + Sync>;

type StateChangedCallback = Arc<dyn Fn(&StateChange) + Send + Sync>;

/// Registry for outlet subscription callbacks.
///
/// Thread-safe through `parking_lot::RwLock`. Callbacks are cloned out of
/// the registry before they run, so a callback may itself subscribe or
/// unsubscribe without deadlocking.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    power_callbacks: RwLock<HashMap<SubscriptionId, BoolCallback>>,
    outlet_in_use_callbacks: RwLock<HashMap<SubscriptionId, BoolCallback>>,
    state_changed_callbacks: RwLock<HashMap<SubscriptionId, StateChangedCallback>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            power_callbacks: RwLock::new(HashMap::new()),
            outlet_in_use_callbacks: RwLock::new(HashMap::new()),
            state_changed_callbacks: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a callback for power changes.
    pub fn on_power_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.power_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for outlet-in-use changes.
    pub fn on_outlet_in_use_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.outlet_in_use_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback receiving every state change.
    pub fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.state_changed_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.power_callbacks.write().remove(&id).is_some()
            || self.outlet_in_use_callbacks.write().remove(&id).is_some()
            || self.state_changed_callbacks.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.power_callbacks.write().clear();
        self.outlet_in_use_callbacks.write().clear();
        self.state_changed_callbacks.write().clear();
    }

    /// Dispatches a state change to the matching callbacks.
    pub fn dispatch(&self, change: &StateChange) {
        let generic: Vec<StateChangedCallback> =
            self.state_changed_callbacks.read().values().cloned().collect();
        for callback in generic {
            callback(change);
        }

        let specific: Vec<BoolCallback> = match change {
            StateChange::Power(_) => self.power_callbacks.read().values().cloned().collect(),
            StateChange::OutletInUse(_) => self
                .outlet_in_use_callbacks
                .read()
                .values()
                .cloned()
                .collect(),
        };
        for callback in specific {
            callback(change.value());
        }
    }

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.power_callbacks.read().len()
            + self.outlet_in_use_callbacks.read().len()
            + self.state_changed_callbacks.read().len()
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
            .finish_non_exhaustive()
    }
}
