// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Push notification routing.
//!
//! A [`NotificationRouter`] is shared by every outlet of a process. Each
//! outlet configured with a `notificationID` registers itself under that ID
//! (optionally protected by a password). Whatever receives notifications,
//! usually an HTTP server outside this crate, hands each body to
//! [`NotificationRouter::route`], which forwards it to the matching outlet.
//!
//! ```text
//! POST /outlet-kitchen  {"characteristic": "On", "value": true}
//!                     ↓
//!        NotificationRouter.route("outlet-kitchen", ...)
//!                     ↓
//!        Weak<dyn PushHandler>.upgrade()
//!                     ↓
//!        apply_notification("On", true)
//! ```
//!
//! Registrations hold weak references, so dropping an outlet is enough to
//! stop routing to it.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::ReconcileError;
use crate::types::parse_switch_value;

/// Receiver of out-of-band property updates.
///
/// Implemented by outlets. Push sources never see the error: it is returned
/// for logging and tests only.
pub trait PushHandler: Send + Sync {
    /// Applies `value` to the property named `property_key`.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::UnknownProperty` if the key does not name a
    /// property the handler exposes.
    fn apply_notification(&self, property_key: &str, value: bool) -> Result<(), ReconcileError>;
}

/// A push notification body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Notification {
    /// Name of the property to update.
    pub characteristic: String,
    /// The new value.
    pub value: serde_json::Value,
}

impl Notification {
    /// Creates a notification carrying a boolean value.
    #[must_use]
    pub fn new(characteristic: impl Into<String>, value: bool) -> Self {
        Self {
            characteristic: characteristic.into(),
            value: serde_json::Value::Bool(value),
        }
    }

    /// Interprets the value as a boolean.
    ///
    /// Accepts JSON booleans, numbers (non-zero is `true`) and the strings
    /// understood by [`parse_switch_value`].
    #[must_use]
    pub fn bool_value(&self) -> Option<bool> {
        match &self.value {
            serde_json::Value::Bool(value) => Some(*value),
            serde_json::Value::Number(number) => number.as_f64().map(|n| n != 0.0),
            serde_json::Value::String(text) => parse_switch_value(text),
            _ => None,
        }
    }
}

/// What happened to a routed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The outlet accepted the update.
    Delivered,
    /// No live outlet is registered under the ID.
    UnknownId,
    /// The password did not match the registration.
    Unauthorized,
    /// The body could not be parsed.
    Malformed(String),
    /// The outlet rejected the update.
    Rejected(ReconcileError),
}

impl RouteOutcome {
    /// Returns `true` if the update was applied.
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

struct Registration {
    password: Option<String>,
    handler: Weak<dyn PushHandler>,
}

/// Routes push notifications to registered outlets by notification ID.
#[derive(Default)]
pub struct NotificationRouter {
    registrations: RwLock<HashMap<String, Registration>>,
}

impl NotificationRouter {
    /// Creates a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `id`.
    ///
    /// If a previous registration exists for this ID, it is replaced.
    pub fn register(
        &self,
        id: impl Into<String>,
        password: Option<String>,
        handler: &Arc<dyn PushHandler>,
    ) {
        let id = id.into();
        tracing::debug!(notification_id = %id, "Registering outlet for notifications");
        self.registrations.write().insert(
            id,
            Registration {
                password,
                handler: Arc::downgrade(handler),
            },
        );
    }

    /// Unregisters an ID.
    ///
    /// Returns `true` if the ID was previously registered.
    pub fn unregister(&self, id: &str) -> bool {
        tracing::debug!(notification_id = %id, "Unregistering outlet from notifications");
        self.registrations.write().remove(id).is_some()
    }

    /// Unregisters `id` only if it is still bound to `handler`.
    ///
    /// Returns `true` if the registration was removed. A registration that
    /// has since been replaced by another handler is left in place.
    pub fn unregister_handler(&self, id: &str, handler: &Arc<dyn PushHandler>) -> bool {
        let mut registrations = self.registrations.write();
        let owned = registrations.get(id).is_some_and(|registration| {
            std::ptr::addr_eq(registration.handler.as_ptr(), Arc::as_ptr(handler))
        });
        if owned {
            tracing::debug!(notification_id = %id, "Unregistering outlet from notifications");
            registrations.remove(id);
        } else {
            tracing::debug!(notification_id = %id, "Registration belongs to another outlet, keeping it");
        }
        owned
    }

    /// Routes a parsed notification to the outlet registered under `id`.
    pub fn route(&self, id: &str, password: Option<&str>, notification: &Notification) -> RouteOutcome {
        let handler = {
            let registrations = self.registrations.read();
            let Some(registration) = registrations.get(id) else {
                tracing::debug!(notification_id = %id, "No outlet registered for notification");
                return RouteOutcome::UnknownId;
            };

            if let Some(expected) = &registration.password
                && password != Some(expected.as_str())
            {
                tracing::warn!(notification_id = %id, "Rejecting notification with wrong password");
                return RouteOutcome::Unauthorized;
            }

            registration.handler.upgrade()
        };

        let Some(handler) = handler else {
            tracing::debug!(notification_id = %id, "Outlet for notification was dropped");
            return RouteOutcome::UnknownId;
        };

        let Some(value) = notification.bool_value() else {
            let err = ReconcileError::InvalidValue {
                property: notification.characteristic.clone(),
                value: notification.value.to_string(),
            };
            tracing::warn!(notification_id = %id, error = %err, "Dropping notification");
            return RouteOutcome::Rejected(err);
        };

        match handler.apply_notification(&notification.characteristic, value) {
            Ok(()) => RouteOutcome::Delivered,
            Err(err) => RouteOutcome::Rejected(err),
        }
    }

    /// Parses a JSON body and routes it.
    pub fn route_json(&self, id: &str, password: Option<&str>, body: &str) -> RouteOutcome {
        match serde_json::from_str::<Notification>(body) {
            Ok(notification) => self.route(id, password, &notification),
            Err(err) => {
                tracing::warn!(notification_id = %id, error = %err, "Dropping malformed notification");
                RouteOutcome::Malformed(err.to_string())
            }
        }
    }

    /// Removes registrations whose outlet has been dropped.
    pub fn cleanup(&self) {
        self.registrations.write().retain(|id, registration| {
            let alive = registration.handler.strong_count() > 0;
            if !alive {
                tracing::debug!(notification_id = %id, "Cleaning up dropped outlet");
            }
            alive
        });
    }

    /// Returns the number of registrations, live or not.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.registrations.read().len()
    }
}

impl std::fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRouter")
            .field("registration_count", &self.registration_count())
            .finish()
    }
}
