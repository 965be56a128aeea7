// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The outlet device instance.
//!
//! An [`Outlet`] owns one validated configuration and keeps a single
//! [`DeviceState`] in sync from every source of truth:
//!
//! ```text
//!  read_power() ──► StatusCache ──miss──► HttpClient::fetch_status ──┐
//!                       │ hit                                        │
//!                       └──────────► DeviceState ◄───────────────────┘
//!                                        ▲    ▲
//!  PullTimer (every interval) ── read ───┘    │
//!  NotificationRouter / MQTT ── apply_notification
//! ```
//!
//! Every value change is dispatched to the callbacks registered through
//! [`Subscribable`].
//!
//! # Examples
//!
//! ```no_run
//! use http_outlet::{Accessory, Outlet, OutletConfig};
//!
//! # async fn example() -> http_outlet::Result<()> {
//! let validated = OutletConfig::from_json_str(r#"{
//!     "onUrl": "http://outlet.local/on",
//!     "offUrl": "http://outlet.local/off",
//!     "statusUrl": "http://outlet.local/status",
//!     "statusCache": 5000,
//!     "pullInterval": 30000
//! }"#)?;
//! let outlet = Outlet::builder(validated.config).build()?;
//!
//! outlet.write_power(true).await?;
//! let on = outlet.read_power().await?;
//! # Ok(())
//! # }
//! ```

mod builder;

pub use builder::OutletBuilder;

use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::Serialize;
use tokio::time::Instant;

use crate::cache::StatusCache;
use crate::config::OutletConfig;
use crate::error::{Error, ReconcileError};
use crate::notification::{NotificationRouter, PushHandler};
use crate::protocol::{Endpoint, HttpClient};
#[cfg(feature = "mqtt")]
use crate::protocol::MqttSubscriber;
use crate::state::{DeviceState, StateChange};
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};
use crate::timer::{PullTimer, PullTimerHandle};
use crate::types::{Property, StatusPattern};

/// Operations the surrounding accessory framework calls on an outlet.
#[allow(async_fn_in_trait)]
pub trait Accessory {
    /// Reads the power state, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `Error::Request` if the status query fails.
    async fn read_power(&self) -> Result<bool, Error>;

    /// Switches the outlet on or off. Never cached.
    ///
    /// # Errors
    ///
    /// Returns `Error::Request` if the command fails.
    async fn write_power(&self, on: bool) -> Result<(), Error>;

    /// Reads whether the outlet is drawing load, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapabilityNotSupported` if the property is not
    /// configured, or `Error::Request` if the status query fails.
    async fn read_outlet_in_use(&self) -> Result<bool, Error>;

    /// Applies a pushed value.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError::UnknownProperty` if the outlet does not
    /// expose the property.
    fn apply_notification(&self, property_key: &str, value: bool) -> Result<(), ReconcileError>;
}

/// Static accessory information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessoryInformation {
    /// Manufacturer.
    pub manufacturer: &'static str,
    /// Model.
    pub model: &'static str,
    /// Serial number.
    pub serial_number: &'static str,
    /// Firmware revision.
    pub firmware_revision: &'static str,
}

impl AccessoryInformation {
    const OUTLET: Self = Self {
        manufacturer: "http_outlet",
        model: "HTTP Outlet",
        serial_number: "OT01",
        firmware_revision: env!("CARGO_PKG_VERSION"),
    };
}

/// A status endpoint with its pattern and cache gate.
#[derive(Debug)]
struct StatusSource {
    endpoint: Endpoint,
    pattern: StatusPattern,
    cache: Mutex<StatusCache>,
}

impl StatusSource {
    fn new(endpoint: Endpoint, pattern: StatusPattern, cache: StatusCache) -> Self {
        Self {
            endpoint,
            pattern,
            cache: Mutex::new(cache),
        }
    }
}

/// State shared between the outlet, its pull timer and its push sources.
#[derive(Debug)]
struct OutletInner {
    name: String,
    client: HttpClient,
    on: Endpoint,
    off: Endpoint,
    power: StatusSource,
    outlet_in_use: Option<StatusSource>,
    state: RwLock<DeviceState>,
    /// Serializes store-then-dispatch so subscribers see changes in the
    /// order they were stored. Reentrant for callbacks that push again.
    apply_lock: ReentrantMutex<()>,
    callbacks: CallbackRegistry,
    timer: Option<PullTimerHandle>,
}

impl OutletInner {
    fn source(&self, property: Property) -> Option<&StatusSource> {
        match property {
            Property::Power => Some(&self.power),
            Property::OutletInUse => self.outlet_in_use.as_ref(),
        }
    }

    fn reset_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.reset_timer();
        }
    }

    /// Reads `property` through its cache gate.
    async fn read(&self, property: Property) -> Result<bool, Error> {
        let source = self.source(property).ok_or(Error::CapabilityNotSupported)?;

        let fresh = !source.cache.lock().should_query(Instant::now());
        if fresh {
            let stored = self.state.read().get(property);
            if let Some(value) = stored {
                tracing::debug!(
                    outlet = %self.name,
                    %property,
                    value,
                    infinite = source.cache.lock().is_infinite(),
                    "Returning cached value"
                );
                return Ok(value);
            }
        }

        let value = match self.client.fetch_status(&source.endpoint, &source.pattern).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(outlet = %self.name, %property, error = %err, "Status read failed");
                return Err(err.into());
            }
        };

        source.cache.lock().mark_queried(Instant::now());
        tracing::debug!(outlet = %self.name, %property, value, "Status read succeeded");
        self.apply(&StateChange::new(property, value));
        Ok(value)
    }

    async fn write_power(&self, on: bool) -> Result<(), Error> {
        let endpoint = if on { &self.on } else { &self.off };

        if let Err(err) = self.client.send_command(endpoint).await {
            tracing::warn!(outlet = %self.name, on, error = %err, "Power write failed");
            return Err(err.into());
        }

        tracing::debug!(outlet = %self.name, on, "Power set");
        self.apply(&StateChange::Power(on));
        Ok(())
    }

    /// Stores a value and notifies subscribers if it changed.
    fn apply(&self, change: &StateChange) {
        let _ordered = self.apply_lock.lock();
        let changed = self.state.write().apply(change);
        if changed {
            self.callbacks.dispatch(change);
        }
    }
}

impl PushHandler for OutletInner {
    fn apply_notification(&self, property_key: &str, value: bool) -> Result<(), ReconcileError> {
        let property = property_key
            .parse::<Property>()
            .ok()
            .filter(|property| self.source(*property).is_some())
            .ok_or_else(|| ReconcileError::UnknownProperty(property_key.to_string()));

        let property = match property {
            Ok(property) => property,
            Err(err) => {
                tracing::warn!(outlet = %self.name, error = %err, "Ignoring push update");
                return Err(err);
            }
        };

        if property == Property::Power {
            self.reset_timer();
        }

        tracing::info!(outlet = %self.name, %property, value, "Updating from push");
        self.apply(&StateChange::new(property, value));
        Ok(())
    }
}

/// An HTTP-controlled outlet.
///
/// Created through [`Outlet::builder`]. Dropping the outlet stops its pull
/// timer and message bus subscription.
#[derive(Debug)]
pub struct Outlet {
    inner: Arc<OutletInner>,
    pull_timer: Option<PullTimer>,
    #[cfg(feature = "mqtt")]
    mqtt: Option<MqttSubscriber>,
    registration: Option<(Arc<NotificationRouter>, String)>,
}

impl Outlet {
    /// Creates a builder for an outlet with the given configuration.
    #[must_use]
    pub fn builder(config: OutletConfig) -> OutletBuilder {
        OutletBuilder::new(config)
    }

    /// Returns the outlet name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        *self.inner.state.read()
    }

    /// Returns `true` if the outlet exposes the outlet-in-use property.
    #[must_use]
    pub fn has_outlet_in_use(&self) -> bool {
        self.inner.outlet_in_use.is_some()
    }

    /// Returns the static accessory information.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn information(&self) -> AccessoryInformation {
        AccessoryInformation::OUTLET
    }

    /// Handles an identify request.
    pub fn identify(&self) {
        tracing::info!(outlet = %self.inner.name, "Identify requested");
    }

    /// Returns a handle to the pull timer, if polling is enabled.
    #[must_use]
    pub fn pull_timer(&self) -> Option<PullTimerHandle> {
        self.pull_timer.as_ref().map(PullTimer::handle)
    }

    /// Returns the push entry point of this outlet, for custom push sources.
    #[must_use]
    pub fn push_handler(&self) -> Arc<dyn PushHandler> {
        self.inner.clone()
    }

    /// Stops polling and the message bus subscription for good.
    pub fn stop(&self) {
        if let Some(timer) = &self.pull_timer {
            timer.stop();
        }
        #[cfg(feature = "mqtt")]
        if let Some(mqtt) = &self.mqtt {
            mqtt.shutdown();
        }
    }
}

impl Drop for Outlet {
    fn drop(&mut self) {
        if let Some((router, id)) = self.registration.take() {
            let handler: Arc<dyn PushHandler> = self.inner.clone();
            router.unregister_handler(&id, &handler);
        }
    }
}

impl Accessory for Outlet {
    async fn read_power(&self) -> Result<bool, Error> {
        self.inner.reset_timer();
        self.inner.read(Property::Power).await
    }

    async fn write_power(&self, on: bool) -> Result<(), Error> {
        self.inner.reset_timer();
        self.inner.write_power(on).await
    }

    async fn read_outlet_in_use(&self) -> Result<bool, Error> {
        self.inner.read(Property::OutletInUse).await
    }

    fn apply_notification(&self, property_key: &str, value: bool) -> Result<(), ReconcileError> {
        self.inner.apply_notification(property_key, value)
    }
}

impl Subscribable for Outlet {
    fn on_power_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_power_changed(callback)
    }

    fn on_outlet_in_use_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_outlet_in_use_changed(callback)
    }

    fn on_state_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_state_changed(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(id)
    }
}
