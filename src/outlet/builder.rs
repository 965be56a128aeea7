// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outlet builder.

use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

use crate::cache::StatusCache;
use crate::config::OutletConfig;
use crate::error::{Error, ProtocolError};
use crate::notification::{NotificationRouter, PushHandler};
use crate::outlet::{Outlet, OutletInner, StatusSource};
use crate::protocol::HttpClient;
use crate::state::{DeviceState, StateChange};
use crate::subscription::CallbackRegistry;
use crate::timer::PullTimer;
use crate::types::Property;

/// Builder wiring an [`OutletConfig`] to its collaborators.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use http_outlet::{NotificationRouter, Outlet, OutletConfig};
///
/// # async fn example() -> http_outlet::Result<()> {
/// let router = Arc::new(NotificationRouter::new());
///
/// let validated = OutletConfig::from_json_str(r#"{
///     "onUrl": "http://outlet.local/on",
///     "offUrl": "http://outlet.local/off",
///     "statusUrl": "http://outlet.local/status",
///     "notificationID": "kitchen"
/// }"#)?;
///
/// let outlet = Outlet::builder(validated.config)
///     .with_notification_router(router.clone())
///     .build()?;
///
/// router.route_json("kitchen", None, r#"{"characteristic":"On","value":true}"#);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OutletBuilder {
    config: OutletConfig,
    client: Option<HttpClient>,
    router: Option<Arc<NotificationRouter>>,
}

impl OutletBuilder {
    pub(crate) fn new(config: OutletConfig) -> Self {
        Self {
            config,
            client: None,
            router: None,
        }
    }

    /// Uses `client` instead of creating one with the default timeout.
    #[must_use]
    pub fn with_http_client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Registers the outlet with `router` when a notification ID is
    /// configured.
    #[must_use]
    pub fn with_notification_router(mut self, router: Arc<NotificationRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Builds the outlet and starts its background tasks.
    ///
    /// Polling and the message bus subscription run as Tokio tasks, so an
    /// outlet using either must be built from within a runtime.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The HTTP client cannot be created
    /// - Background tasks are needed but no Tokio runtime is running
    pub fn build(self) -> Result<Outlet, Error> {
        let Self {
            config,
            client,
            router,
        } = self;

        if (config.pull_interval.is_some() || config.mqtt.is_some())
            && tokio::runtime::Handle::try_current().is_err()
        {
            return Err(ProtocolError::NoRuntime.into());
        }

        let client = match client {
            Some(client) => client,
            None => HttpClient::new()?,
        };

        log_options(&config);

        let pull_timer = config.pull_interval.map(PullTimer::new);

        let inner = Arc::new(OutletInner {
            name: config.name.clone(),
            client,
            on: config.on,
            off: config.off,
            power: StatusSource::new(
                config.status,
                config.status_pattern,
                StatusCache::new(config.status_cache),
            ),
            outlet_in_use: config.outlet_in_use.map(|outlet_in_use| {
                StatusSource::new(
                    outlet_in_use.status,
                    outlet_in_use.pattern,
                    StatusCache::new(config.outlet_in_use_cache),
                )
            }),
            state: RwLock::new(DeviceState::new()),
            apply_lock: ReentrantMutex::new(()),
            callbacks: CallbackRegistry::new(),
            timer: pull_timer.as_ref().map(PullTimer::handle),
        });

        if let Some(timer) = &pull_timer {
            let reader = Arc::clone(&inner);
            let sink = Arc::clone(&inner);
            timer.start(
                move || {
                    let inner = Arc::clone(&reader);
                    async move { inner.read(Property::Power).await }
                },
                move |on| sink.apply(&StateChange::Power(on)),
            );
        }

        let handler: Arc<dyn PushHandler> = inner.clone();

        let registration = match (config.notification, router) {
            (Some(notification), Some(router)) => {
                router.register(notification.id.clone(), notification.password, &handler);
                Some((router, notification.id))
            }
            (Some(notification), None) => {
                tracing::warn!(
                    outlet = %inner.name,
                    notification_id = %notification.id,
                    "Notification ID configured without a notification router"
                );
                None
            }
            (None, _) => None,
        };

        #[cfg(feature = "mqtt")]
        let mqtt = config
            .mqtt
            .map(|settings| crate::protocol::MqttSubscriber::spawn(settings, Arc::downgrade(&handler)));

        #[cfg(not(feature = "mqtt"))]
        if config.mqtt.is_some() {
            tracing::error!(outlet = %inner.name, "Built without mqtt support, mqtt will not be enabled");
        }

        tracing::info!(outlet = %inner.name, "Outlet successfully configured");

        Ok(Outlet {
            inner,
            pull_timer,
            #[cfg(feature = "mqtt")]
            mqtt,
            registration,
        })
    }
}

fn log_options(config: &OutletConfig) {
    tracing::debug!(
        outlet = %config.name,
        on = %config.on,
        off = %config.off,
        status = %config.status,
        status_pattern = config.status_pattern.as_str(),
        status_cache = ?config.status_cache,
        "Power options"
    );
    if let Some(outlet_in_use) = &config.outlet_in_use {
        tracing::debug!(
            outlet = %config.name,
            status = %outlet_in_use.status,
            status_pattern = outlet_in_use.pattern.as_str(),
            cache = ?config.outlet_in_use_cache,
            "Outlet-in-use options"
        );
    }
    if let Some(interval) = config.pull_interval {
        tracing::debug!(outlet = %config.name, interval_ms = interval.as_millis(), "Pull timer enabled");
    }
    if let Some(notification) = &config.notification {
        tracing::debug!(outlet = %config.name, notification_id = %notification.id, "Notifications enabled");
    }
    if let Some(mqtt) = &config.mqtt {
        tracing::debug!(
            outlet = %config.name,
            host = %mqtt.host,
            port = mqtt.port,
            topics = ?mqtt.subscriptions.iter().map(|s| s.topic()).collect::<Vec<_>>(),
            "MQTT enabled"
        );
    }
}
