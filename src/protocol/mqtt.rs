// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT subscription channel feeding push updates into an outlet.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use regex::Regex;

use crate::error::ProtocolError;
use crate::notification::PushHandler;
use crate::types::parse_switch_value;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// One subscribed topic and how its payload maps to a property.
#[derive(Clone)]
pub struct MqttSubscription {
    topic: String,
    property_key: String,
    message_pattern: Option<Regex>,
    pattern_group: usize,
}

impl MqttSubscription {
    /// Creates a subscription whose whole payload is the value.
    #[must_use]
    pub fn new(topic: impl Into<String>, property_key: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            property_key: property_key.into(),
            message_pattern: None,
            pattern_group: 1,
        }
    }

    /// Extracts the value from capture group `group` of `pattern` instead of
    /// using the whole payload.
    #[must_use]
    pub fn with_message_pattern(mut self, pattern: Regex, group: usize) -> Self {
        self.message_pattern = Some(pattern);
        self.pattern_group = group;
        self
    }

    /// Returns the topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the property key updates are applied to.
    #[must_use]
    pub fn property_key(&self) -> &str {
        &self.property_key
    }

    /// Interprets a payload as a boolean value.
    ///
    /// Returns `None` when the pattern does not match or the extracted text
    /// is not a switch value.
    #[must_use]
    pub fn extract(&self, payload: &str) -> Option<bool> {
        let text = match &self.message_pattern {
            Some(pattern) => pattern.captures(payload)?.get(self.pattern_group)?.as_str(),
            None => payload,
        };
        parse_switch_value(text)
    }
}

impl fmt::Debug for MqttSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSubscription")
            .field("topic", &self.topic)
            .field("property_key", &self.property_key)
            .field("message_pattern", &self.message_pattern.as_ref().map(Regex::as_str))
            .field("pattern_group", &self.pattern_group)
            .finish()
    }
}

impl PartialEq for MqttSubscription {
    fn eq(&self, other: &Self) -> bool {
        self.topic == other.topic
            && self.property_key == other.property_key
            && self.message_pattern.as_ref().map(Regex::as_str)
                == other.message_pattern.as_ref().map(Regex::as_str)
            && self.pattern_group == other.pattern_group
    }
}

/// Validated message bus settings.
#[derive(Clone, PartialEq)]
pub struct MqttSettings {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Client ID; generated when absent.
    pub client_id: Option<String>,
    /// Broker credentials.
    pub credentials: Option<(String, String)>,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// Subscribed topics.
    pub subscriptions: Vec<MqttSubscription>,
}

impl MqttSettings {
    /// Default broker port.
    pub const DEFAULT_PORT: u16 = 1883;
    /// Default keep-alive interval.
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(30);

    /// Creates settings for `host` with default port and no subscriptions.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            client_id: None,
            credentials: None,
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            subscriptions: Vec::new(),
        }
    }

    /// Returns the subscription for `topic`, if any.
    #[must_use]
    pub fn subscription(&self, topic: &str) -> Option<&MqttSubscription> {
        self.subscriptions.iter().find(|s| s.topic == topic)
    }

    #[cfg_attr(not(feature = "mqtt"), allow(dead_code))]
    fn resolved_client_id(&self) -> String {
        self.client_id.clone().unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("http_outlet_{}_{}", std::process::id(), counter)
        })
    }
}

impl fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field(
                "credentials",
                &self.credentials.as_ref().map(|(user, _)| (user, "***")),
            )
            .field("keep_alive", &self.keep_alive)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

/// Parses a broker address into host and port.
///
/// Accepts `mqtt://host:port`, `tcp://host:port`, `host:port` and `host`.
pub(crate) fn parse_broker_address(address: &str) -> Result<(String, Option<u16>), ProtocolError> {
    let address = address
        .strip_prefix("mqtt://")
        .or_else(|| address.strip_prefix("tcp://"))
        .unwrap_or(address);

    if address.is_empty() || address.contains("://") {
        return Err(ProtocolError::InvalidAddress(address.to_string()));
    }

    if let Some((host, port)) = address.rsplit_once(':') {
        let port = port
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {port}")))?;
        Ok((host.to_string(), Some(port)))
    } else {
        Ok((address.to_string(), None))
    }
}

/// Applies a received message to the handler.
///
/// Returns `false` if the message was dropped.
#[cfg_attr(not(feature = "mqtt"), allow(dead_code))]
pub(crate) fn deliver(
    settings: &MqttSettings,
    handler: &dyn PushHandler,
    topic: &str,
    payload: &str,
) -> bool {
    let Some(subscription) = settings.subscription(topic) else {
        tracing::trace!(topic = %topic, "Ignoring message on unsubscribed topic");
        return false;
    };

    let Some(value) = subscription.extract(payload) else {
        tracing::warn!(topic = %topic, payload = %payload, "Could not interpret MQTT payload");
        return false;
    };

    match handler.apply_notification(subscription.property_key(), value) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(topic = %topic, error = %err, "Dropping MQTT update");
            false
        }
    }
}

#[cfg(feature = "mqtt")]
pub use subscriber::MqttSubscriber;

#[cfg(feature = "mqtt")]
mod subscriber {
    use std::sync::Weak;
    use std::time::Duration;

    use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
    use tokio::task::JoinHandle;

    use super::{MqttSettings, deliver};
    use crate::notification::PushHandler;

    /// Delay before polling the event loop again after a connection error.
    const RECONNECT_DELAY: Duration = Duration::from_secs(5);

    /// Background MQTT subscription.
    ///
    /// Subscribes every configured topic on each (re)connection and hands
    /// decoded values to the push handler. The task ends when the subscriber
    /// is dropped or the handler goes away.
    #[derive(Debug)]
    pub struct MqttSubscriber {
        client: AsyncClient,
        task: JoinHandle<()>,
    }

    impl MqttSubscriber {
        /// Starts the subscription task.
        ///
        /// Must be called from within a Tokio runtime.
        #[must_use]
        pub fn spawn(settings: MqttSettings, handler: Weak<dyn PushHandler>) -> Self {
            let mut options =
                MqttOptions::new(settings.resolved_client_id(), &settings.host, settings.port);
            options.set_keep_alive(settings.keep_alive);
            options.set_clean_session(true);
            if let Some((username, password)) = &settings.credentials {
                options.set_credentials(username, password);
            }

            let capacity = 10.max(settings.subscriptions.len() * 2);
            let (client, event_loop) = AsyncClient::new(options, capacity);

            tracing::debug!(
                host = %settings.host,
                port = settings.port,
                topics = settings.subscriptions.len(),
                "Starting MQTT subscriber"
            );

            let task = tokio::spawn(handle_mqtt_events(
                event_loop,
                client.clone(),
                settings,
                handler,
            ));

            Self { client, task }
        }

        /// Disconnects from the broker.
        pub fn shutdown(&self) {
            let _ = self.client.try_disconnect();
            self.task.abort();
        }
    }

    impl Drop for MqttSubscriber {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    async fn handle_mqtt_events(
        mut event_loop: EventLoop,
        client: AsyncClient,
        settings: MqttSettings,
        handler: Weak<dyn PushHandler>,
    ) {
        loop {
            match event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    tracing::debug!(?connack, "MQTT connected");
                    for subscription in &settings.subscriptions {
                        if let Err(e) = client.try_subscribe(subscription.topic(), QoS::AtLeastOnce) {
                            tracing::error!(topic = %subscription.topic(), error = %e, "MQTT subscribe failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(suback))) => {
                    tracing::debug!(?suback, "MQTT subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let Some(handler) = handler.upgrade() else {
                        break;
                    };
                    let Ok(payload) = std::str::from_utf8(&publish.payload) else {
                        tracing::warn!(topic = %publish.topic, "Ignoring non UTF-8 MQTT payload");
                        continue;
                    };
                    tracing::debug!(topic = %publish.topic, payload = %payload, "Received MQTT message");
                    deliver(&settings, handler.as_ref(), &publish.topic, payload);
                }
                Ok(_) => {}
                Err(e) => {
                    if handler.strong_count() == 0 {
                        break;
                    }
                    tracing::error!(error = %e, "MQTT event loop error");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }

        tracing::debug!("MQTT subscriber stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        applied: Mutex<Vec<(String, bool)>>,
    }

    impl PushHandler for Recorder {
        fn apply_notification(&self, property_key: &str, value: bool) -> Result<(), ReconcileError> {
            if property_key == "Brightness" {
                return Err(ReconcileError::UnknownProperty(property_key.to_string()));
            }
            self.applied.lock().push((property_key.to_string(), value));
            Ok(())
        }
    }

    #[test]
    fn parse_broker_address_variants() {
        assert_eq!(
            parse_broker_address("mqtt://192.168.1.50:1883").unwrap(),
            ("192.168.1.50".to_string(), Some(1883))
        );
        assert_eq!(
            parse_broker_address("tcp://broker.local:8883").unwrap(),
            ("broker.local".to_string(), Some(8883))
        );
        assert_eq!(
            parse_broker_address("broker.local").unwrap(),
            ("broker.local".to_string(), None)
        );
        assert!(parse_broker_address("broker:port").is_err());
        assert!(parse_broker_address("ws://broker").is_err());
    }

    #[test]
    fn extract_whole_payload() {
        let subscription = MqttSubscription::new("stat/plug/POWER", "On");
        assert_eq!(subscription.extract("ON"), Some(true));
        assert_eq!(subscription.extract("off"), Some(false));
        assert_eq!(subscription.extract("unknown"), None);
    }

    #[test]
    fn extract_with_pattern_group() {
        let subscription = MqttSubscription::new("tele/plug/STATE", "On")
            .with_message_pattern(Regex::new(r#""POWER":"(\w+)""#).unwrap(), 1);

        assert_eq!(subscription.extract(r#"{"POWER":"ON","Uptime":"1T"}"#), Some(true));
        assert_eq!(subscription.extract(r#"{"Uptime":"1T"}"#), None);
    }

    #[test]
    fn extract_missing_group_is_none() {
        let subscription = MqttSubscription::new("t", "On")
            .with_message_pattern(Regex::new("(ON)").unwrap(), 2);
        assert_eq!(subscription.extract("ON"), None);
    }

    #[test]
    fn deliver_routes_by_topic() {
        let mut settings = MqttSettings::new("broker");
        settings.subscriptions = vec![
            MqttSubscription::new("stat/plug/POWER", "On"),
            MqttSubscription::new("stat/plug/LOAD", "OutletInUse"),
            MqttSubscription::new("stat/plug/DIM", "Brightness"),
        ];
        let recorder = Recorder::default();

        assert!(deliver(&settings, &recorder, "stat/plug/POWER", "ON"));
        assert!(deliver(&settings, &recorder, "stat/plug/LOAD", "0"));
        assert!(!deliver(&settings, &recorder, "stat/other/POWER", "ON"));
        assert!(!deliver(&settings, &recorder, "stat/plug/POWER", "garbage"));
        assert!(!deliver(&settings, &recorder, "stat/plug/DIM", "1"));

        assert_eq!(
            recorder.applied.lock().as_slice(),
            &[("On".to_string(), true), ("OutletInUse".to_string(), false)]
        );
    }

    #[test]
    fn settings_debug_hides_password() {
        let mut settings = MqttSettings::new("broker");
        settings.credentials = Some(("user".to_string(), "hunter2".to_string()));
        let debug = format!("{settings:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn generated_client_ids_are_unique() {
        let settings = MqttSettings::new("broker");
        assert_ne!(settings.resolved_client_id(), settings.resolved_client_id());
    }
}
