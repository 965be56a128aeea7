// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outlet configuration and its validation.
//!
//! Accessory configurations arrive as loosely typed JSON. [`OutletConfig::from_json`]
//! walks the whole document, collecting fatal errors and advisory warnings as
//! it goes. Either every fatal finding is returned at once, or a complete,
//! immutable [`OutletConfig`] together with the warnings that were resolved
//! by falling back to a default.
//!
//! # Examples
//!
//! ```
//! use http_outlet::config::OutletConfig;
//!
//! let validated = OutletConfig::from_json_str(r#"{
//!     "name": "Desk Lamp",
//!     "onUrl": "http://192.168.1.20/relay?state=1",
//!     "offUrl": "http://192.168.1.20/relay?state=0",
//!     "statusUrl": "http://192.168.1.20/relay",
//!     "statusCache": "soon"
//! }"#).unwrap();
//!
//! assert_eq!(validated.config.name, "Desk Lamp");
//! assert_eq!(validated.warnings.len(), 1);
//! ```

use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde_json::{Map, Value};

use crate::cache::CacheTtl;
use crate::error::{ConfigError, ConfigWarning};
use crate::protocol::{Credentials, Endpoint, MqttSettings, MqttSubscription, parse_broker_address};
use crate::types::StatusPattern;

/// Name used when the configuration gives none.
pub const DEFAULT_NAME: &str = "Outlet";

/// A configuration that passed validation, with the warnings found on the way.
#[derive(Debug, Clone)]
pub struct Validated<T> {
    /// The validated value.
    pub config: T,
    /// Advisory findings, already resolved by falling back to defaults.
    pub warnings: Vec<ConfigWarning>,
}

/// Status endpoint of the outlet-in-use property.
#[derive(Debug, Clone)]
pub struct OutletInUseConfig {
    /// Status query endpoint.
    pub status: Endpoint,
    /// Pattern interpreting the status body.
    pub pattern: StatusPattern,
}

/// Identity under which the outlet receives push notifications.
#[derive(Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Notification ID.
    pub id: String,
    /// Password a notification must carry, if any.
    pub password: Option<String>,
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("id", &self.id)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Validated outlet configuration.
///
/// Built either from JSON through [`OutletConfig::from_json`] or
/// programmatically:
///
/// ```
/// use std::time::Duration;
/// use http_outlet::cache::CacheTtl;
/// use http_outlet::config::OutletConfig;
/// use http_outlet::protocol::Endpoint;
///
/// let config = OutletConfig::new(
///     Endpoint::parse("http://outlet.local/on").unwrap(),
///     Endpoint::parse("http://outlet.local/off").unwrap(),
///     Endpoint::parse("http://outlet.local/status").unwrap(),
/// )
/// .with_name("Heater")
/// .with_status_cache(CacheTtl::For(Duration::from_secs(5)))
/// .with_pull_interval(Duration::from_secs(30));
///
/// assert_eq!(config.name, "Heater");
/// ```
#[derive(Debug, Clone)]
pub struct OutletConfig {
    /// Display name.
    pub name: String,
    /// Power-on command endpoint.
    pub on: Endpoint,
    /// Power-off command endpoint.
    pub off: Endpoint,
    /// Power status endpoint.
    pub status: Endpoint,
    /// Pattern interpreting the power status body.
    pub status_pattern: StatusPattern,
    /// Outlet-in-use property, if exposed.
    pub outlet_in_use: Option<OutletInUseConfig>,
    /// Cache lifetime of the power status.
    pub status_cache: CacheTtl,
    /// Cache lifetime of the outlet-in-use status.
    pub outlet_in_use_cache: CacheTtl,
    /// Polling interval. `None` disables polling.
    pub pull_interval: Option<Duration>,
    /// Push notification identity.
    pub notification: Option<NotificationConfig>,
    /// Message bus subscription.
    pub mqtt: Option<MqttSettings>,
}

impl OutletConfig {
    /// Creates a configuration with the three required power endpoints and
    /// defaults for everything else.
    #[must_use]
    pub fn new(on: Endpoint, off: Endpoint, status: Endpoint) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            on,
            off,
            status,
            status_pattern: StatusPattern::default(),
            outlet_in_use: None,
            status_cache: CacheTtl::Never,
            outlet_in_use_cache: CacheTtl::Never,
            pull_interval: None,
            notification: None,
            mqtt: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the power status pattern.
    #[must_use]
    pub fn with_status_pattern(mut self, pattern: StatusPattern) -> Self {
        self.status_pattern = pattern;
        self
    }

    /// Exposes the outlet-in-use property.
    #[must_use]
    pub fn with_outlet_in_use(mut self, status: Endpoint, pattern: StatusPattern) -> Self {
        self.outlet_in_use = Some(OutletInUseConfig { status, pattern });
        self
    }

    /// Sets the power status cache lifetime.
    #[must_use]
    pub fn with_status_cache(mut self, ttl: CacheTtl) -> Self {
        self.status_cache = ttl;
        self
    }

    /// Sets the outlet-in-use cache lifetime.
    #[must_use]
    pub fn with_outlet_in_use_cache(mut self, ttl: CacheTtl) -> Self {
        self.outlet_in_use_cache = ttl;
        self
    }

    /// Enables polling.
    #[must_use]
    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = Some(interval);
        self
    }

    /// Sets the push notification identity.
    #[must_use]
    pub fn with_notification(mut self, id: impl Into<String>, password: Option<String>) -> Self {
        self.notification = Some(NotificationConfig {
            id: id.into(),
            password,
        });
        self
    }

    /// Enables the message bus subscription.
    #[must_use]
    pub fn with_mqtt(mut self, settings: MqttSettings) -> Self {
        self.mqtt = Some(settings);
        self
    }

    /// Applies `credentials` to every endpoint.
    #[must_use]
    pub fn with_credentials(mut self, credentials: &Credentials) -> Self {
        self.on = self.on.with_credentials(credentials.clone());
        self.off = self.off.with_credentials(credentials.clone());
        self.status = self.status.with_credentials(credentials.clone());
        if let Some(outlet_in_use) = self.outlet_in_use.as_mut() {
            outlet_in_use.status = outlet_in_use.status.clone().with_credentials(credentials.clone());
        }
        self
    }

    /// Parses and validates a JSON configuration document.
    ///
    /// Warnings are logged as they are found and also returned.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` if the text is not JSON, otherwise the
    /// errors of [`from_json`](Self::from_json).
    pub fn from_json_str(text: &str) -> Result<Validated<Self>, ConfigError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
        Self::from_json(&value)
    }

    /// Validates a JSON configuration document.
    ///
    /// Warnings are logged as they are found and also returned.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` listing every fatal finding.
    pub fn from_json(value: &Value) -> Result<Validated<Self>, ConfigError> {
        let Some(root) = value.as_object() else {
            return Err(ConfigError::Invalid(vec![ConfigError::InvalidType {
                property: "<root>".to_string(),
                expected: "an object",
            }]));
        };

        let mut findings = Findings::default();

        let on = findings.required_endpoint(root, "onUrl", "onUrl");
        let off = findings.required_endpoint(root, "offUrl", "offUrl");
        let status = findings.required_endpoint(root, "statusUrl", "statusUrl");
        let status_pattern = findings.pattern(root.get("statusPattern"), "statusPattern");
        let outlet_in_use = findings.outlet_in_use(root.get("outletInUse"));
        let status_cache = findings.cache(root.get("statusCache"), "statusCache");
        let outlet_in_use_cache = findings.cache(root.get("outletInUseCache"), "outletInUseCache");
        let pull_interval = findings.pull_interval(root.get("pullInterval"));
        let credentials = findings.auth(root.get("auth"));
        let notification = notification(root);
        let mqtt = findings.mqtt(root.get("mqtt"));

        let name = root
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_NAME)
            .to_string();

        let Findings { errors, warnings } = findings;
        let (Some(on), Some(off), Some(status), Some(outlet_in_use)) = (on, off, status, outlet_in_use)
        else {
            return Err(ConfigError::Invalid(errors));
        };
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        let mut config = Self {
            name,
            on,
            off,
            status,
            status_pattern,
            outlet_in_use,
            status_cache,
            outlet_in_use_cache,
            pull_interval,
            notification,
            mqtt,
        };
        if let Some(credentials) = credentials {
            config = config.with_credentials(&credentials);
        }

        Ok(Validated { config, warnings })
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Default)]
struct Findings {
    errors: Vec<ConfigError>,
    warnings: Vec<ConfigWarning>,
}

impl Findings {
    fn warn(&mut self, warning: ConfigWarning) {
        tracing::warn!(warning = %warning, "Configuration warning");
        self.warnings.push(warning);
    }

    fn required_endpoint(
        &mut self,
        object: &Map<String, Value>,
        key: &str,
        property: &str,
    ) -> Option<Endpoint> {
        match object.get(key).filter(|value| is_set(value)) {
            Some(value) => self.endpoint(value, property),
            None => {
                self.errors.push(ConfigError::MissingProperty(property.to_string()));
                None
            }
        }
    }

    fn endpoint(&mut self, value: &Value, property: &str) -> Option<Endpoint> {
        match parse_endpoint(value, property) {
            Ok(endpoint) => Some(endpoint),
            Err(err) => {
                self.errors.push(err);
                None
            }
        }
    }

    fn pattern(&mut self, value: Option<&Value>, property: &'static str) -> StatusPattern {
        let source = match value {
            None | Some(Value::Null) => return StatusPattern::default(),
            Some(Value::String(source)) => source,
            Some(_) => {
                self.warn(ConfigWarning::InvalidPattern {
                    property,
                    message: "not a string".to_string(),
                });
                return StatusPattern::default();
            }
        };

        StatusPattern::compile(Some(source)).unwrap_or_else(|e| {
            self.warn(ConfigWarning::InvalidPattern {
                property,
                message: e.to_string(),
            });
            StatusPattern::default()
        })
    }

    /// Returns `None` on a fatal error, `Some(None)` when the property is
    /// not configured.
    fn outlet_in_use(&mut self, value: Option<&Value>) -> Option<Option<OutletInUseConfig>> {
        let object = match value {
            None | Some(Value::Null) => return Some(None),
            Some(Value::Object(object)) => object,
            Some(_) => {
                self.errors.push(ConfigError::InvalidType {
                    property: "outletInUse".to_string(),
                    expected: "an object",
                });
                return None;
            }
        };

        let status = self.required_endpoint(object, "statusUrl", "outletInUse.statusUrl");
        let pattern = self.pattern(object.get("statusPattern"), "outletInUse.statusPattern");
        status.map(|status| Some(OutletInUseConfig { status, pattern }))
    }

    fn cache(&mut self, value: Option<&Value>, property: &'static str) -> CacheTtl {
        match value {
            None | Some(Value::Null) => CacheTtl::Never,
            Some(Value::Number(number)) => number.as_f64().map_or(CacheTtl::Never, CacheTtl::from_millis),
            Some(_) => {
                self.warn(ConfigWarning::UnsupportedCacheType { property });
                CacheTtl::Never
            }
        }
    }

    #[allow(clippy::float_cmp)]
    fn pull_interval(&mut self, value: Option<&Value>) -> Option<Duration> {
        let millis = match value {
            None | Some(Value::Null) => return None,
            Some(Value::Number(number)) => number.as_f64(),
            Some(_) => None,
        };

        match millis {
            Some(millis) if millis == 0.0 => None,
            Some(millis) if millis > 0.0 => {
                let interval = Duration::try_from_secs_f64(millis / 1000.0).ok();
                if interval.is_none() {
                    self.warn(ConfigWarning::InvalidPullInterval);
                }
                interval
            }
            _ => {
                self.warn(ConfigWarning::InvalidPullInterval);
                None
            }
        }
    }

    fn auth(&mut self, value: Option<&Value>) -> Option<Credentials> {
        let value = value.filter(|value| !value.is_null())?;

        let (Some(username), Some(password)) = (
            non_empty_str(value.get("username")),
            non_empty_str(value.get("password")),
        ) else {
            self.warn(ConfigWarning::IncompleteAuth);
            return None;
        };

        let send_immediately = value
            .get("sendImmediately")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        Some(Credentials::new(username, password).with_send_immediately(send_immediately))
    }

    fn mqtt(&mut self, value: Option<&Value>) -> Option<MqttSettings> {
        let value = value.filter(|value| !value.is_null())?;
        match parse_mqtt(value) {
            Ok(settings) => Some(settings),
            Err(message) => {
                self.warn(ConfigWarning::MqttDisabled(message));
                None
            }
        }
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|text| !text.is_empty())
}

fn notification(root: &Map<String, Value>) -> Option<NotificationConfig> {
    let id = non_empty_str(root.get("notificationID"))?;
    Some(NotificationConfig {
        id: id.to_string(),
        password: non_empty_str(root.get("notificationPassword")).map(str::to_string),
    })
}

fn parse_endpoint(value: &Value, property: &str) -> Result<Endpoint, ConfigError> {
    match value {
        Value::String(url) => parse_url(url, property).map(Endpoint::new),
        Value::Object(object) => parse_endpoint_object(object, property),
        _ => Err(ConfigError::InvalidType {
            property: property.to_string(),
            expected: "a URL string or an endpoint object",
        }),
    }
}

fn parse_url(url: &str, property: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        property: property.to_string(),
        message: e.to_string(),
    })
}

fn parse_endpoint_object(object: &Map<String, Value>, property: &str) -> Result<Endpoint, ConfigError> {
    let url = match object.get("url") {
        Some(Value::String(url)) if !url.is_empty() => url,
        Some(Value::String(_) | Value::Null) | None => {
            return Err(ConfigError::MissingProperty(format!("{property}.url")));
        }
        Some(_) => {
            return Err(ConfigError::InvalidType {
                property: format!("{property}.url"),
                expected: "a string",
            });
        }
    };
    let mut endpoint = Endpoint::new(parse_url(url, property)?);

    if let Some(method) = object.get("method").filter(|value| !value.is_null()) {
        let Some(method) = method.as_str() else {
            return Err(ConfigError::InvalidType {
                property: format!("{property}.method"),
                expected: "a string",
            });
        };
        let parsed = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            ConfigError::InvalidMethod {
                property: property.to_string(),
                method: method.to_string(),
            }
        })?;
        endpoint = endpoint.with_method(parsed);
    }

    match object.get("body") {
        None | Some(Value::Null) => {}
        Some(Value::String(body)) => endpoint = endpoint.with_body(body.clone()),
        Some(body) => endpoint = endpoint.with_body(body.to_string()),
    }

    if let Some(headers) = object.get("headers").filter(|value| !value.is_null()) {
        let invalid = || ConfigError::InvalidType {
            property: format!("{property}.headers"),
            expected: "an object of string values",
        };
        let headers = headers.as_object().ok_or_else(invalid)?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = value
                .as_str()
                .and_then(|value| HeaderValue::from_str(value).ok())
                .ok_or_else(invalid)?;
            endpoint = endpoint.with_header(name, value);
        }
    }

    if let Some(auth) = object.get("auth").filter(|value| !value.is_null())
        && let (Some(username), Some(password)) = (
            non_empty_str(auth.get("username")),
            non_empty_str(auth.get("password")),
        )
    {
        let send_immediately = auth
            .get("sendImmediately")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        endpoint = endpoint.with_credentials(
            Credentials::new(username, password).with_send_immediately(send_immediately),
        );
    }

    if let Some(timeout) = object.get("requestTimeout").filter(|value| !value.is_null()) {
        let timeout = timeout
            .as_f64()
            .filter(|millis| *millis > 0.0)
            .and_then(|millis| Duration::try_from_secs_f64(millis / 1000.0).ok())
            .ok_or_else(|| ConfigError::InvalidType {
                property: format!("{property}.requestTimeout"),
                expected: "a positive number of milliseconds",
            })?;
        endpoint = endpoint.with_timeout(timeout);
    }

    Ok(endpoint)
}

// ============================================================================
// MQTT
// ============================================================================

fn parse_mqtt(value: &Value) -> Result<MqttSettings, String> {
    let object = value.as_object().ok_or("'mqtt' must be an object")?;

    let host = non_empty_str(object.get("host")).ok_or("'mqtt.host' is required")?;
    let (host, address_port) = parse_broker_address(host).map_err(|e| e.to_string())?;

    if let Some(protocol) = object.get("protocol").filter(|value| !value.is_null()) {
        match protocol.as_str() {
            Some("mqtt" | "tcp") => {}
            _ => return Err(format!("unsupported protocol {protocol}")),
        }
    }

    let mut settings = MqttSettings::new(host);
    settings.port = match object.get("port") {
        None | Some(Value::Null) => address_port.unwrap_or(MqttSettings::DEFAULT_PORT),
        Some(port) => port
            .as_u64()
            .and_then(|port| u16::try_from(port).ok())
            .filter(|port| *port != 0)
            .ok_or_else(|| format!("'mqtt.port' is not a valid port: {port}"))?,
    };

    settings.client_id = non_empty_str(object.get("clientId")).map(str::to_string);

    match (
        non_empty_str(object.get("username")),
        non_empty_str(object.get("password")),
    ) {
        (Some(username), Some(password)) => {
            settings.credentials = Some((username.to_string(), password.to_string()));
        }
        (None, None) => {}
        _ => return Err("'mqtt.username' and 'mqtt.password' must be set together".to_string()),
    }

    if let Some(keep_alive) = object.get("keepalive").filter(|value| !value.is_null()) {
        settings.keep_alive = keep_alive
            .as_u64()
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("'mqtt.keepalive' is not a positive number: {keep_alive}"))?;
    }

    settings.subscriptions = match object.get("subscriptions") {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_subscription(item, index))
            .collect::<Result<_, _>>()?,
        Some(item @ Value::Object(_)) => vec![parse_subscription(item, 0)?],
        _ => return Err("'mqtt.subscriptions' must be an object or an array".to_string()),
    };

    if settings.subscriptions.is_empty() {
        return Err("'mqtt.subscriptions' is empty".to_string());
    }

    Ok(settings)
}

fn parse_subscription(value: &Value, index: usize) -> Result<MqttSubscription, String> {
    let topic = non_empty_str(value.get("topic"))
        .ok_or_else(|| format!("'mqtt.subscriptions[{index}].topic' is required"))?;
    let characteristic = non_empty_str(value.get("characteristic"))
        .ok_or_else(|| format!("'mqtt.subscriptions[{index}].characteristic' is required"))?;

    let subscription = MqttSubscription::new(topic, characteristic);

    let Some(pattern) = non_empty_str(value.get("messagePattern")) else {
        return Ok(subscription);
    };
    let pattern = Regex::new(pattern)
        .map_err(|e| format!("'mqtt.subscriptions[{index}].messagePattern' is invalid: {e}"))?;

    let group = match value.get("patternGroupToExtract") {
        None | Some(Value::Null) => 1,
        Some(group) => group
            .as_u64()
            .and_then(|group| usize::try_from(group).ok())
            .ok_or_else(|| {
                format!("'mqtt.subscriptions[{index}].patternGroupToExtract' is not a number")
            })?,
    };

    Ok(subscription.with_message_pattern(pattern, group))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "onUrl": "http://outlet.local/on",
            "offUrl": "http://outlet.local/off",
            "statusUrl": "http://outlet.local/status"
        })
    }

    fn with(mut base: Value, key: &str, value: Value) -> Value {
        base[key] = value;
        base
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let validated = OutletConfig::from_json(&minimal()).unwrap();
        let config = validated.config;

        assert!(validated.warnings.is_empty());
        assert_eq!(config.name, "Outlet");
        assert_eq!(config.status_pattern, StatusPattern::default());
        assert_eq!(config.status_cache, CacheTtl::Never);
        assert!(config.outlet_in_use.is_none());
        assert!(config.pull_interval.is_none());
        assert!(config.notification.is_none());
        assert!(config.mqtt.is_none());
        assert_eq!(config.on.method(), &Method::GET);
    }

    #[test]
    fn missing_endpoints_are_all_reported() {
        let err = OutletConfig::from_json(&json!({ "onUrl": "http://outlet.local/on" })).unwrap_err();
        assert_eq!(
            err.findings(),
            vec![
                &ConfigError::MissingProperty("offUrl".to_string()),
                &ConfigError::MissingProperty("statusUrl".to_string()),
            ]
        );
    }

    #[test]
    fn empty_url_counts_as_missing() {
        let err = OutletConfig::from_json(&with(minimal(), "onUrl", json!(""))).unwrap_err();
        assert_eq!(err.findings(), vec![&ConfigError::MissingProperty("onUrl".to_string())]);
    }

    #[test]
    fn unparseable_url_is_fatal() {
        let err = OutletConfig::from_json(&with(minimal(), "statusUrl", json!("not a url"))).unwrap_err();
        assert!(matches!(
            err.findings()[0],
            ConfigError::InvalidUrl { property, .. } if property == "statusUrl"
        ));
    }

    #[test]
    fn non_object_root_is_fatal() {
        assert!(OutletConfig::from_json(&json!([1, 2])).is_err());
        assert!(matches!(
            OutletConfig::from_json_str("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn endpoint_object_is_parsed() {
        let config = with(
            minimal(),
            "onUrl",
            json!({
                "url": "http://outlet.local/api",
                "method": "post",
                "body": { "state": "on" },
                "headers": { "X-Api-Key": "abc" },
                "requestTimeout": 1500
            }),
        );
        let on = OutletConfig::from_json(&config).unwrap().config.on;

        assert_eq!(on.method(), &Method::POST);
        assert_eq!(on.body(), Some(r#"{"state":"on"}"#));
        assert_eq!(on.headers()["x-api-key"], "abc");
        assert_eq!(on.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn endpoint_object_errors() {
        let cases = [
            (json!({ "method": "GET" }), "onUrl.url"),
            (json!({ "url": "http://x/", "method": "GE T" }), "onUrl"),
            (json!({ "url": "http://x/", "headers": ["a"] }), "onUrl.headers"),
            (json!(42), "onUrl"),
        ];
        for (endpoint, property) in cases {
            let err = OutletConfig::from_json(&with(minimal(), "onUrl", endpoint)).unwrap_err();
            let finding = err.findings()[0].clone();
            let reported = match finding {
                ConfigError::MissingProperty(p) => p,
                ConfigError::InvalidType { property, .. }
                | ConfigError::InvalidMethod { property, .. } => property,
                other => panic!("unexpected finding {other:?}"),
            };
            assert_eq!(reported, property);
        }
    }

    #[test]
    fn invalid_pattern_falls_back_with_warning() {
        let validated = OutletConfig::from_json(&with(minimal(), "statusPattern", json!("(unclosed"))).unwrap();
        assert_eq!(validated.config.status_pattern, StatusPattern::default());
        assert!(matches!(
            validated.warnings.as_slice(),
            [ConfigWarning::InvalidPattern { property: "statusPattern", .. }]
        ));
    }

    #[test]
    fn custom_pattern_is_compiled() {
        let validated = OutletConfig::from_json(&with(minimal(), "statusPattern", json!("\"POWER\":\"ON\""))).unwrap();
        assert!(validated.config.status_pattern.test(r#"{"POWER":"ON"}"#));
    }

    #[test]
    fn outlet_in_use_requires_status_url() {
        let err = OutletConfig::from_json(&with(minimal(), "outletInUse", json!({}))).unwrap_err();
        assert_eq!(
            err.findings(),
            vec![&ConfigError::MissingProperty("outletInUse.statusUrl".to_string())]
        );

        let err = OutletConfig::from_json(&with(minimal(), "outletInUse", json!("yes"))).unwrap_err();
        assert!(matches!(err.findings()[0], ConfigError::InvalidType { .. }));
    }

    #[test]
    fn outlet_in_use_is_parsed() {
        let config = with(
            minimal(),
            "outletInUse",
            json!({ "statusUrl": "http://outlet.local/load", "statusPattern": "[1-9]" }),
        );
        let outlet_in_use = OutletConfig::from_json(&config).unwrap().config.outlet_in_use.unwrap();
        assert_eq!(outlet_in_use.status.url().path(), "/load");
        assert!(outlet_in_use.pattern.test("load=7"));
    }

    #[test]
    fn cache_values() {
        let cases = [
            (json!(0), CacheTtl::Never),
            (json!(2500), CacheTtl::For(Duration::from_millis(2500))),
            (json!(-1), CacheTtl::Infinite),
        ];
        for (value, expected) in cases {
            let validated = OutletConfig::from_json(&with(minimal(), "statusCache", value)).unwrap();
            assert_eq!(validated.config.status_cache, expected);
            assert!(validated.warnings.is_empty());
        }
    }

    #[test]
    fn non_numeric_cache_warns() {
        let validated = OutletConfig::from_json(&with(minimal(), "outletInUseCache", json!("10s"))).unwrap();
        assert_eq!(validated.config.outlet_in_use_cache, CacheTtl::Never);
        assert_eq!(
            validated.warnings,
            vec![ConfigWarning::UnsupportedCacheType {
                property: "outletInUseCache"
            }]
        );
    }

    #[test]
    fn pull_interval_values() {
        let validated = OutletConfig::from_json(&with(minimal(), "pullInterval", json!(5000))).unwrap();
        assert_eq!(validated.config.pull_interval, Some(Duration::from_secs(5)));

        let validated = OutletConfig::from_json(&with(minimal(), "pullInterval", json!(0))).unwrap();
        assert!(validated.config.pull_interval.is_none());
        assert!(validated.warnings.is_empty());

        for value in [json!(-5), json!("often")] {
            let validated = OutletConfig::from_json(&with(minimal(), "pullInterval", value)).unwrap();
            assert!(validated.config.pull_interval.is_none());
            assert_eq!(validated.warnings, vec![ConfigWarning::InvalidPullInterval]);
        }
    }

    #[test]
    fn auth_applies_to_every_endpoint() {
        let config = with(
            with(
                minimal(),
                "outletInUse",
                json!({ "statusUrl": "http://outlet.local/load" }),
            ),
            "auth",
            json!({ "username": "admin", "password": "secret", "sendImmediately": false }),
        );
        let config = OutletConfig::from_json(&config).unwrap().config;

        let endpoints = [
            &config.on,
            &config.off,
            &config.status,
            &config.outlet_in_use.as_ref().unwrap().status,
        ];
        for endpoint in endpoints {
            let credentials = endpoint.credentials().unwrap();
            assert_eq!(credentials.username, "admin");
            assert!(!credentials.send_immediately);
        }
    }

    #[test]
    fn incomplete_auth_warns_and_disables() {
        let validated = OutletConfig::from_json(&with(minimal(), "auth", json!({ "username": "admin" }))).unwrap();
        assert!(validated.config.on.credentials().is_none());
        assert_eq!(validated.warnings, vec![ConfigWarning::IncompleteAuth]);
    }

    #[test]
    fn notification_identity() {
        let config = with(
            with(minimal(), "notificationID", json!("kitchen")),
            "notificationPassword",
            json!("pw"),
        );
        let notification = OutletConfig::from_json(&config).unwrap().config.notification.unwrap();
        assert_eq!(notification.id, "kitchen");
        assert_eq!(notification.password.as_deref(), Some("pw"));
        assert!(!format!("{notification:?}").contains("pw\""));
    }

    #[test]
    fn mqtt_is_parsed() {
        let config = with(
            minimal(),
            "mqtt",
            json!({
                "host": "mqtt://broker.local:1884",
                "username": "u",
                "password": "p",
                "keepalive": 60,
                "subscriptions": [
                    { "topic": "stat/plug/POWER", "characteristic": "On" },
                    {
                        "topic": "tele/plug/SENSOR",
                        "characteristic": "OutletInUse",
                        "messagePattern": "\"Power\":(\\d)",
                        "patternGroupToExtract": 1
                    }
                ]
            }),
        );
        let mqtt = OutletConfig::from_json(&config).unwrap().config.mqtt.unwrap();

        assert_eq!(mqtt.host, "broker.local");
        assert_eq!(mqtt.port, 1884);
        assert_eq!(mqtt.credentials, Some(("u".to_string(), "p".to_string())));
        assert_eq!(mqtt.keep_alive, Duration::from_secs(60));
        assert_eq!(mqtt.subscriptions.len(), 2);
        assert_eq!(
            mqtt.subscription("tele/plug/SENSOR").unwrap().extract(r#"{"Power":1}"#),
            Some(true)
        );
    }

    #[test]
    fn single_subscription_object_is_accepted() {
        let config = with(
            minimal(),
            "mqtt",
            json!({ "host": "broker", "subscriptions": { "topic": "t", "characteristic": "On" } }),
        );
        let mqtt = OutletConfig::from_json(&config).unwrap().config.mqtt.unwrap();
        assert_eq!(mqtt.port, MqttSettings::DEFAULT_PORT);
        assert_eq!(mqtt.subscriptions.len(), 1);
    }

    #[test]
    fn bad_mqtt_disables_channel_only() {
        let cases = [
            json!({ "subscriptions": [] }),
            json!({ "host": "broker" }),
            json!({ "host": "broker", "protocol": "ws", "subscriptions": { "topic": "t", "characteristic": "On" } }),
            json!({ "host": "broker", "subscriptions": [{ "topic": "t" }] }),
            json!({ "host": "broker", "subscriptions": [{ "topic": "t", "characteristic": "On", "messagePattern": "(" }] }),
            json!("broker"),
        ];
        for mqtt in cases {
            let validated = OutletConfig::from_json(&with(minimal(), "mqtt", mqtt)).unwrap();
            assert!(validated.config.mqtt.is_none());
            assert!(matches!(validated.warnings.as_slice(), [ConfigWarning::MqttDisabled(_)]));
        }
    }

    #[test]
    fn fatal_and_advisory_findings_together() {
        let config = json!({
            "onUrl": "http://outlet.local/on",
            "statusCache": "never",
            "outletInUse": {}
        });
        let err = OutletConfig::from_json(&config).unwrap_err();
        assert_eq!(err.findings().len(), 3);
    }

    #[test]
    fn debug_flag_is_ignored() {
        let validated = OutletConfig::from_json(&with(minimal(), "debug", json!(true))).unwrap();
        assert!(validated.warnings.is_empty());
    }
}
