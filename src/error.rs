// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the outlet library.
//!
//! Errors fall into four groups:
//!
//! - [`ConfigError`]: fatal problems found while validating the configuration.
//!   An outlet is never constructed when one of these occurs.
//! - [`ConfigWarning`]: advisory findings resolved by falling back to a default.
//! - [`RequestError`]: a single status read or command write failed. Reported
//!   to the caller of that operation only.
//! - [`ReconcileError`]: a push update could not be applied. Logged and
//!   dropped, never surfaced to the push source.

use std::fmt;

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration could not be validated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A status read or command write failed.
    #[error("request error: {0}")]
    Request(#[from] RequestError),

    /// A push update could not be applied.
    #[error("reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// A protocol client could not be created or connected.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The outlet was not configured with the requested property.
    #[error("outlet does not support this capability")]
    CapabilityNotSupported,
}

/// Fatal configuration errors.
///
/// Any of these aborts construction of the outlet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required property is missing.
    #[error("property '{0}' is required")]
    MissingProperty(String),

    /// A property was given with the wrong type.
    #[error("property '{property}' must be {expected}")]
    InvalidType {
        /// The offending property.
        property: String,
        /// Description of the expected type.
        expected: &'static str,
    },

    /// A URL could not be parsed.
    #[error("invalid url in '{property}': {message}")]
    InvalidUrl {
        /// The offending property.
        property: String,
        /// Parser message.
        message: String,
    },

    /// An HTTP method is not a valid token.
    #[error("invalid http method '{method}' in '{property}'")]
    InvalidMethod {
        /// The offending property.
        property: String,
        /// The method as configured.
        method: String,
    },

    /// A status pattern is not a valid regular expression.
    #[error("invalid status pattern '{pattern}': {message}")]
    InvalidPattern {
        /// The pattern source.
        pattern: String,
        /// Compiler message.
        message: String,
    },

    /// The configuration text is not valid JSON.
    #[error("configuration is not valid JSON: {0}")]
    Json(String),

    /// Several fatal findings collected during validation.
    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ConfigError>),
}

impl ConfigError {
    /// Returns every individual finding contained in this error.
    #[must_use]
    pub fn findings(&self) -> Vec<&ConfigError> {
        match self {
            Self::Invalid(errors) => errors.iter().flat_map(ConfigError::findings).collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Advisory configuration findings.
///
/// Each warning has already been resolved by falling back to a default when
/// it is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A cache duration was not a number. Caching is disabled for it.
    UnsupportedCacheType {
        /// The offending property.
        property: &'static str,
    },
    /// A status pattern was not a string or failed to compile. The default
    /// pattern is used instead.
    InvalidPattern {
        /// The offending property.
        property: &'static str,
        /// Why the pattern was rejected.
        message: String,
    },
    /// `auth` was given without both username and password.
    IncompleteAuth,
    /// `pullInterval` was not a positive number. Polling is disabled.
    InvalidPullInterval,
    /// The `mqtt` block could not be parsed. The message bus is disabled.
    MqttDisabled(String),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedCacheType { property } => write!(
                f,
                "property '{property}' was given in an unsupported type, using default"
            ),
            Self::InvalidPattern { property, message } => write!(
                f,
                "property '{property}' is not a valid pattern ({message}), using default"
            ),
            Self::IncompleteAuth => {
                write!(f, "'auth.username' and/or 'auth.password' was not set")
            }
            Self::InvalidPullInterval => {
                write!(f, "property 'pullInterval' must be a positive number, polling disabled")
            }
            Self::MqttDisabled(message) => write!(f, "mqtt will not be enabled: {message}"),
        }
    }
}

/// Failure of a single HTTP request against one of the outlet endpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// The request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The device answered with a status code outside 200-299.
    #[error("http status {code}: {body}")]
    HttpStatus {
        /// Status code returned by the device.
        code: u16,
        /// Response body.
        body: String,
    },
}

impl RequestError {
    /// Returns the HTTP status code if the device answered at all.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { code, .. } => Some(*code),
            Self::Transport(_) => None,
        }
    }
}

/// Failure of a status read.
pub type FetchError = RequestError;

/// Failure of a command write.
pub type SendError = RequestError;

/// Errors applying a push update.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The key does not name a property this outlet exposes.
    #[error("unknown property: {0}")]
    UnknownProperty(String),

    /// The pushed value cannot be interpreted as a boolean.
    #[error("value '{value}' for {property} is not a boolean")]
    InvalidValue {
        /// Property key as received.
        property: String,
        /// The raw value.
        value: String,
    },
}

/// Errors related to protocol clients.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Background tasks need a Tokio runtime and none is running.
    #[error("no Tokio runtime is running")]
    NoRuntime,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
