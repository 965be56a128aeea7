// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP endpoints and the client issuing status reads and command writes.

use std::fmt;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};

use crate::error::{FetchError, ProtocolError, RequestError, SendError};
use crate::types::StatusPattern;

// ============================================================================
// Endpoint - one configured request target
// ============================================================================

/// Basic authentication credentials for an endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Send credentials with the first request. When `false`, credentials
    /// are only sent after the device answers `401 Unauthorized`.
    pub send_immediately: bool,
}

impl Credentials {
    /// Creates credentials that are sent with every request.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            send_immediately: true,
        }
    }

    /// Sets whether credentials are sent before being challenged.
    #[must_use]
    pub fn with_send_immediately(mut self, send_immediately: bool) -> Self {
        self.send_immediately = send_immediately;
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("send_immediately", &self.send_immediately)
            .finish()
    }
}

/// A request target: URL, method, optional credentials, headers and body.
///
/// Endpoints are immutable once the outlet is built.
///
/// # Examples
///
/// ```
/// use http_outlet::protocol::{Credentials, Endpoint};
/// use reqwest::Method;
///
/// let endpoint = Endpoint::parse("http://outlet.local/relay?state=1")
///     .unwrap()
///     .with_method(Method::POST)
///     .with_credentials(Credentials::new("admin", "secret"));
///
/// assert_eq!(endpoint.method(), &Method::POST);
/// assert_eq!(endpoint.url().host_str(), Some("outlet.local"));
/// ```
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: Url,
    method: Method,
    credentials: Option<Credentials>,
    headers: HeaderMap,
    body: Option<String>,
    timeout: Option<Duration>,
}

impl Endpoint {
    /// Creates a `GET` endpoint for `url`.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            credentials: None,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Parses `url` into a `GET` endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the URL does not parse.
    pub fn parse(url: &str) -> Result<Self, ProtocolError> {
        Url::parse(url)
            .map(Self::new)
            .map_err(|e| ProtocolError::InvalidAddress(format!("{url}: {e}")))
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets a request timeout overriding the client default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the credentials if set.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the request body if set.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Returns the endpoint timeout if set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

// ============================================================================
// HttpClient
// ============================================================================

/// A successful HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code in the 200-299 range.
    pub status: u16,
    /// Response body.
    pub body: String,
}

/// HTTP client issuing requests against outlet endpoints.
///
/// Owns the request-level timeout. Every call is a single attempt; there
/// are no retries.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a client with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, ProtocolError> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ProtocolError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProtocolError::Http)?;
        Ok(Self { client })
    }

    /// Sends one request to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::Transport` when no response arrives and
    /// `RequestError::HttpStatus` for status codes outside 200-299.
    pub async fn request(&self, endpoint: &Endpoint) -> Result<HttpResponse, RequestError> {
        let eager_auth = endpoint.credentials().is_some_and(|c| c.send_immediately);

        let mut response = self.execute(endpoint, eager_auth).await?;

        if !eager_auth
            && endpoint.credentials().is_some()
            && response.status() == StatusCode::UNAUTHORIZED
        {
            tracing::debug!(endpoint = %endpoint, "Authentication challenged, retrying with credentials");
            response = self.execute(endpoint, true).await?;
        }

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                tracing::debug!(endpoint = %endpoint, error = %e, "Failed to read error response body");
                String::new()
            });
            return Err(RequestError::HttpStatus {
                code: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        tracing::debug!(endpoint = %endpoint, status = status.as_u16(), body = %body, "Received HTTP response");

        Ok(HttpResponse {
            status: status.as_u16(),
            body,
        })
    }

    /// Reads a status endpoint and interprets the body with `pattern`.
    ///
    /// A status query never changes the device.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn fetch_status(
        &self,
        endpoint: &Endpoint,
        pattern: &StatusPattern,
    ) -> Result<bool, FetchError> {
        let response = self.request(endpoint).await?;
        Ok(pattern.test(&response.body))
    }

    /// Sends a command. Any success status is enough; the body is ignored.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request).
    pub async fn send_command(&self, endpoint: &Endpoint) -> Result<(), SendError> {
        self.request(endpoint).await.map(|_| ())
    }

    async fn execute(
        &self,
        endpoint: &Endpoint,
        with_auth: bool,
    ) -> Result<reqwest::Response, RequestError> {
        tracing::debug!(endpoint = %endpoint, "Sending HTTP request");

        let mut request = self
            .client
            .request(endpoint.method().clone(), endpoint.url().clone())
            .headers(endpoint.headers().clone());

        if with_auth && let Some(credentials) = endpoint.credentials() {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(body) = endpoint.body() {
            request = request.body(body.to_string());
        }
        if let Some(timeout) = endpoint.timeout() {
            request = request.timeout(timeout);
        }

        request
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))
    }
}
