// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Status response patterns.

use std::fmt;

use regex::Regex;

use crate::error::ConfigError;

/// A compiled rule deciding whether a status response body means "on".
///
/// The pattern is a regular expression searched anywhere in the body. The
/// default pattern matches the literal digit `1`.
///
/// # Examples
///
/// ```
/// use http_outlet::types::StatusPattern;
///
/// let pattern = StatusPattern::default();
/// assert!(pattern.test("1"));
/// assert!(!pattern.test("0"));
///
/// let pattern = StatusPattern::compile(Some(r#""POWER":"ON""#)).unwrap();
/// assert!(pattern.test(r#"{"POWER":"ON"}"#));
/// ```
#[derive(Clone)]
pub struct StatusPattern {
    regex: Regex,
}

impl StatusPattern {
    /// Source of the default pattern.
    pub const DEFAULT_SOURCE: &'static str = "1";

    /// Compiles a pattern from its source.
    ///
    /// `None` yields the default pattern.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPattern` when `source` is not a valid
    /// expression. Configuration parsing reports this as
    /// `ConfigWarning::InvalidPattern` and falls back to the default.
    pub fn compile(source: Option<&str>) -> Result<Self, ConfigError> {
        let source = source.unwrap_or(Self::DEFAULT_SOURCE);
        let regex = Regex::new(source).map_err(|e| ConfigError::InvalidPattern {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    /// Returns `true` if the pattern matches anywhere in `body`.
    #[must_use]
    pub fn test(&self, body: &str) -> bool {
        self.regex.is_match(body)
    }

    /// Returns the pattern source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for StatusPattern {
    fn default() -> Self {
        Self {
            regex: Regex::new(Self::DEFAULT_SOURCE).expect("default pattern compiles"),
        }
    }
}

impl fmt::Debug for StatusPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.regex.as_str())
    }
}

impl PartialEq for StatusPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
