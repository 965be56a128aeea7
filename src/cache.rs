// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-boxed status cache.
//!
//! Each cacheable property owns a [`StatusCache`] deciding whether a read
//! must go to the network or may be answered from the stored state.

use std::time::Duration;

use tokio::time::Instant;

/// How long a successfully fetched value stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheTtl {
    /// Every read fetches.
    #[default]
    Never,
    /// Reads within this duration of the last fetch are served from state.
    For(Duration),
    /// After the first successful fetch, reads never fetch again.
    Infinite,
}

impl CacheTtl {
    /// Converts a configured number of milliseconds.
    ///
    /// Zero disables caching. Positive values are a duration. Any other
    /// value, including one too large to represent, means "infinite".
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn from_millis(millis: f64) -> Self {
        if millis == 0.0 {
            return Self::Never;
        }
        if millis > 0.0
            && let Ok(ttl) = Duration::try_from_secs_f64(millis / 1000.0)
        {
            return Self::For(ttl);
        }
        Self::Infinite
    }
}

/// Cache gate for one property.
///
/// `last_queried` starts unset and is only ever set by a successful fetch.
/// Push updates and failed fetches leave it untouched, so the next read
/// after a failure retries immediately.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use http_outlet::cache::{CacheTtl, StatusCache};
/// use tokio::time::Instant;
///
/// let mut cache = StatusCache::new(CacheTtl::For(Duration::from_secs(5)));
/// let now = Instant::now();
/// assert!(cache.should_query(now));
///
/// cache.mark_queried(now);
/// assert!(!cache.should_query(now + Duration::from_secs(1)));
/// assert!(cache.should_query(now + Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone)]
pub struct StatusCache {
    ttl: CacheTtl,
    last_queried: Option<Instant>,
}

impl StatusCache {
    /// Creates a cache that has never been queried.
    #[must_use]
    pub fn new(ttl: CacheTtl) -> Self {
        Self {
            ttl,
            last_queried: None,
        }
    }

    /// Returns the configured time to live.
    #[must_use]
    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    /// Returns when the last successful fetch happened.
    #[must_use]
    pub fn last_queried(&self) -> Option<Instant> {
        self.last_queried
    }

    /// Returns `true` if a read at `now` must fetch from the device.
    #[must_use]
    pub fn should_query(&self, now: Instant) -> bool {
        let Some(last) = self.last_queried else {
            return true;
        };

        match self.ttl {
            CacheTtl::Never => true,
            CacheTtl::Infinite => false,
            CacheTtl::For(ttl) => now.saturating_duration_since(last) >= ttl,
        }
    }

    /// Records a successful fetch at `now`.
    pub fn mark_queried(&mut self, now: Instant) {
        self.last_queried = Some(now);
    }

    /// Returns `true` if cached values never expire.
    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.ttl == CacheTtl::Infinite
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new(CacheTtl::Never)
    }
}
