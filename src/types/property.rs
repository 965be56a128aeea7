// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outlet properties and boolean value parsing.

use std::fmt;
use std::str::FromStr;

use crate::error::ReconcileError;

/// A boolean property exposed by an outlet.
///
/// Property keys arriving from push sources use the HomeKit characteristic
/// names (`On`, `OutletInUse`). Shorter aliases are accepted as well, and
/// matching is case-insensitive.
///
/// # Examples
///
/// ```
/// use http_outlet::types::Property;
///
/// assert_eq!("On".parse::<Property>().unwrap(), Property::Power);
/// assert_eq!("power".parse::<Property>().unwrap(), Property::Power);
/// assert_eq!("OutletInUse".parse::<Property>().unwrap(), Property::OutletInUse);
/// assert!("Brightness".parse::<Property>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Whether the outlet is switched on.
    Power,
    /// Whether the outlet is actively drawing load.
    OutletInUse,
}

impl Property {
    /// Returns the characteristic name of this property.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Power => "On",
            Self::OutletInUse => "OutletInUse",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Property {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "power" => Ok(Self::Power),
            "outletinuse" | "outlet_in_use" | "outlet-in-use" => Ok(Self::OutletInUse),
            _ => Err(ReconcileError::UnknownProperty(s.to_string())),
        }
    }
}

/// Interprets a textual switch value as a boolean.
///
/// Accepts `true`/`false`, `on`/`off` and `1`/`0` in any case, ignoring
/// surrounding whitespace. Returns `None` for anything else.
#[must_use]
pub fn parse_switch_value(s: &str) -> Option<bool> {
    match s.trim().to_ascii_uppercase().as_str() {
        "ON" | "1" | "TRUE" => Some(true),
        "OFF" | "0" | "FALSE" => Some(false),
        _ => None,
    }
}
