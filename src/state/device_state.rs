// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state tracking.

use crate::types::Property;

use super::StateChange;

/// Tracked state of an outlet.
///
/// Both values start unknown and acquire a value on the first successful
/// read, write or push update. `outlet_in_use` stays `None` forever when the
/// outlet is not configured with that property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeviceState {
    power: Option<bool>,
    outlet_in_use: Option<bool>,
}

impl DeviceState {
    /// Creates a new state with every value unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the outlet is on, if known.
    #[must_use]
    pub fn power(&self) -> Option<bool> {
        self.power
    }

    /// Returns whether the outlet is in use, if known.
    #[must_use]
    pub fn outlet_in_use(&self) -> Option<bool> {
        self.outlet_in_use
    }

    /// Returns the value of `property`, if known.
    #[must_use]
    pub fn get(&self, property: Property) -> Option<bool> {
        match property {
            Property::Power => self.power,
            Property::OutletInUse => self.outlet_in_use,
        }
    }

    /// Applies a state change.
    ///
    /// Returns `true` if the stored value actually changed.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        let slot = match change {
            StateChange::Power(_) => &mut self.power,
            StateChange::OutletInUse(_) => &mut self.outlet_in_use,
        };

        let value = Some(change.value());
        if *slot == value {
            false
        } else {
            *slot = value;
            true
        }
    }
}
