// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! State change representation.

use crate::types::Property;

/// A single scalar update to an outlet property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StateChange {
    /// The outlet was switched on or off.
    Power(bool),
    /// The outlet started or stopped drawing load.
    OutletInUse(bool),
}

impl StateChange {
    /// Creates the change setting `property` to `value`.
    #[must_use]
    pub const fn new(property: Property, value: bool) -> Self {
        match property {
            Property::Power => Self::Power(value),
            Property::OutletInUse => Self::OutletInUse(value),
        }
    }

    /// Returns the property this change affects.
    #[must_use]
    pub const fn property(&self) -> Property {
        match self {
            Self::Power(_) => Property::Power,
            Self::OutletInUse(_) => Property::OutletInUse,
        }
    }

    /// Returns the new value.
    #[must_use]
    pub const fn value(&self) -> bool {
        match self {
            Self::Power(value) | Self::OutletInUse(value) => *value,
        }
    }
}
