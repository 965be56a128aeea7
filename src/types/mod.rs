// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the outlet engine.
//!
//! # Types
//!
//! - [`Property`] - The boolean properties an outlet can expose
//! - [`StatusPattern`] - Compiled rule interpreting a status response body

mod pattern;
mod property;

pub use pattern::StatusPattern;
pub use property::{Property, parse_switch_value};
