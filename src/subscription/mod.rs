// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription system for outlet state changes.
//!
//! Callbacks registered here are the sinks through which the externally
//! observed characteristics follow the outlet's [`DeviceState`]. They fire
//! whenever a value actually changes, whatever the source of the change
//! (on-demand read, write, pull timer, notification or message bus).
//!
//! ```no_run
//! use http_outlet::{Outlet, OutletConfig};
//! use http_outlet::subscription::Subscribable;
//!
//! # fn example() -> http_outlet::Result<()> {
//! let validated = OutletConfig::from_json_str(r#"{
//!     "onUrl": "http://outlet.local/on",
//!     "offUrl": "http://outlet.local/off",
//!     "statusUrl": "http://outlet.local/status"
//! }"#)?;
//! let outlet = Outlet::builder(validated.config).build()?;
//!
//! let sub_id = outlet.on_power_changed(|on| {
//!     println!("outlet is now {}", if on { "ON" } else { "OFF" });
//! });
//!
//! outlet.unsubscribe(sub_id);
//! # Ok(())
//! # }
//! ```
//!
//! [`DeviceState`]: crate::state::DeviceState

mod callback;
mod subscribable;

pub use callback::{CallbackRegistry, SubscriptionId};
pub use subscribable::Subscribable;
