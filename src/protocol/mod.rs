// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Protocol plumbing between an outlet and the outside world.
//!
//! - [`HttpClient`]: status reads and command writes against [`Endpoint`]s
//! - [`MqttSubscriber`]: message bus subscription delivering push updates
//!   (requires the `mqtt` feature)

mod http;
mod mqtt;

pub use http::{Credentials, Endpoint, HttpClient, HttpResponse};
#[cfg(feature = "mqtt")]
pub use mqtt::MqttSubscriber;
pub use mqtt::{MqttSettings, MqttSubscription};

pub(crate) use mqtt::parse_broker_address;
