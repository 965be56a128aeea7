// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP Outlet - state synchronization for HTTP-controlled outlets.
//!
//! An outlet is a binary device (on/off, optionally reporting whether it
//! draws load) driven through plain HTTP endpoints. Its state is kept in sync
//! from three independent sources:
//!
//! - **Reads**: on-demand status queries, gated by a time-boxed cache
//! - **Polling**: a pull timer that re-reads the power state periodically and
//!   is deferred whenever other activity is observed
//! - **Pushes**: notifications routed by ID and optional MQTT subscriptions
//!
//! # Quick Start
//!
//! ```no_run
//! use http_outlet::{Accessory, Outlet, OutletConfig};
//! use http_outlet::subscription::Subscribable;
//!
//! #[tokio::main]
//! async fn main() -> http_outlet::Result<()> {
//!     let validated = OutletConfig::from_json_str(r#"{
//!         "name": "Coffee Machine",
//!         "onUrl": "http://192.168.1.30/relay?turn=on",
//!         "offUrl": "http://192.168.1.30/relay?turn=off",
//!         "statusUrl": "http://192.168.1.30/relay",
//!         "statusPattern": "\"ison\":\\s*true",
//!         "statusCache": 2000,
//!         "pullInterval": 60000
//!     }"#)?;
//!
//!     let outlet = Outlet::builder(validated.config).build()?;
//!
//!     outlet.on_power_changed(|on| println!("power: {on}"));
//!
//!     outlet.write_power(true).await?;
//!     println!("is on: {}", outlet.read_power().await?);
//!     Ok(())
//! }
//! ```
//!
//! # Push Notifications
//!
//! ```no_run
//! use std::sync::Arc;
//! use http_outlet::{NotificationRouter, Outlet, OutletConfig};
//!
//! # fn example() -> http_outlet::Result<()> {
//! let router = Arc::new(NotificationRouter::new());
//! let validated = OutletConfig::from_json_str(r#"{
//!     "onUrl": "http://outlet.local/on",
//!     "offUrl": "http://outlet.local/off",
//!     "statusUrl": "http://outlet.local/status",
//!     "notificationID": "garage-outlet",
//!     "notificationPassword": "s3cret"
//! }"#)?;
//! let outlet = Outlet::builder(validated.config)
//!     .with_notification_router(router.clone())
//!     .build()?;
//!
//! // Typically called from an HTTP server handler
//! let outcome = router.route_json(
//!     "garage-outlet",
//!     Some("s3cret"),
//!     r#"{"characteristic": "On", "value": true}"#,
//! );
//! assert!(outcome.is_delivered());
//! assert_eq!(outlet.state().power(), Some(true));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod notification;
mod outlet;
pub mod protocol;
pub mod state;
pub mod subscription;
pub mod timer;
pub mod types;

pub use config::{OutletConfig, Validated};
pub use error::{
    ConfigError, ConfigWarning, Error, FetchError, ProtocolError, ReconcileError, RequestError,
    Result, SendError,
};
pub use notification::{Notification, NotificationRouter, PushHandler, RouteOutcome};
pub use outlet::{Accessory, AccessoryInformation, Outlet, OutletBuilder};
pub use state::{DeviceState, StateChange};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use types::{Property, StatusPattern};
