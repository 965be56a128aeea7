// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outlet state management types.
//!
//! [`DeviceState`] is the single authoritative copy of the outlet's boolean
//! properties. Every source of truth (on-demand reads, the pull timer, push
//! notifications and the message bus) updates it by applying a
//! [`StateChange`]. The last applied change wins.
//!
//! # Examples
//!
//! ```
//! use http_outlet::state::{DeviceState, StateChange};
//!
//! let mut state = DeviceState::new();
//! assert_eq!(state.power(), None);
//!
//! state.apply(&StateChange::Power(true));
//! assert_eq!(state.power(), Some(true));
//! ```

mod device_state;
mod state_change;

pub use device_state::DeviceState;
pub use state_change::StateChange;
