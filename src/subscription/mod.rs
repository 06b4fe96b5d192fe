// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notifications from a session to the application.
//!
//! A [`DeviceSession`](crate::DeviceSession) reports classified updates
//! through the [`SessionOutput`] trait. The session only holds a weak
//! handle to its output: once the application drops the output,
//! notifications silently stop.
//!
//! Implement [`SessionOutput`] directly, or register closures on a
//! [`CallbackRegistry`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use devlink_lib::protocol::{MqttConfig, MqttTransport};
//! use devlink_lib::subscription::CallbackRegistry;
//! use devlink_lib::DeviceSession;
//!
//! # async fn example() {
//! let session = DeviceSession::new(MqttTransport::new(
//!     MqttConfig::builder().host("test.mosquitto.org").build(),
//! ));
//!
//! let callbacks = Arc::new(CallbackRegistry::new());
//! callbacks.on_telemetry(|function, payload| {
//!     println!("{function}: {payload}");
//! });
//! session.set_output(&callbacks);
//! # }
//! ```

mod callback;

pub use callback::{CallbackRegistry, SubscriptionId};

use crate::types::{ReceiveFunction, SendFunction};

/// Receiver of classified session updates.
///
/// Methods are called from the session's event task and should return
/// quickly.
pub trait SessionOutput: Send + Sync {
    /// A telemetry value arrived.
    fn on_telemetry_update(&self, function: ReceiveFunction, payload: &str);

    /// The device reported the current value of an actuator.
    fn on_status_update(&self, function: SendFunction, payload: &str);

    /// The broker granted a subscription.
    fn on_subscribed(&self, _topic: &str) {}
}
