// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for device control.
//!
//! # Types
//!
//! - [`ReceiveFunction`] - Telemetry values pushed by the device
//! - [`SendFunction`] - Actuators the application can drive
//! - [`ConnectionTopicKind`] - Ping/pong liveness topics
//! - [`TopicRole`] - The role a literal topic plays for the router
//! - [`ConnectionState`] - Broker connection lifecycle
//! - [`QoS`] - MQTT delivery guarantee
//! - [`LedState`] / [`Brightness`] - Typed actuator payloads

mod connection;
mod function;
mod payload;
mod qos;

pub use connection::{ConnectionState, ConnectionTopicKind};
pub use function::{ReceiveFunction, SendFunction, TopicRole};
pub use payload::{Brightness, LedState};
pub use qos::QoS;
