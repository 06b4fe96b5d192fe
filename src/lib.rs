// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `DevLink` Lib - Control a single IoT device over MQTT.
//!
//! This library keeps one broker connection to a device, confirms the device
//! is reachable with a ping/pong handshake, then routes its telemetry and
//! status messages to typed application callbacks and sends commands to the
//! right topics.
//!
//! # Features
//!
//! - **Reconnect-aware requests**: subscribes and publishes issued while the
//!   broker is unreachable are queued and replayed in order on connect
//! - **Liveness handshake**: periodic `ping` until the device answers `pong`,
//!   followed by a `ready` signal
//! - **Topic routing**: literal topics from configuration mapped to
//!   [`ReceiveFunction`] and [`SendFunction`] values
//! - **Status polling**: current actuator values requested as soon as their
//!   status topics are active
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use devlink_lib::protocol::{MqttConfig, MqttTransport};
//! use devlink_lib::{CallbackRegistry, DeviceSession, LedState, TopicConfig};
//!
//! #[tokio::main]
//! async fn main() -> devlink_lib::Result<()> {
//!     let config = MqttConfig::builder().broker("mqtt://192.168.1.50:1883")?.build();
//!     let session = DeviceSession::new(MqttTransport::new(config));
//!
//!     let callbacks = Arc::new(CallbackRegistry::new());
//!     callbacks.on_telemetry(|function, value| println!("{function}: {value}"));
//!     callbacks.on_status(|function, value| println!("{function} is {value}"));
//!     session.set_output(&callbacks);
//!
//!     let topics = TopicConfig::from_json(
//!         r#"{
//!             "functions": {"temperature": "device_97F4A9/temp", "led": "device_97F4A9/led"},
//!             "status": {"led": "device_97F4A9/led/status"},
//!             "connection": {"ping": "device_97F4A9/ping", "pong": "device_97F4A9/pong"}
//!         }"#,
//!     )?;
//!     session.start(&topics);
//!
//!     session.send_led(LedState::On)?;
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `mqtt` (default): the [`rumqttc`](https://docs.rs/rumqttc) transport.
//!   Without it, supply your own [`protocol::Transport`].

pub mod config;
pub mod error;
pub mod liveness;
pub mod protocol;
mod session;
pub mod subscription;
pub mod types;

pub use config::{SessionConfig, TopicConfig};
pub use error::{Error, LookupError, ParseError, ProtocolError, Result, ValueError};
pub use liveness::{LivenessCoordinator, LivenessPhase};
pub use protocol::{Transport, TransportEvent, TransportSession};
pub use session::{DeviceSession, LastMessage, STATUS_POLL_PAYLOAD};
pub use subscription::{CallbackRegistry, SessionOutput, SubscriptionId};
pub use types::{
    Brightness, ConnectionState, ConnectionTopicKind, LedState, QoS, ReceiveFunction,
    SendFunction, TopicRole,
};
