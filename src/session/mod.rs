// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application-facing device session.
//!
//! [`DeviceSession`] ties the broker link, the topic router and the liveness
//! handshake together into one lifecycle:
//!
//! 1. [`start`](DeviceSession::start) connects, loads the topic tables and
//!    begins pinging the device.
//! 2. When the device answers with `pong`, pinging stops, `ready` is sent and
//!    the telemetry and status topics are subscribed.
//! 3. Each granted status subscription triggers a `get` on the matching
//!    command topic so the current actuator value is reported.
//! 4. Inbound messages are classified and handed to the [`SessionOutput`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use devlink_lib::protocol::{MqttConfig, MqttTransport};
//! use devlink_lib::subscription::CallbackRegistry;
//! use devlink_lib::{DeviceSession, LedState, TopicConfig};
//!
//! #[tokio::main]
//! async fn main() -> devlink_lib::Result<()> {
//!     let transport = MqttTransport::new(MqttConfig::builder().host("192.168.1.50").build());
//!     let session = DeviceSession::new(transport);
//!
//!     let callbacks = Arc::new(CallbackRegistry::new());
//!     callbacks.on_telemetry(|function, value| println!("{function} = {value}"));
//!     session.set_output(&callbacks);
//!
//!     session.start(
//!         &TopicConfig::new()
//!             .with_function("temperature", "device_97F4A9/temp")
//!             .with_function("led", "device_97F4A9/led")
//!             .with_status("led", "device_97F4A9/led/status")
//!             .with_connection("ping", "device_97F4A9/ping")
//!             .with_connection("pong", "device_97F4A9/pong"),
//!     );
//!
//!     session.send_led(LedState::On)?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::{SessionConfig, TopicConfig};
use crate::error::Result;
use crate::liveness::{LivenessCoordinator, LivenessPhase};
use crate::protocol::{Inbound, Route, TopicRouter, Transport, TransportEvent, TransportSession};
use crate::subscription::SessionOutput;
use crate::types::{Brightness, ConnectionState, ConnectionTopicKind, LedState, SendFunction};

/// Payload published on a command topic to request its current status.
pub const STATUS_POLL_PAYLOAD: &str = "get";

/// Most recent message seen on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    /// Message payload.
    pub payload: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

/// Controller for a single device behind a publish/subscribe broker.
///
/// Cheap to share by reference; all methods take `&self`. Dropping the
/// session stops its background tasks.
pub struct DeviceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    link: Arc<TransportSession>,
    router: TopicRouter,
    liveness: LivenessCoordinator,
    output: RwLock<Option<Weak<dyn SessionOutput>>>,
    last_values: RwLock<HashMap<String, LastMessage>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceSession {
    /// Creates a session with default settings.
    #[must_use]
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    /// Creates a session with custom settings.
    #[must_use]
    pub fn with_config(transport: impl Transport + 'static, config: SessionConfig) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(transport);
        let (link, events_rx) = TransportSession::new(transport);
        let link = Arc::new(link);
        let liveness = LivenessCoordinator::new(Arc::clone(&link), config.ping_interval);

        Self {
            inner: Arc::new(SessionInner {
                link,
                router: TopicRouter::new(),
                liveness,
                output: RwLock::new(None),
                last_values: RwLock::new(HashMap::new()),
                events_rx: Mutex::new(Some(events_rx)),
                event_task: Mutex::new(None),
            }),
        }
    }

    /// Sets the receiver of telemetry and status updates.
    ///
    /// Only a weak handle is kept: once every `Arc` to `output` is dropped,
    /// updates are discarded.
    pub fn set_output<O: SessionOutput + 'static>(&self, output: &Arc<O>) {
        let weak = Arc::downgrade(output);
        let weak: Weak<dyn SessionOutput> = weak;
        *self.inner.output.write() = Some(weak);
    }

    /// Connects, loads `topics` into the router and starts the liveness
    /// handshake.
    ///
    /// Without both a `ping` and a `pong` connection topic no handshake can
    /// run; a warning is logged and the telemetry and status subscriptions
    /// stay inactive until [`activate_subscriptions`](Self::activate_subscriptions)
    /// is called. Calling `start` again after a disconnect reconnects and
    /// reloads the topics.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self, topics: &TopicConfig) {
        self.spawn_event_task();

        let inner = &self.inner;
        inner.link.start();
        inner
            .router
            .configure(&topics.functions, &topics.status, &topics.connection);

        let ping = inner.router.connection_topic(ConnectionTopicKind::Ping);
        let pong = inner.router.connection_topic(ConnectionTopicKind::Pong);
        match (ping, pong) {
            (Some(ping), Some(pong)) => inner.liveness.start_ping(&ping, &pong),
            (ping, pong) => tracing::warn!(
                has_ping = ping.is_some(),
                has_pong = pong.is_some(),
                "Liveness topics not configured, subscriptions stay inactive"
            ),
        }
    }

    /// Publishes `payload` on the command topic of `function`.
    ///
    /// Queued while the broker connection is down.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::UnconfiguredFunction` if no command topic was
    /// configured for `function`.
    pub fn send_message(&self, function: SendFunction, payload: impl Into<String>) -> Result<()> {
        let payload = payload.into();
        let topic = self
            .inner
            .router
            .resolve_send_topic(function)
            .inspect_err(|e| {
                tracing::error!(function = %function, payload = %payload, error = %e, "Send rejected");
            })?;

        tracing::debug!(function = %function, topic = %topic, payload = %payload, "Sending command");
        self.inner.link.publish(&topic, &payload);
        Ok(())
    }

    /// Switches the LED.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::UnconfiguredFunction` if the LED has no command
    /// topic.
    pub fn send_led(&self, state: LedState) -> Result<()> {
        self.send_message(SendFunction::Led, state.to_string())
    }

    /// Sets the LED brightness.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::UnconfiguredFunction` if brightness has no
    /// command topic.
    pub fn send_brightness(&self, brightness: Brightness) -> Result<()> {
        self.send_message(SendFunction::Brightness, brightness.to_string())
    }

    /// Subscribes to every telemetry topic, then every status topic.
    ///
    /// Runs automatically once the device answers a ping.
    pub fn activate_subscriptions(&self) {
        self.inner.activate_subscriptions();
    }

    /// Stops pinging and disconnects from the broker.
    ///
    /// No `ready` signal is sent.
    pub fn shutdown(&self) {
        self.inner.liveness.cancel();
        self.inner.link.disconnect();
    }

    /// Returns the broker connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.link.state()
    }

    /// Returns a receiver that observes connection state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.link.state_changes()
    }

    /// Returns the liveness handshake phase.
    #[must_use]
    pub fn liveness_phase(&self) -> LivenessPhase {
        self.inner.liveness.phase()
    }

    /// Returns the last message received on `topic`.
    #[must_use]
    pub fn last_message(&self, topic: &str) -> Option<LastMessage> {
        self.inner.last_values.read().get(topic).cloned()
    }

    /// Returns the topic router.
    #[must_use]
    pub fn router(&self) -> &TopicRouter {
        &self.inner.router
    }

    fn spawn_event_task(&self) {
        let Some(mut events) = self.inner.events_rx.lock().take() else {
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.handle_event(event);
            }
            tracing::debug!("Session event loop ended");
        });
        *self.inner.event_task.lock() = Some(handle);
    }
}

impl SessionInner {
    fn handle_event(&self, event: TransportEvent) {
        match self.link.handle_event(event) {
            Some(Inbound::Message { topic, payload }) => self.on_message(topic, payload),
            Some(Inbound::Subscribed(topics)) => {
                for topic in &topics {
                    self.on_subscribed(topic);
                }
            }
            None => {}
        }
    }

    fn on_message(&self, topic: String, payload: String) {
        match self.router.dispatch(&topic, &payload) {
            Route::Telemetry(function) => {
                if let Some(output) = self.output() {
                    output.on_telemetry_update(function, &payload);
                }
                self.remember(topic, payload);
            }
            Route::Status(function) => {
                if let Some(output) = self.output() {
                    output.on_status_update(function, &payload);
                }
                self.remember(topic, payload);
            }
            Route::Pong => {
                if self.liveness.on_pong() {
                    self.liveness.stop_ping();
                    self.activate_subscriptions();
                }
            }
            Route::Ignored => {}
        }
    }

    /// Caches a routed telemetry or status message.
    fn remember(&self, topic: String, payload: String) {
        self.last_values.write().insert(
            topic,
            LastMessage {
                payload,
                received_at: Utc::now(),
            },
        );
    }

    fn on_subscribed(&self, topic: &str) {
        if let Some(output) = self.output() {
            output.on_subscribed(topic);
        }

        if let Some((function, send_topic)) = self.router.poll_topic_for_status(topic) {
            tracing::debug!(function = %function, topic = %send_topic, "Requesting current status");
            self.link.publish(&send_topic, STATUS_POLL_PAYLOAD);
        }
    }

    fn activate_subscriptions(&self) {
        let telemetry = self.router.telemetry_topics();
        let status = self.router.status_topics();
        tracing::info!(
            telemetry = telemetry.len(),
            status = status.len(),
            "Activating device subscriptions"
        );

        for topic in telemetry.iter().chain(&status) {
            self.link.subscribe(topic);
        }
    }

    fn output(&self) -> Option<Arc<dyn SessionOutput>> {
        let output = self.output.read().as_ref().and_then(Weak::upgrade);
        if output.is_none() {
            tracing::trace!("No session output, update dropped");
        }
        output
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("link", &self.inner.link)
            .field("liveness", &self.inner.liveness.phase())
            .field("router", &self.inner.router)
            .finish_non_exhaustive()
    }
}
