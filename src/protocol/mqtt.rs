// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `rumqttc` implementation of the [`Transport`] trait.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectReturnCode, EventLoop, MqttOptions, SubscribeReasonCode};

use crate::error::ProtocolError;
use crate::protocol::{EventSink, SubscribeOutcome, Transport, TransportEvent};
use crate::types::QoS;

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Connection settings for an MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    host: String,
    port: u16,
    client_id: Option<String>,
    keep_alive: Duration,
    request_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            client_id: None,
            keep_alive: Duration::from_secs(30),
            request_capacity: 64,
        }
    }
}

impl MqttConfig {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> MqttConfigBuilder {
        MqttConfigBuilder::default()
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Builder for [`MqttConfig`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use devlink_lib::protocol::MqttConfig;
///
/// let config = MqttConfig::builder()
///     .broker("mqtt://test.mosquitto.org:1883")
///     .unwrap()
///     .keep_alive(Duration::from_secs(60))
///     .build();
///
/// assert_eq!(config.host(), "test.mosquitto.org");
/// assert_eq!(config.port(), 1883);
/// ```
#[derive(Debug, Default)]
pub struct MqttConfigBuilder {
    config: MqttConfig,
}

impl MqttConfigBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets host and port from a URL such as `mqtt://host:1883`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the port is not a number.
    pub fn broker(mut self, url: &str) -> Result<Self, ProtocolError> {
        let (host, port) = parse_mqtt_url(url)?;
        self.config.host = host;
        self.config.port = port;
        Ok(self)
    }

    /// Sets a fixed client ID (default: generated per connection).
    #[must_use]
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.config.client_id = Some(id.into());
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets how many requests may wait for the event loop (default: 64).
    #[must_use]
    pub fn request_capacity(mut self, capacity: usize) -> Self {
        self.config.request_capacity = capacity;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn build(self) -> MqttConfig {
        self.config
    }
}

/// Topics of requests the broker has not acknowledged yet.
///
/// `rumqttc` reports acknowledgments by packet id only, so topics are
/// queued in request order and bound to their id when the packet goes out.
#[derive(Debug, Default)]
struct PacketTopics {
    unsent_subscribes: VecDeque<String>,
    unsent_unsubscribes: VecDeque<String>,
    subscribes: HashMap<u16, String>,
    unsubscribes: HashMap<u16, String>,
}

#[derive(Debug)]
struct Connection {
    client: AsyncClient,
    packets: Arc<Mutex<PacketTopics>>,
}

/// MQTT transport backed by `rumqttc`.
///
/// Each [`connect`](Transport::connect) builds a fresh client and spawns a
/// task polling its event loop. The task ends on the first connection error;
/// reconnecting is left to the caller.
///
/// # Examples
///
/// ```no_run
/// use devlink_lib::protocol::{MqttConfig, MqttTransport};
/// use devlink_lib::{DeviceSession, TopicConfig};
///
/// # async fn example() {
/// let transport = MqttTransport::new(MqttConfig::builder().host("test.mosquitto.org").build());
/// let session = DeviceSession::new(transport);
///
/// session.start(
///     &TopicConfig::new()
///         .with_function("temperature", "device_97F4A9/temp")
///         .with_connection("ping", "device_97F4A9/ping")
///         .with_connection("pong", "device_97F4A9/pong"),
/// );
/// # }
/// ```
#[derive(Debug)]
pub struct MqttTransport {
    config: MqttConfig,
    connection: Mutex<Option<Connection>>,
}

impl MqttTransport {
    /// Creates a transport; nothing connects until `connect` is called.
    #[must_use]
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    /// Returns the broker configuration.
    #[must_use]
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, ProtocolError>,
    ) -> Result<T, ProtocolError> {
        let connection = self.connection.lock();
        let connection = connection.as_ref().ok_or(ProtocolError::NotStarted)?;
        f(connection)
    }
}

impl Transport for MqttTransport {
    fn connect(&self, events: EventSink) -> Result<(), ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ProtocolError::ConnectionRefused(e.to_string()))?;

        let client_id = self.config.client_id.clone().unwrap_or_else(|| {
            let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
            format!("devlink_{}_{}", std::process::id(), counter)
        });

        let mut mqtt_options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(mqtt_options, self.config.request_capacity);
        let packets = Arc::new(Mutex::new(PacketTopics::default()));

        tracing::info!(
            host = %self.config.host,
            port = %self.config.port,
            client_id = %client_id,
            "Connecting to MQTT broker"
        );

        runtime.spawn(handle_mqtt_events(event_loop, events, Arc::clone(&packets)));
        *self.connection.lock() = Some(Connection { client, packets });
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), ProtocolError> {
        self.with_connection(|connection| {
            // Hold the table lock so request order matches queue order.
            let mut packets = connection.packets.lock();
            connection.client.try_subscribe(topic, qos.into())?;
            packets.unsent_subscribes.push_back(topic.to_string());
            Ok(())
        })
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.with_connection(|connection| {
            let mut packets = connection.packets.lock();
            connection.client.try_unsubscribe(topic)?;
            packets.unsent_unsubscribes.push_back(topic.to_string());
            Ok(())
        })
    }

    fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<(), ProtocolError> {
        tracing::debug!(topic = %topic, payload = %payload, "Publishing MQTT message");
        self.with_connection(|connection| {
            connection
                .client
                .try_publish(topic, qos.into(), false, payload)
                .map_err(ProtocolError::Mqtt)
        })
    }

    fn disconnect(&self) -> Result<(), ProtocolError> {
        self.with_connection(|connection| {
            connection
                .client
                .try_disconnect()
                .map_err(ProtocolError::Mqtt)
        })
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), 1883)
    };

    Ok((host, port))
}

/// Polls the event loop and translates packets into [`TransportEvent`]s.
async fn handle_mqtt_events(
    mut event_loop: EventLoop,
    events: EventSink,
    packets: Arc<Mutex<PacketTopics>>,
) {
    use rumqttc::{Event, Outgoing, Packet};

    loop {
        let event = match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                if connack.code == ConnectReturnCode::Success {
                    tracing::debug!(?connack, "MQTT connected");
                    TransportEvent::ConnAck
                } else {
                    tracing::error!(code = ?connack.code, "MQTT connection refused");
                    let _ = events.send(TransportEvent::Disconnected {
                        error: Some(format!("connection refused: {:?}", connack.code)),
                    });
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => TransportEvent::Message {
                topic: publish.topic.clone(),
                payload: String::from_utf8_lossy(&publish.payload).into_owned(),
            },
            Ok(Event::Incoming(Packet::PubAck(ack))) => TransportEvent::PubAck { pkid: ack.pkid },
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
                let Some(topic) = packets.lock().subscribes.remove(&suback.pkid) else {
                    tracing::trace!(pkid = suback.pkid, "SubAck for unknown packet");
                    continue;
                };
                let granted = suback
                    .return_codes
                    .iter()
                    .all(|code| matches!(code, SubscribeReasonCode::Success(_)));
                TransportEvent::SubAck(vec![SubscribeOutcome { topic, granted }])
            }
            Ok(Event::Incoming(Packet::UnsubAck(unsuback))) => {
                let Some(topic) = packets.lock().unsubscribes.remove(&unsuback.pkid) else {
                    continue;
                };
                TransportEvent::UnsubAck {
                    topics: vec![topic],
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                let _ = events.send(TransportEvent::Disconnected {
                    error: Some("broker closed the connection".to_string()),
                });
                break;
            }
            Ok(Event::Outgoing(Outgoing::Subscribe(pkid))) => {
                let mut packets = packets.lock();
                if let Some(topic) = packets.unsent_subscribes.pop_front() {
                    packets.subscribes.insert(pkid, topic);
                }
                continue;
            }
            Ok(Event::Outgoing(Outgoing::Unsubscribe(pkid))) => {
                let mut packets = packets.lock();
                if let Some(topic) = packets.unsent_unsubscribes.pop_front() {
                    packets.unsubscribes.insert(pkid, topic);
                }
                continue;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect requested");
                let _ = events.send(TransportEvent::Disconnected { error: None });
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(error = %e, "MQTT event loop error");
                let _ = events.send(TransportEvent::Disconnected {
                    error: Some(e.to_string()),
                });
                break;
            }
        };

        if events.send(event).is_err() {
            tracing::debug!("Event receiver dropped, stopping MQTT event loop");
            break;
        }
    }
}
