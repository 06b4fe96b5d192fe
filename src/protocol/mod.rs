// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker connection plumbing.
//!
//! The [`Transport`] trait is the seam to the underlying messaging library.
//! Everything above it deals in plain topics and text payloads:
//!
//! - [`TransportSession`]: connection state plus reconnect-aware queuing
//! - [`CommandQueue`]: requests issued while not connected
//! - [`TopicRouter`]: topic ↔ semantic function tables
//! - [`MqttTransport`]: `rumqttc` implementation of [`Transport`]

mod command_queue;
#[cfg(feature = "mqtt")]
mod mqtt;
#[cfg(test)]
pub(crate) mod recording;
mod topic_router;
mod transport_session;

pub use command_queue::{CommandQueue, DrainReport, PendingCommand};
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttConfigBuilder, MqttTransport};
pub use topic_router::{PONG_PAYLOAD, Route, TopicRouter};
pub use transport_session::{Inbound, TransportSession};

use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::types::QoS;

/// Channel on which a transport reports asynchronous events.
pub type EventSink = mpsc::UnboundedSender<TransportEvent>;

/// Per-topic result of a subscribe acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOutcome {
    /// The topic that was subscribed.
    pub topic: String,
    /// Whether the broker granted the subscription.
    pub granted: bool,
}

impl SubscribeOutcome {
    /// Creates a granted outcome.
    #[must_use]
    pub fn granted(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            granted: true,
        }
    }

    /// Creates a denied outcome.
    #[must_use]
    pub fn denied(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            granted: false,
        }
    }
}

/// Asynchronous notification from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted the connection.
    ConnAck,
    /// The broker acknowledged a publish.
    PubAck {
        /// Packet identifier of the acknowledged publish.
        pkid: u16,
    },
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message was published on.
        topic: String,
        /// Message payload as text.
        payload: String,
    },
    /// A batch of subscribe results.
    SubAck(Vec<SubscribeOutcome>),
    /// Topics that were unsubscribed.
    UnsubAck {
        /// The unsubscribed topics.
        topics: Vec<String>,
    },
    /// The connection ended.
    Disconnected {
        /// Why the connection ended, when it was not requested.
        error: Option<String>,
    },
}

/// Primitive operations of a publish/subscribe client.
///
/// Implementations must not block: requests are handed to the client and
/// their outcome is reported later through the [`EventSink`] given to
/// [`connect`](Transport::connect).
pub trait Transport: Send + Sync {
    /// Starts a connection attempt.
    ///
    /// Returning `Ok` means the attempt was accepted; the connection is only
    /// usable once [`TransportEvent::ConnAck`] arrives on `events`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the attempt is rejected up front.
    fn connect(&self, events: EventSink) -> Result<(), ProtocolError>;

    /// Requests a subscription.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request could not be issued.
    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), ProtocolError>;

    /// Requests removal of a subscription.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request could not be issued.
    fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError>;

    /// Publishes a text payload.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request could not be issued.
    fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<(), ProtocolError>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the request could not be issued.
    fn disconnect(&self) -> Result<(), ProtocolError>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn connect(&self, events: EventSink) -> Result<(), ProtocolError> {
        (**self).connect(events)
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), ProtocolError> {
        (**self).subscribe(topic, qos)
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        (**self).unsubscribe(topic)
    }

    fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<(), ProtocolError> {
        (**self).publish(topic, payload, qos)
    }

    fn disconnect(&self) -> Result<(), ProtocolError> {
        (**self).disconnect()
    }
}
