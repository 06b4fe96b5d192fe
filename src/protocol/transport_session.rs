// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection-state-aware wrapper around a [`Transport`].
//!
//! Requests issued while connected go straight to the transport. Anything
//! issued while disconnected or still connecting is queued and replayed, in
//! order, when the broker acknowledges the connection. Callers are never
//! blocked waiting for connectivity.
//!
//! ```text
//! subscribe/publish ──► Connected? ──yes──► Transport
//!                           │
//!                           no
//!                           ▼
//!                      CommandQueue ──(ConnAck)──► Transport
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::error::ProtocolError;
use crate::protocol::{CommandQueue, EventSink, PendingCommand, Transport, TransportEvent};
use crate::types::ConnectionState;

/// What a transport event means for the layers above the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A message to route.
    Message {
        /// Topic the message arrived on.
        topic: String,
        /// Text payload.
        payload: String,
    },
    /// Topics whose subscription the broker granted.
    Subscribed(Vec<String>),
}

struct Link {
    state: ConnectionState,
    queue: CommandQueue,
}

/// Owns the connection state and the pending-command queue.
pub struct TransportSession {
    transport: Arc<dyn Transport>,
    /// State and queue share one lock so a drain never interleaves with
    /// new submissions.
    link: Mutex<Link>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: EventSink,
}

impl TransportSession {
    /// Creates a session over `transport`.
    ///
    /// Returns the receiver on which the transport's events arrive; feed
    /// each one to [`handle_event`](Self::handle_event).
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let session = Self {
            transport,
            link: Mutex::new(Link {
                state: ConnectionState::Disconnected,
                queue: CommandQueue::new(),
            }),
            state_tx,
            events_tx,
        };
        (session, events_rx)
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.link.lock().state
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Returns the number of requests waiting for a connection.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.link.lock().queue.len()
    }

    /// Starts a connection attempt.
    ///
    /// Returns `true` if the transport accepted the attempt. A rejected
    /// attempt is logged and leaves the state `Disconnected`; calling
    /// `start` again retries. Does nothing unless currently disconnected.
    pub fn start(&self) -> bool {
        let mut link = self.link.lock();
        if link.state != ConnectionState::Disconnected {
            tracing::debug!(state = %link.state, "Connection already in progress");
            return false;
        }

        self.set_state(&mut link, ConnectionState::Connecting);
        match self.transport.connect(self.events_tx.clone()) {
            Ok(()) => {
                tracing::debug!("Connection attempt accepted");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Connection attempt rejected");
                self.set_state(&mut link, ConnectionState::Disconnected);
                false
            }
        }
    }

    /// Subscribes to `topic`, or queues the request until connected.
    pub fn subscribe(&self, topic: &str) {
        self.submit(PendingCommand::subscribe(topic));
    }

    /// Unsubscribes from `topic`, or queues the request until connected.
    pub fn unsubscribe(&self, topic: &str) {
        self.submit(PendingCommand::unsubscribe(topic));
    }

    /// Publishes `payload` to `topic`, or queues the request until connected.
    pub fn publish(&self, topic: &str, payload: &str) {
        self.submit(PendingCommand::publish(topic, payload));
    }

    /// Publishes `payload` to `topic`, or queues it, unless `live` has
    /// been cleared.
    ///
    /// `live` is read under the same lock that orders every request, so once
    /// it is cleared no later request can be preceded by this publish.
    /// Returns whether the publish was issued or queued.
    pub fn publish_while(&self, topic: &str, payload: &str, live: &AtomicBool) -> bool {
        let mut link = self.link.lock();
        if !live.load(Ordering::Acquire) {
            return false;
        }
        self.submit_locked(&mut link, PendingCommand::publish(topic, payload));
        true
    }

    /// Asks the transport to close the connection.
    ///
    /// The state changes once the transport reports the disconnect.
    pub fn disconnect(&self) {
        if let Err(e) = self.transport.disconnect() {
            tracing::warn!(error = %e, "Disconnect request failed");
        }
    }

    /// Applies a transport event.
    ///
    /// Returns the part of the event the routing layer has to act on.
    pub fn handle_event(&self, event: TransportEvent) -> Option<Inbound> {
        match event {
            TransportEvent::ConnAck => {
                self.on_connected();
                None
            }
            TransportEvent::PubAck { pkid } => {
                tracing::trace!(pkid, "Publish acknowledged");
                None
            }
            TransportEvent::Message { topic, payload } => {
                tracing::debug!(topic = %topic, payload = %payload, "Message received");
                Some(Inbound::Message { topic, payload })
            }
            TransportEvent::SubAck(outcomes) => {
                let mut granted = Vec::with_capacity(outcomes.len());
                for outcome in outcomes {
                    if outcome.granted {
                        tracing::debug!(topic = %outcome.topic, "Subscribed to topic");
                        granted.push(outcome.topic);
                    } else {
                        tracing::warn!(topic = %outcome.topic, "Subscription denied");
                    }
                }
                (!granted.is_empty()).then_some(Inbound::Subscribed(granted))
            }
            TransportEvent::UnsubAck { topics } => {
                for topic in &topics {
                    tracing::debug!(topic = %topic, "Unsubscribed from topic");
                }
                None
            }
            TransportEvent::Disconnected { error } => {
                let mut link = self.link.lock();
                self.set_state(&mut link, ConnectionState::Disconnected);
                match error {
                    Some(error) => tracing::warn!(error = %error, "Disconnected from broker"),
                    None => tracing::info!("Disconnected from broker"),
                }
                None
            }
        }
    }

    fn on_connected(&self) {
        let mut link = self.link.lock();
        if link.state.is_connected() {
            tracing::debug!("Duplicate connection acknowledgment ignored");
            return;
        }

        self.set_state(&mut link, ConnectionState::Connected);
        tracing::info!(pending = link.queue.len(), "Connected to broker");

        let state = link.state;
        link.queue
            .drain_if_ready(state, |command| self.execute(command));
    }

    fn submit(&self, command: PendingCommand) {
        let mut link = self.link.lock();
        self.submit_locked(&mut link, command);
    }

    fn submit_locked(&self, link: &mut Link, command: PendingCommand) {
        if link.state.is_connected() {
            tracing::debug!(command = command.kind(), topic = %command.topic(), "Executing command");
            if let Err(e) = self.execute(&command) {
                log_delivery_failure(&command, &e);
            }
        } else {
            link.queue.enqueue(command);
        }
    }

    fn execute(&self, command: &PendingCommand) -> Result<(), ProtocolError> {
        match command {
            PendingCommand::Subscribe { topic, qos } => self.transport.subscribe(topic, *qos),
            PendingCommand::Unsubscribe { topic } => self.transport.unsubscribe(topic),
            PendingCommand::Publish {
                topic,
                payload,
                qos,
            } => self.transport.publish(topic, payload, *qos),
        }
    }

    fn set_state(&self, link: &mut Link, state: ConnectionState) {
        link.state = state;
        self.state_tx.send_replace(state);
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let link = self.link.lock();
        f.debug_struct("TransportSession")
            .field("state", &link.state)
            .field("pending", &link.queue.len())
            .finish_non_exhaustive()
    }
}

fn log_delivery_failure(command: &PendingCommand, error: &ProtocolError) {
    tracing::warn!(
        command = command.kind(),
        topic = %command.topic(),
        error = %error,
        "Command failed"
    );
}
