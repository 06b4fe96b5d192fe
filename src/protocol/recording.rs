// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport that records every request, for unit tests.

use parking_lot::Mutex;

use crate::error::ProtocolError;
use crate::protocol::{EventSink, PendingCommand, SubscribeOutcome, Transport, TransportEvent};
use crate::types::QoS;

#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    sink: Mutex<Option<EventSink>>,
    calls: Mutex<Vec<PendingCommand>>,
    refuse_connect: bool,
    /// Answer every subscribe with a granted `SubAck`.
    auto_ack: bool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn auto_ack() -> Self {
        Self {
            auto_ack: true,
            ..Self::default()
        }
    }

    pub(crate) fn refusing() -> Self {
        Self {
            refuse_connect: true,
            ..Self::default()
        }
    }

    /// Delivers an event as if the broker had sent it.
    pub(crate) fn emit(&self, event: TransportEvent) {
        if let Some(sink) = self.sink.lock().as_ref() {
            let _ = sink.send(event);
        }
    }

    pub(crate) fn calls(&self) -> Vec<PendingCommand> {
        self.calls.lock().clone()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl Transport for RecordingTransport {
    fn connect(&self, events: EventSink) -> Result<(), ProtocolError> {
        if self.refuse_connect {
            return Err(ProtocolError::ConnectionRefused("refused".to_string()));
        }
        *self.sink.lock() = Some(events);
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), ProtocolError> {
        self.calls.lock().push(PendingCommand::Subscribe {
            topic: topic.to_string(),
            qos,
        });
        if self.auto_ack {
            self.emit(TransportEvent::SubAck(vec![SubscribeOutcome::granted(topic)]));
        }
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.calls.lock().push(PendingCommand::unsubscribe(topic));
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &str, qos: QoS) -> Result<(), ProtocolError> {
        self.calls.lock().push(PendingCommand::Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
            qos,
        });
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ProtocolError> {
        self.emit(TransportEvent::Disconnected { error: None });
        Ok(())
    }
}
