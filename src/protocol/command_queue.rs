// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Queue of requests issued while the broker connection is not usable.

use std::collections::VecDeque;

use crate::error::ProtocolError;
use crate::types::{ConnectionState, QoS};

/// A subscribe, unsubscribe or publish request awaiting execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCommand {
    /// Subscribe to a topic.
    Subscribe {
        /// Target topic.
        topic: String,
        /// Requested delivery guarantee.
        qos: QoS,
    },
    /// Unsubscribe from a topic.
    Unsubscribe {
        /// Target topic.
        topic: String,
    },
    /// Publish a payload.
    Publish {
        /// Target topic.
        topic: String,
        /// Text payload.
        payload: String,
        /// Requested delivery guarantee.
        qos: QoS,
    },
}

impl PendingCommand {
    /// Creates a subscribe request with at-least-once delivery.
    #[must_use]
    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self::Subscribe {
            topic: topic.into(),
            qos: QoS::AtLeastOnce,
        }
    }

    /// Creates an unsubscribe request.
    #[must_use]
    pub fn unsubscribe(topic: impl Into<String>) -> Self {
        Self::Unsubscribe {
            topic: topic.into(),
        }
    }

    /// Creates a publish request with at-least-once delivery.
    #[must_use]
    pub fn publish(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
        }
    }

    /// Returns the command kind for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::Publish { .. } => "publish",
        }
    }

    /// Returns the target topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            Self::Subscribe { topic, .. }
            | Self::Unsubscribe { topic }
            | Self::Publish { topic, .. } => topic,
        }
    }
}

/// Outcome of draining the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Commands handed to the transport successfully.
    pub executed: usize,
    /// Commands whose execution failed and were discarded.
    pub failed: usize,
}

/// FIFO of requests issued while not connected.
#[derive(Debug, Default)]
pub struct CommandQueue {
    pending: VecDeque<PendingCommand>,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command to the tail.
    pub fn enqueue(&mut self, command: PendingCommand) {
        tracing::debug!(
            command = command.kind(),
            topic = %command.topic(),
            queued = self.pending.len() + 1,
            "Queueing command until connected"
        );
        self.pending.push_back(command);
    }

    /// Returns the number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the queued commands in submission order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingCommand> {
        self.pending.iter()
    }

    /// Executes every queued command in submission order if `state` is
    /// connected.
    ///
    /// Only the commands present when the drain starts are executed. A
    /// failing command is logged and dropped; draining continues with the
    /// next one.
    pub fn drain_if_ready<F>(&mut self, state: ConnectionState, mut execute: F) -> DrainReport
    where
        F: FnMut(&PendingCommand) -> Result<(), ProtocolError>,
    {
        let mut report = DrainReport::default();
        if !state.is_connected() {
            return report;
        }

        let batch = std::mem::take(&mut self.pending);
        for command in batch {
            match execute(&command) {
                Ok(()) => report.executed += 1,
                Err(e) => {
                    tracing::warn!(
                        command = command.kind(),
                        topic = %command.topic(),
                        error = %e,
                        "Queued command failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if report.executed + report.failed > 0 {
            tracing::debug!(
                executed = report.executed,
                failed = report.failed,
                "Drained command queue"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_submission_order() {
        let mut queue = CommandQueue::new();
        queue.enqueue(PendingCommand::subscribe("a"));
        queue.enqueue(PendingCommand::publish("b", "x"));
        queue.enqueue(PendingCommand::unsubscribe("c"));

        let mut seen = Vec::new();
        let report = queue.drain_if_ready(ConnectionState::Connected, |command| {
            seen.push(command.clone());
            Ok(())
        });

        assert_eq!(report.executed, 3);
        assert_eq!(
            seen,
            vec![
                PendingCommand::subscribe("a"),
                PendingCommand::publish("b", "x"),
                PendingCommand::unsubscribe("c"),
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_runs_each_command_once() {
        let mut queue = CommandQueue::new();
        queue.enqueue(PendingCommand::publish("t", "1"));

        let mut count = 0;
        queue.drain_if_ready(ConnectionState::Connected, |_| {
            count += 1;
            Ok(())
        });
        queue.drain_if_ready(ConnectionState::Connected, |_| {
            count += 1;
            Ok(())
        });

        assert_eq!(count, 1);
    }

    #[test]
    fn drain_waits_for_connected_state() {
        let mut queue = CommandQueue::new();
        queue.enqueue(PendingCommand::subscribe("a"));

        for state in [ConnectionState::Disconnected, ConnectionState::Connecting] {
            let report = queue.drain_if_ready(state, |_| panic!("must not execute"));
            assert_eq!(report, DrainReport::default());
        }
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_continues_after_failure() {
        let mut queue = CommandQueue::new();
        queue.enqueue(PendingCommand::publish("first", "x"));
        queue.enqueue(PendingCommand::publish("broken", "x"));
        queue.enqueue(PendingCommand::publish("last", "x"));

        let mut seen = Vec::new();
        let report = queue.drain_if_ready(ConnectionState::Connected, |command| {
            seen.push(command.topic().to_string());
            if command.topic() == "broken" {
                Err(ProtocolError::NotStarted)
            } else {
                Ok(())
            }
        });

        assert_eq!(seen, ["first", "broken", "last"]);
        assert_eq!(
            report,
            DrainReport {
                executed: 2,
                failed: 1
            }
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn command_accessors() {
        let command = PendingCommand::publish("dev/led", "on");
        assert_eq!(command.kind(), "publish");
        assert_eq!(command.topic(), "dev/led");
        assert!(matches!(
            command,
            PendingCommand::Publish {
                qos: QoS::AtLeastOnce,
                ..
            }
        ));
    }
}
