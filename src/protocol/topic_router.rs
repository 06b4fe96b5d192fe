// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic routing between literal topics and semantic functions.
//!
//! The [`TopicRouter`] is built from three configuration mappings and
//! answers two questions: what does an inbound topic mean, and where does
//! an outbound command go.
//!
//! # Architecture
//!
//! ```text
//! MQTT Message: device_97F4A9/led/status → on
//!                     ↓
//!             TopicRouter.dispatch()
//!                     ↓
//!       roles["device_97F4A9/led/status"]
//!                     ↓
//!              Route::Status(Led)
//!                     ↓
//!        SessionOutput::on_status_update
//! ```

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::LookupError;
use crate::types::{ConnectionTopicKind, ReceiveFunction, SendFunction, TopicRole};

/// Payload the device answers a ping with.
pub const PONG_PAYLOAD: &str = "pong";

/// Where an inbound message has to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Telemetry update for a receive function.
    Telemetry(ReceiveFunction),
    /// Current-value report for a send function.
    Status(SendFunction),
    /// The device answered the liveness ping.
    Pong,
    /// Unregistered topic, or a connection topic without the pong marker.
    Ignored,
}

#[derive(Debug, Default)]
struct RoutingTables {
    /// Inbound role of each topic; a topic holds one role at a time.
    roles: HashMap<String, TopicRole>,
    /// Outbound command topic per send function.
    send_topics: HashMap<SendFunction, String>,
    connection_topics: HashMap<ConnectionTopicKind, String>,
}

/// Maps literal topics to semantic functions and back.
///
/// Configuration normally happens once before traffic starts; the tables
/// sit behind a reader/writer lock so reconfiguring while messages are being
/// routed stays safe.
#[derive(Debug, Default)]
pub struct TopicRouter {
    tables: RwLock<RoutingTables>,
}

impl TopicRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all routing tables from configuration mappings.
    ///
    /// - `functions`: function name → topic, for receive and send functions
    /// - `status`: send function name → status topic
    /// - `connection`: `ping`/`pong` → topic
    ///
    /// Unknown names are logged and skipped. Mappings are applied in that
    /// order; when two entries claim the same topic the later one wins, so
    /// pass ordered mappings for a deterministic result.
    pub fn configure<F, S, C, K, V>(&self, functions: F, status: S, connection: C)
    where
        F: IntoIterator<Item = (K, V)>,
        S: IntoIterator<Item = (K, V)>,
        C: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut tables = RoutingTables::default();

        for (name, topic) in functions {
            let (name, topic) = (name.as_ref(), topic.as_ref());
            if let Ok(function) = name.parse::<ReceiveFunction>() {
                assign_role(&mut tables, topic, TopicRole::Telemetry(function));
            } else if let Ok(function) = name.parse::<SendFunction>() {
                tables.send_topics.insert(function, topic.to_string());
            } else {
                tracing::warn!(function = %name, topic = %topic, "Unknown function, skipping");
            }
        }

        for (name, topic) in status {
            let (name, topic) = (name.as_ref(), topic.as_ref());
            match name.parse::<SendFunction>() {
                Ok(function) => assign_role(&mut tables, topic, TopicRole::Status(function)),
                Err(_) => {
                    tracing::warn!(
                        function = %name,
                        topic = %topic,
                        "Unknown send function for status topic, skipping"
                    );
                }
            }
        }

        for (name, topic) in connection {
            let (name, topic) = (name.as_ref(), topic.as_ref());
            match name.parse::<ConnectionTopicKind>() {
                Ok(kind) => {
                    tables.connection_topics.insert(kind, topic.to_string());
                    assign_role(&mut tables, topic, TopicRole::Connection(kind));
                }
                Err(_) => {
                    tracing::warn!(kind = %name, topic = %topic, "Unknown connection kind, skipping");
                }
            }
        }

        tracing::debug!(
            inbound = tables.roles.len(),
            send = tables.send_topics.len(),
            connection = tables.connection_topics.len(),
            "Configured topic routes"
        );
        *self.tables.write() = tables;
    }

    /// Returns the role registered for `topic`.
    #[must_use]
    pub fn classify(&self, topic: &str) -> Option<TopicRole> {
        self.tables.read().roles.get(topic).copied()
    }

    /// Decides where an inbound message goes.
    ///
    /// A connection topic only routes as [`Route::Pong`] when the payload is
    /// exactly [`PONG_PAYLOAD`] and the topic is the pong topic.
    #[must_use]
    pub fn dispatch(&self, topic: &str, payload: &str) -> Route {
        match self.classify(topic) {
            Some(TopicRole::Telemetry(function)) => Route::Telemetry(function),
            Some(TopicRole::Status(function)) => Route::Status(function),
            Some(TopicRole::Connection(ConnectionTopicKind::Pong)) if payload == PONG_PAYLOAD => {
                Route::Pong
            }
            Some(TopicRole::Connection(kind)) => {
                tracing::trace!(topic = %topic, kind = %kind, payload = %payload, "Ignoring connection message");
                Route::Ignored
            }
            None => {
                tracing::trace!(topic = %topic, "Ignoring unregistered topic");
                Route::Ignored
            }
        }
    }

    /// Returns the command topic for a send function.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::UnconfiguredFunction` if no topic was configured
    /// for `function`.
    pub fn resolve_send_topic(&self, function: SendFunction) -> Result<String, LookupError> {
        self.tables
            .read()
            .send_topics
            .get(&function)
            .cloned()
            .ok_or(LookupError::UnconfiguredFunction(function))
    }

    /// Returns the topic configured for a connection kind.
    #[must_use]
    pub fn connection_topic(&self, kind: ConnectionTopicKind) -> Option<String> {
        self.tables.read().connection_topics.get(&kind).cloned()
    }

    /// Returns the topic a receive function's telemetry arrives on.
    #[must_use]
    pub fn telemetry_topic(&self, function: ReceiveFunction) -> Option<String> {
        self.topic_for_role(TopicRole::Telemetry(function))
    }

    /// Returns the topic a send function's current value is reported on.
    #[must_use]
    pub fn status_topic(&self, function: SendFunction) -> Option<String> {
        self.topic_for_role(TopicRole::Status(function))
    }

    /// Returns all telemetry topics, sorted.
    #[must_use]
    pub fn telemetry_topics(&self) -> Vec<String> {
        self.topics_where(|role| matches!(role, TopicRole::Telemetry(_)))
    }

    /// Returns all status topics, sorted.
    #[must_use]
    pub fn status_topics(&self) -> Vec<String> {
        self.topics_where(|role| matches!(role, TopicRole::Status(_)))
    }

    /// Returns the command topic to poll when `status_topic` becomes active.
    ///
    /// `None` if the topic is not a status topic or its send function has no
    /// command topic.
    #[must_use]
    pub fn poll_topic_for_status(&self, status_topic: &str) -> Option<(SendFunction, String)> {
        let tables = self.tables.read();
        let Some(TopicRole::Status(function)) = tables.roles.get(status_topic) else {
            return None;
        };
        let Some(send_topic) = tables.send_topics.get(function) else {
            tracing::warn!(
                function = %function,
                topic = %status_topic,
                "Status topic has no command topic to poll"
            );
            return None;
        };
        Some((*function, send_topic.clone()))
    }

    fn topic_for_role(&self, role: TopicRole) -> Option<String> {
        self.tables
            .read()
            .roles
            .iter()
            .find_map(|(topic, r)| (*r == role).then(|| topic.clone()))
    }

    fn topics_where(&self, predicate: impl Fn(&TopicRole) -> bool) -> Vec<String> {
        let mut topics: Vec<String> = self
            .tables
            .read()
            .roles
            .iter()
            .filter(|(_, role)| predicate(role))
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        topics
    }
}

/// Registers `role` for `topic`, dropping any role it held before.
fn assign_role(tables: &mut RoutingTables, topic: &str, role: TopicRole) {
    // A function keeps a single topic: moving it frees its previous topic.
    tables.roles.retain(|_, existing| *existing != role);
    if let Some(previous) = tables.roles.insert(topic.to_string(), role)
        && previous != role
    {
        tracing::debug!(topic = %topic, from = %previous, to = %role, "Topic role reassigned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: [(&str, &str); 0] = [];

    fn configured() -> TopicRouter {
        let router = TopicRouter::new();
        router.configure(
            [
                ("temperature", "dev/temp"),
                ("led", "dev/led"),
                ("brightness", "dev/led/bright"),
            ],
            [
                ("led", "dev/led/status"),
                ("brightness", "dev/led/bright/status"),
            ],
            [("ping", "dev/ping"), ("pong", "dev/pong")],
        );
        router
    }

    #[test]
    fn classify_configured_topics() {
        let router = configured();
        assert_eq!(
            router.classify("dev/temp"),
            Some(TopicRole::Telemetry(ReceiveFunction::Temperature))
        );
        assert_eq!(
            router.classify("dev/led/status"),
            Some(TopicRole::Status(SendFunction::Led))
        );
        assert_eq!(
            router.classify("dev/pong"),
            Some(TopicRole::Connection(ConnectionTopicKind::Pong))
        );
        // Send topics are outbound only.
        assert_eq!(router.classify("dev/led"), None);
        assert_eq!(router.classify("unknown"), None);
    }

    #[test]
    fn later_mapping_wins_for_shared_topic() {
        let router = TopicRouter::new();
        router.configure(
            [("temperature", "shared")],
            [("led", "shared")],
            NONE,
        );
        assert_eq!(
            router.classify("shared"),
            Some(TopicRole::Status(SendFunction::Led))
        );
        assert!(router.telemetry_topics().is_empty());
        assert_eq!(router.telemetry_topic(ReceiveFunction::Temperature), None);
    }

    #[test]
    fn shared_status_topic_from_config_is_deterministic() {
        let config = crate::config::TopicConfig::new()
            .with_status("led", "dev/shared")
            .with_status("brightness", "dev/shared");

        for _ in 0..8 {
            let router = TopicRouter::new();
            router.configure(&config.functions, &config.status, &config.connection);
            assert_eq!(
                router.classify("dev/shared"),
                Some(TopicRole::Status(SendFunction::Led))
            );
            assert_eq!(router.status_topic(SendFunction::Brightness), None);
        }
    }

    #[test]
    fn reconfigure_replaces_everything() {
        let router = configured();
        router.configure([("temperature", "other/temp")], NONE, NONE);

        assert_eq!(router.classify("dev/temp"), None);
        assert_eq!(router.classify("dev/led/status"), None);
        assert_eq!(
            router.classify("other/temp"),
            Some(TopicRole::Telemetry(ReceiveFunction::Temperature))
        );
        assert!(router.resolve_send_topic(SendFunction::Led).is_err());
        assert_eq!(router.connection_topic(ConnectionTopicKind::Ping), None);
    }

    #[test]
    fn unknown_names_are_skipped() {
        let router = TopicRouter::new();
        router.configure(
            [("humidity", "dev/hum"), ("temperature", "dev/temp")],
            [("temperature", "dev/temp/status")],
            [("heartbeat", "dev/hb")],
        );
        assert_eq!(router.classify("dev/hum"), None);
        assert_eq!(router.classify("dev/temp/status"), None);
        assert_eq!(router.classify("dev/hb"), None);
        assert_eq!(router.telemetry_topics(), vec!["dev/temp".to_string()]);
    }

    #[test]
    fn resolve_send_topic() {
        let router = configured();
        assert_eq!(router.resolve_send_topic(SendFunction::Led).unwrap(), "dev/led");

        let empty = TopicRouter::new();
        assert_eq!(
            empty.resolve_send_topic(SendFunction::Led),
            Err(LookupError::UnconfiguredFunction(SendFunction::Led))
        );
    }

    #[test]
    fn dispatch_routes() {
        let router = configured();
        assert_eq!(
            router.dispatch("dev/temp", "21.5"),
            Route::Telemetry(ReceiveFunction::Temperature)
        );
        assert_eq!(
            router.dispatch("dev/led/bright/status", "40"),
            Route::Status(SendFunction::Brightness)
        );
        assert_eq!(router.dispatch("dev/pong", "pong"), Route::Pong);
        assert_eq!(router.dispatch("dev/pong", "PONG"), Route::Ignored);
        assert_eq!(router.dispatch("dev/ping", "pong"), Route::Ignored);
        assert_eq!(router.dispatch("nowhere", "x"), Route::Ignored);
    }

    #[test]
    fn status_and_telemetry_topic_lists_are_sorted() {
        let router = configured();
        assert_eq!(
            router.status_topics(),
            vec![
                "dev/led/bright/status".to_string(),
                "dev/led/status".to_string()
            ]
        );
        assert_eq!(router.telemetry_topics(), vec!["dev/temp".to_string()]);
    }

    #[test]
    fn poll_topic_for_status() {
        let router = configured();
        assert_eq!(
            router.poll_topic_for_status("dev/led/status"),
            Some((SendFunction::Led, "dev/led".to_string()))
        );
        assert_eq!(router.poll_topic_for_status("dev/temp"), None);

        let partial = TopicRouter::new();
        partial.configure(NONE, [("led", "s1")], NONE);
        assert_eq!(partial.poll_topic_for_status("s1"), None);
    }

    #[test]
    fn moving_a_function_frees_its_old_topic() {
        let router = TopicRouter::new();
        router.configure(NONE, [("led", "a"), ("led", "b")], NONE);
        assert_eq!(router.classify("a"), None);
        assert_eq!(router.status_topic(SendFunction::Led), Some("b".to_string()));
    }
}
