// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session configuration.
//!
//! Topics are supplied entirely by configuration: the library imposes no
//! naming scheme and treats every topic as an opaque key.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Default interval between liveness pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(2);

/// Topic mappings for a single device.
///
/// Each section is ordered by name, so when two entries of a section share a
/// topic the one whose name sorts last owns it.
///
/// # Examples
///
/// ```
/// use devlink_lib::TopicConfig;
///
/// let config = TopicConfig::new()
///     .with_function("temperature", "device_97F4A9/temp")
///     .with_function("led", "device_97F4A9/led")
///     .with_status("led", "device_97F4A9/led/status")
///     .with_connection("ping", "device_97F4A9/ping")
///     .with_connection("pong", "device_97F4A9/pong");
///
/// assert_eq!(config.functions.len(), 2);
///
/// let parsed = TopicConfig::from_json(r#"{"functions": {"temperature": "t1"}}"#).unwrap();
/// assert!(parsed.status.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Function name to topic, for both receive and send functions.
    pub functions: BTreeMap<String, String>,
    /// Send function name to the topic its current value is reported on.
    pub status: BTreeMap<String, String>,
    /// Connection kind (`ping`, `pong`) to topic.
    pub connection: BTreeMap<String, String>,
}

impl TopicConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    ///
    /// Missing sections default to empty mappings.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Json` if the document is not valid JSON or a
    /// section is not a string-to-string object.
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Adds a function topic.
    #[must_use]
    pub fn with_function(mut self, function: impl Into<String>, topic: impl Into<String>) -> Self {
        self.functions.insert(function.into(), topic.into());
        self
    }

    /// Adds a status topic for a send function.
    #[must_use]
    pub fn with_status(mut self, function: impl Into<String>, topic: impl Into<String>) -> Self {
        self.status.insert(function.into(), topic.into());
        self
    }

    /// Adds a connection topic.
    #[must_use]
    pub fn with_connection(mut self, kind: impl Into<String>, topic: impl Into<String>) -> Self {
        self.connection.insert(kind.into(), topic.into());
        self
    }
}

/// Tunables for a device session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Interval between liveness pings (default: 2 seconds).
    pub ping_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Sets the ping interval.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_full() {
        let json = r#"{
            "functions": {"temperature": "dev/temp", "led": "dev/led"},
            "status": {"led": "dev/led/status"},
            "connection": {"ping": "dev/ping", "pong": "dev/pong"}
        }"#;
        let config = TopicConfig::from_json(json).unwrap();
        assert_eq!(config.functions["led"], "dev/led");
        assert_eq!(config.status["led"], "dev/led/status");
        assert_eq!(config.connection["pong"], "dev/pong");
    }

    #[test]
    fn from_json_missing_sections() {
        let config = TopicConfig::from_json("{}").unwrap();
        assert_eq!(config, TopicConfig::default());
    }

    #[test]
    fn from_json_rejects_non_string_topic() {
        let result = TopicConfig::from_json(r#"{"functions": {"led": 5}}"#);
        assert!(matches!(result, Err(ParseError::Json(_))));
    }

    #[test]
    fn builder_overwrites_same_key() {
        let config = TopicConfig::new()
            .with_function("led", "a")
            .with_function("led", "b");
        assert_eq!(config.functions.len(), 1);
        assert_eq!(config.functions["led"], "b");
    }

    #[test]
    fn sections_iterate_by_name() {
        let config = TopicConfig::new()
            .with_status("led", "dev/shared")
            .with_status("brightness", "dev/shared");
        let names: Vec<_> = config.status.keys().map(String::as_str).collect();
        assert_eq!(names, ["brightness", "led"]);
    }

    #[test]
    fn session_config_default_interval() {
        assert_eq!(SessionConfig::default().ping_interval, Duration::from_secs(2));
        let config = SessionConfig::default().with_ping_interval(Duration::from_millis(500));
        assert_eq!(config.ping_interval, Duration::from_millis(500));
    }
}
