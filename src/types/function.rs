// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Semantic functions a device exposes and the roles their topics play.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;
use crate::types::ConnectionTopicKind;

/// Read-only telemetry published by the device.
///
/// # Examples
///
/// ```
/// use devlink_lib::types::ReceiveFunction;
///
/// let function: ReceiveFunction = "temperature".parse().unwrap();
/// assert_eq!(function, ReceiveFunction::Temperature);
/// assert!("led".parse::<ReceiveFunction>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReceiveFunction {
    /// Temperature sensor reading.
    Temperature,
}

impl ReceiveFunction {
    /// All receive functions.
    pub const ALL: [Self; 1] = [Self::Temperature];

    /// Returns the configuration name of the function.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
        }
    }
}

impl fmt::Display for ReceiveFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiveFunction {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|function| function.as_str() == s)
            .ok_or_else(|| ValueError::UnknownFunction(s.to_string()))
    }
}

/// Controllable actuator on the device.
///
/// Each send function has an outbound command topic and, optionally, a
/// status topic on which the device reports the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SendFunction {
    /// On/off LED.
    Led,
    /// LED brightness (0-100).
    Brightness,
}

impl SendFunction {
    /// All send functions.
    pub const ALL: [Self; 2] = [Self::Led, Self::Brightness];

    /// Returns the configuration name of the function.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Led => "led",
            Self::Brightness => "brightness",
        }
    }
}

impl fmt::Display for SendFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendFunction {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|function| function.as_str() == s)
            .ok_or_else(|| ValueError::UnknownFunction(s.to_string()))
    }
}

/// The role a literal topic plays for inbound routing.
///
/// A topic holds exactly one role at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicRole {
    /// Telemetry for a receive function.
    Telemetry(ReceiveFunction),
    /// Current-value report for a send function.
    Status(SendFunction),
    /// Liveness handshake topic.
    Connection(ConnectionTopicKind),
}

impl fmt::Display for TopicRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telemetry(function) => write!(f, "telemetry({function})"),
            Self::Status(function) => write!(f, "status({function})"),
            Self::Connection(kind) => write!(f, "connection({kind})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_function_from_str() {
        assert_eq!(
            "temperature".parse::<ReceiveFunction>().unwrap(),
            ReceiveFunction::Temperature
        );
    }

    #[test]
    fn send_function_from_str() {
        assert_eq!("led".parse::<SendFunction>().unwrap(), SendFunction::Led);
        assert_eq!(
            "brightness".parse::<SendFunction>().unwrap(),
            SendFunction::Brightness
        );
    }

    #[test]
    fn function_names_are_case_sensitive() {
        assert!("LED".parse::<SendFunction>().is_err());
        assert!("Temperature".parse::<ReceiveFunction>().is_err());
    }

    #[test]
    fn unknown_function_reports_name() {
        let err = "humidity".parse::<SendFunction>().unwrap_err();
        assert_eq!(err, ValueError::UnknownFunction("humidity".to_string()));
    }

    #[test]
    fn topic_role_display() {
        assert_eq!(
            TopicRole::Status(SendFunction::Led).to_string(),
            "status(led)"
        );
        assert_eq!(
            TopicRole::Connection(ConnectionTopicKind::Pong).to_string(),
            "connection(pong)"
        );
    }
}
