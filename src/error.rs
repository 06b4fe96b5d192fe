// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `devlink` library.
//!
//! Only failures a caller can act on are surfaced as `Err` values: invalid
//! values, transport failures, configuration parse failures and sends to a
//! function that was never configured. Unknown configuration entries and
//! per-topic delivery failures are logged and never propagated.

use thiserror::Error;

use crate::types::SendFunction;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing configuration.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// An outbound command targeted a function with no configured topic.
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u8,
        /// Maximum allowed value.
        max: u8,
        /// The actual value that was provided.
        actual: u16,
    },

    /// A function name matched neither a receive nor a send function.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// A connection topic kind other than `ping` or `pong`.
    #[error("unknown connection topic kind: {0}")]
    UnknownConnectionKind(String),

    /// An LED state payload other than `on` or `off`.
    #[error("invalid LED state: {0}")]
    InvalidLedState(String),

    /// A brightness payload that is not a decimal number.
    #[error("invalid brightness: {0}")]
    InvalidBrightness(String),
}

/// Errors related to the broker connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The transport refused to start a connection attempt.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Invalid broker address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A request was issued before the transport was connected.
    #[error("transport not started")]
    NotStarted,
}

/// Errors related to parsing configuration.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A send function was used before a topic was configured for it.
///
/// This is a caller contract violation rather than a runtime condition:
/// topics must be configured before commands are sent.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    /// No send topic is configured for the function.
    #[error("no topic configured for function {0}")]
    UnconfiguredFunction(SendFunction),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            min: 0,
            max: 100,
            actual: 150,
        };
        assert_eq!(err.to_string(), "value 150 is out of range [0, 100]");
    }

    #[test]
    fn error_from_lookup_error() {
        let err: Error = LookupError::UnconfiguredFunction(SendFunction::Led).into();
        assert!(matches!(
            err,
            Error::Lookup(LookupError::UnconfiguredFunction(SendFunction::Led))
        ));
    }

    #[test]
    fn lookup_error_display() {
        let err = LookupError::UnconfiguredFunction(SendFunction::Brightness);
        assert_eq!(err.to_string(), "no topic configured for function brightness");
    }

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::ConnectionRefused("empty host".to_string());
        assert_eq!(err.to_string(), "connection refused: empty host");
    }
}
