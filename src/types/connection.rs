// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection lifecycle types.

use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;

/// Kind of a liveness handshake topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionTopicKind {
    /// Topic the application publishes `ping` and `ready` on.
    Ping,
    /// Topic the device answers `pong` on.
    Pong,
}

impl ConnectionTopicKind {
    /// Returns the configuration name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }
}

impl fmt::Display for ConnectionTopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionTopicKind {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ping" => Ok(Self::Ping),
            "pong" => Ok(Self::Pong),
            _ => Err(ValueError::UnknownConnectionKind(s.to_string())),
        }
    }
}

/// State of the broker connection.
///
/// Owned by the transport session; everything else only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// Connect accepted, waiting for the broker acknowledgment.
    Connecting,
    /// Broker acknowledged the connection.
    Connected,
}

impl ConnectionState {
    /// Returns true when requests execute immediately instead of queuing.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_str() {
        assert_eq!(
            "ping".parse::<ConnectionTopicKind>().unwrap(),
            ConnectionTopicKind::Ping
        );
        assert_eq!(
            "pong".parse::<ConnectionTopicKind>().unwrap(),
            ConnectionTopicKind::Pong
        );
        assert!(matches!(
            "keepalive".parse::<ConnectionTopicKind>(),
            Err(ValueError::UnknownConnectionKind(_))
        ));
    }

    #[test]
    fn only_connected_is_connected() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
