// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT delivery guarantee.

/// Delivery guarantee for publish and subscribe requests.
///
/// The session always uses [`QoS::AtLeastOnce`]: acknowledged delivery,
/// duplicates possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce,
    /// Acknowledged delivery.
    #[default]
    AtLeastOnce,
    /// Four-way handshake delivery.
    ExactlyOnce,
}

#[cfg(feature = "mqtt")]
impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => Self::AtMostOnce,
            QoS::AtLeastOnce => Self::AtLeastOnce,
            QoS::ExactlyOnce => Self::ExactlyOnce,
        }
    }
}

#[cfg(all(test, feature = "mqtt"))]
mod tests {
    use super::*;

    #[test]
    fn default_maps_to_at_least_once() {
        assert_eq!(rumqttc::QoS::from(QoS::default()), rumqttc::QoS::AtLeastOnce);
    }
}
