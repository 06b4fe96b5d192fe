// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT transport using mockforge-mqtt.
//!
//! The mock broker accepts connections but does not route messages, so
//! these tests cover connection handling only.

#![cfg(feature = "mqtt")]

use std::sync::Arc;
use std::time::Duration;

use devlink_lib::protocol::{MqttConfig, MqttTransport};
use devlink_lib::{
    ConnectionState, DeviceSession, ProtocolError, TopicConfig, Transport, TransportEvent,
    TransportSession,
};
use mockforge_mqtt::broker::MqttConfig as BrokerConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = BrokerConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind
    sleep(Duration::from_millis(500)).await;
}

fn transport_for(port: u16) -> MqttTransport {
    MqttTransport::new(
        MqttConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .build(),
    )
}

/// Feeds transport events to the session until `done` returns true.
async fn pump_until(
    link: &TransportSession,
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    mut done: impl FnMut(&TransportEvent) -> bool,
) -> TransportEvent {
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("transport event channel closed");
        let finished = done(&event);
        link.handle_event(event.clone());
        if finished {
            return event;
        }
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

mod connection {
    use super::*;

    #[tokio::test]
    async fn session_reaches_connected() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let session = DeviceSession::new(transport_for(port));
        let mut states = session.state_changes();
        session.start(&TopicConfig::new());

        let reached = timeout(WAIT, states.wait_for(ConnectionState::is_connected)).await;
        assert!(matches!(reached, Ok(Ok(_))), "never connected");
        assert_eq!(session.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn queued_requests_drain_on_connect() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (link, mut events) = TransportSession::new(Arc::new(transport_for(port)));
        link.subscribe("device_97F4A9/pong");
        link.publish("device_97F4A9/ping", "ping");
        assert_eq!(link.pending_len(), 2);

        assert!(link.start());
        assert_eq!(link.state(), ConnectionState::Connecting);

        pump_until(&link, &mut events, |e| *e == TransportEvent::ConnAck).await;
        assert_eq!(link.state(), ConnectionState::Connected);
        assert_eq!(link.pending_len(), 0);
    }

    #[tokio::test]
    async fn unreachable_broker_reports_disconnect() {
        // Nothing listens on this port
        let port = get_test_port();

        let (link, mut events) = TransportSession::new(Arc::new(transport_for(port)));
        assert!(link.start());

        let event = pump_until(&link, &mut events, |e| {
            matches!(e, TransportEvent::Disconnected { .. })
        })
        .await;

        assert!(matches!(event, TransportEvent::Disconnected { error: Some(_) }));
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn empty_host_is_rejected() {
        let transport = MqttTransport::new(MqttConfig::builder().port(1883).build());
        let (tx, _rx) = mpsc::unbounded_channel();

        let result = transport.connect(tx);
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));

        let (link, _events) = TransportSession::new(Arc::new(transport));
        assert!(!link.start());
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn requests_before_connect_fail_not_started() {
        let transport = transport_for(get_test_port());

        let result = transport.subscribe("t1", devlink_lib::QoS::AtLeastOnce);
        assert!(matches!(result, Err(ProtocolError::NotStarted)));
    }
}
