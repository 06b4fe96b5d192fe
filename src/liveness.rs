// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ping/pong liveness handshake.
//!
//! The device only starts publishing telemetry and status after it has
//! answered a ping and received the `ready` signal, so the handshake runs
//! before any normal subscription is made:
//!
//! ```text
//!  Idle ──start_ping──► Pinging ──pong──► Answered ──stop_ping──► Idle
//!                          │                                       ▲
//!                          └──────────────stop_ping────────────────┘
//! ```
//!
//! While pinging, `ping` is published every interval, queued like any other
//! request while the broker is unreachable. There is no timeout: a device
//! that never answers is pinged until the session stops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::protocol::TransportSession;

/// Payload published periodically on the ping topic.
pub const PING_PAYLOAD: &str = "ping";

/// Payload published on the ping topic once the handshake completes.
pub const READY_PAYLOAD: &str = "ready";

/// Observable handshake phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessPhase {
    /// No handshake in progress.
    Idle,
    /// Pinging and waiting for a pong.
    Pinging,
    /// Pong received; waiting for [`LivenessCoordinator::stop_ping`].
    Answered,
}

#[derive(Debug, Clone)]
struct HandshakeTopics {
    ping: String,
    pong: String,
}

/// A running ping loop. Dropping it cancels the loop.
#[derive(Debug)]
struct LivenessSession {
    topics: HandshakeTopics,
    /// Cleared on drop; a tick already past its wait checks it before
    /// publishing.
    live: Arc<AtomicBool>,
    ticker: JoinHandle<()>,
}

impl Drop for LivenessSession {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
        self.ticker.abort();
    }
}

#[derive(Debug)]
enum LivenessState {
    Idle,
    Pinging(LivenessSession),
    Answered(HandshakeTopics),
}

/// Runs the ping/pong exchange over a [`TransportSession`].
#[derive(Debug)]
pub struct LivenessCoordinator {
    link: Arc<TransportSession>,
    interval: Duration,
    state: Mutex<LivenessState>,
}

impl LivenessCoordinator {
    /// Creates an idle coordinator pinging every `interval`.
    #[must_use]
    pub fn new(link: Arc<TransportSession>, interval: Duration) -> Self {
        Self {
            link,
            interval,
            state: Mutex::new(LivenessState::Idle),
        }
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> LivenessPhase {
        match *self.state.lock() {
            LivenessState::Idle => LivenessPhase::Idle,
            LivenessState::Pinging(_) => LivenessPhase::Pinging,
            LivenessState::Answered(_) => LivenessPhase::Answered,
        }
    }

    /// Subscribes to `pong_topic` and starts publishing pings on
    /// `ping_topic`.
    ///
    /// The first ping goes out one interval after the call. Ticks that fall
    /// while the broker connection is down are queued. Calling this while
    /// a handshake is already running restarts it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_ping(&self, ping_topic: &str, pong_topic: &str) {
        let topics = HandshakeTopics {
            ping: ping_topic.to_string(),
            pong: pong_topic.to_string(),
        };

        let mut state = self.state.lock();
        self.link.subscribe(&topics.pong);

        let live = Arc::new(AtomicBool::new(true));
        let first_tick = Instant::now() + self.interval;
        let ticker = tokio::spawn(ping_loop(
            Arc::clone(&self.link),
            topics.ping.clone(),
            Arc::clone(&live),
            first_tick,
            self.interval,
        ));
        tracing::debug!(
            ping = %topics.ping,
            pong = %topics.pong,
            interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX),
            "Liveness ping started"
        );
        // Replacing a previous session drops it, which cancels its loop.
        *state = LivenessState::Pinging(LivenessSession {
            topics,
            live,
            ticker,
        });
    }

    /// Records a pong.
    ///
    /// Stops the ping loop and returns `true` if a handshake was waiting for
    /// it. Any other pong (duplicate delivery, no handshake) returns `false`.
    pub fn on_pong(&self) -> bool {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, LivenessState::Idle) {
            LivenessState::Pinging(session) => {
                tracing::info!(pong = %session.topics.pong, "Device answered ping");
                *state = LivenessState::Answered(session.topics.clone());
                true
            }
            other => {
                tracing::debug!("Pong received with no handshake waiting");
                *state = other;
                false
            }
        }
    }

    /// Completes the handshake: stops pinging, unsubscribes from the pong
    /// topic and publishes `ready` on the ping topic.
    ///
    /// Does nothing when idle.
    pub fn stop_ping(&self) {
        let topics = match std::mem::replace(&mut *self.state.lock(), LivenessState::Idle) {
            LivenessState::Idle => return,
            LivenessState::Pinging(session) => session.topics.clone(),
            LivenessState::Answered(topics) => topics,
        };

        self.link.unsubscribe(&topics.pong);
        self.link.publish(&topics.ping, READY_PAYLOAD);
        tracing::debug!(ping = %topics.ping, "Liveness handshake completed");
    }

    /// Cancels any handshake without publishing `ready` or unsubscribing.
    pub fn cancel(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), LivenessState::Idle);
        if !matches!(previous, LivenessState::Idle) {
            tracing::debug!("Liveness handshake cancelled");
        }
    }
}

async fn ping_loop(
    link: Arc<TransportSession>,
    ping_topic: String,
    live: Arc<AtomicBool>,
    first_tick: Instant,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !link.publish_while(&ping_topic, PING_PAYLOAD, &live) {
            break;
        }
        tracing::trace!(topic = %ping_topic, "Ping sent");
    }
}
