//! Link session: connect and reconnect lifecycle over a [`Transport`]
//!
//! The session owns its transport exclusively and is driven by the node loop
//! calling [`LinkSession::poll`] on every tick. It never gives up: failed
//! attempts schedule the next one after the reconnect delay, and a lost
//! connection is retried on the next poll.
//!
//! A new connection stays unconfirmed until the transport has been polled
//! successfully once. Losing it before that counts as a failed attempt, so a
//! broker that accepts the handshake and then refuses the subscription or
//! closes the socket is retried with backoff instead of in a tight loop.

pub mod health;

use crate::config::MqttSection;
use crate::error::{NodeError, NodeResult};
use crate::observability::metrics;
use crate::protocol::topic_matches;
use crate::transport::{InboundMessage, Transport, TransportError};
use chrono::{DateTime, Utc};
use health::{ConnectionEvent, HealthMonitor, ReconnectConfig};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Connection state owned by the link session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the session does once connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Publishes readings; inbound traffic is ignored
    Publisher,
    /// Subscribes to one topic on every entry into Connected
    Subscriber { topic: String },
}

/// Per-session counters, also mirrored into the global metrics collector
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub connect_attempts: u64,
    pub connections: u64,
    pub reconnects: u64,
    pub consecutive_failures: u32,
    pub last_connected_at: Option<DateTime<Utc>>,
    pub messages_published: u64,
    pub messages_delivered: u64,
}

/// Generate a unique client identifier: `<prefix>-<4 hex digits>`
pub fn generate_client_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..4])
}

pub struct LinkSession<T: Transport> {
    transport: T,
    node_id: String,
    role: Role,
    state: ConnectionState,
    client_id: Option<String>,
    connect_timeout: Duration,
    reconnect: ReconnectConfig,
    next_attempt_at: Option<Instant>,
    confirmed: bool,
    stats: SessionStats,
}

impl<T: Transport> LinkSession<T> {
    pub fn new(transport: T, node_id: &str, role: Role, config: &MqttSection) -> Self {
        Self {
            transport,
            node_id: node_id.to_string(),
            role,
            state: ConnectionState::Disconnected,
            client_id: None,
            connect_timeout: config.connect_timeout(),
            reconnect: ReconnectConfig::from_mqtt(config),
            next_attempt_at: None,
            confirmed: false,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Client identifier of the current or most recent session
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Whether the reconnect delay since the last failure has elapsed
    pub fn reconnect_due(&self) -> bool {
        self.next_attempt_at
            .map_or(true, |at| Instant::now() >= at)
    }

    fn apply(&mut self, event: ConnectionEvent) {
        let next = HealthMonitor::determine_next_state(&event);
        HealthMonitor::log_state_transition(self.state, next, &event);
        self.state = next;
    }

    /// Handshake with a fresh client identifier, then subscribe if needed
    ///
    /// Bounded by the configured connect timeout. On failure the session is
    /// Disconnected and the next attempt is scheduled.
    pub async fn connect(&mut self) -> NodeResult<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }

        let client_id = generate_client_id(&self.node_id);
        self.apply(ConnectionEvent::AttemptStarted(client_id.clone()));
        self.stats.connect_attempts += 1;
        metrics().mqtt_connection_attempt();

        let result = match tokio::time::timeout(self.connect_timeout, self.establish(&client_id))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(TransportError::Connectivity(format!(
                "connect timed out after {:?}",
                self.connect_timeout
            ))),
        };

        match result {
            Ok(()) => {
                if self.stats.connections > 0 {
                    self.stats.reconnects += 1;
                }
                self.stats.connections += 1;
                self.stats.last_connected_at = Some(Utc::now());
                self.client_id = Some(client_id);
                self.next_attempt_at = None;
                self.confirmed = false;
                metrics().mqtt_connection_established();
                self.apply(ConnectionEvent::Established);
                Ok(())
            }
            Err(e) => {
                // A timed out handshake may leave a half-open session behind
                if let Err(close_err) = self.transport.disconnect().await {
                    debug!("Ignoring close failure after aborted connect: {}", close_err);
                }

                self.attempt_failed(&e);
                Err(e.into())
            }
        }
    }

    /// Count a failed attempt and schedule the next one
    fn attempt_failed(&mut self, error: &TransportError) {
        self.stats.consecutive_failures = self.stats.consecutive_failures.saturating_add(1);
        let delay = self.reconnect.delay_after(self.stats.consecutive_failures);
        self.next_attempt_at = Some(Instant::now() + delay);
        metrics().mqtt_connection_failed();
        self.apply(ConnectionEvent::AttemptFailed(format!(
            "{error}; retrying in {}ms",
            delay.as_millis()
        )));
    }

    async fn establish(&mut self, client_id: &str) -> Result<(), TransportError> {
        self.transport.connect(client_id).await?;

        if let Role::Subscriber { topic } = &self.role {
            self.transport.subscribe(topic).await?;
            debug!(topic = %topic, "Subscription issued");
        }

        Ok(())
    }

    /// Publish a payload; only valid while Connected, never buffered
    pub async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> NodeResult<()> {
        if !HealthMonitor::can_publish(self.state) {
            metrics().mqtt_publish_failed();
            return Err(NodeError::NotConnected { state: self.state });
        }

        match self.transport.publish(topic, payload).await {
            Ok(()) => {
                self.stats.messages_published += 1;
                metrics().mqtt_message_published();
                Ok(())
            }
            Err(e) => {
                metrics().mqtt_publish_failed();
                self.connection_lost(&e);
                Err(e.into())
            }
        }
    }

    /// Drive the session for one tick
    ///
    /// When Connected, services the transport and returns at most one message
    /// on the subscribed topic. Otherwise attempts a reconnect once the delay
    /// has elapsed. Failures become state transitions, never errors.
    pub async fn poll(&mut self) -> Option<InboundMessage> {
        if self.state != ConnectionState::Connected {
            if self.reconnect_due() {
                // Outcome is logged and recorded by connect()
                let _ = self.connect().await;
            }
            return None;
        }

        let polled = self.transport.poll().await;
        if polled.is_ok() && !self.confirmed {
            self.confirmed = true;
            self.stats.consecutive_failures = 0;
            debug!("Connection confirmed");
        }

        match polled {
            Ok(Some(message)) => self.deliver(message),
            Ok(None) => None,
            Err(e) => {
                self.connection_lost(&e);
                None
            }
        }
    }

    fn deliver(&mut self, message: InboundMessage) -> Option<InboundMessage> {
        match &self.role {
            Role::Subscriber { topic } if topic_matches(topic, &message.topic) => {
                self.stats.messages_delivered += 1;
                metrics().mqtt_message_delivered();
                Some(message)
            }
            _ => {
                debug!(topic = %message.topic, "Ignoring message on unexpected topic");
                None
            }
        }
    }

    fn connection_lost(&mut self, error: &TransportError) {
        if self.state != ConnectionState::Connected {
            return;
        }

        if !self.confirmed {
            self.attempt_failed(error);
            return;
        }

        metrics().mqtt_connection_lost();
        // The first attempt after a drop is immediate, later ones back off
        self.next_attempt_at = None;
        self.confirmed = false;
        self.apply(ConnectionEvent::Lost(error.to_string()));
    }

    /// Close the broker session gracefully
    pub async fn disconnect(&mut self) -> NodeResult<()> {
        let result = self.transport.disconnect().await;

        if self.state == ConnectionState::Connected {
            metrics().mqtt_connection_lost();
        }
        self.next_attempt_at = None;
        self.confirmed = false;
        self.apply(ConnectionEvent::Closed);

        if let Err(e) = result {
            warn!("Transport close failed: {}", e);
            return Err(e.into());
        }
        Ok(())
    }
}
