//! Impure I/O operations for the MQTT transport
//!
//! This module owns the rumqttc client and event loop for the current broker
//! session. A new pair is created on every `connect`, so a reconnect always
//! starts from a clean session with the caller's new client identifier.
//!
//! `connect` returns once the broker sends its ConnAck, and `subscribe` once
//! the SubAck arrives, so a refused subscription fails the connection attempt.

use super::connection::{configure_mqtt_options, REQUEST_CHANNEL_CAPACITY};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::{ConfigError, MqttSection};
use crate::transport::{InboundMessage, Transport, TransportError};
use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a single `poll` waits for network activity before returning idle
pub const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Upper bound on flushing the DISCONNECT packet during a graceful close
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// MQTT transport backed by rumqttc
pub struct MqttTransport {
    config: MqttSection,
    client: Option<AsyncClient>,
    event_loop: Option<EventLoop>,
    /// Messages that arrived while waiting for a SubAck
    pending: VecDeque<InboundMessage>,
}

impl MqttTransport {
    pub fn new(config: MqttSection) -> Result<Self, ConfigError> {
        // Fail on a bad broker URL at construction rather than on first connect
        config.broker_address()?;

        Ok(Self {
            config,
            client: None,
            event_loop: None,
            pending: VecDeque::new(),
        })
    }

    fn drop_session(&mut self) {
        self.client = None;
        self.event_loop = None;
        self.pending.clear();
    }

    fn client(&self) -> Result<&AsyncClient, TransportError> {
        self.client.as_ref().ok_or(TransportError::NotConnected)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self, client_id: &str) -> Result<(), TransportError> {
        self.drop_session();

        let options = configure_mqtt_options(client_id, &self.config)
            .map_err(|e| TransportError::Protocol(e.to_string()))?;
        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        // The first poll opens the socket and performs the handshake
        loop {
            let event = event_loop
                .poll()
                .await
                .map_err(MessageHandler::classify_connection_error)?;

            match MessageHandler::route_mqtt_event(&event) {
                EventRoute::ConnectionAcknowledged => break,
                route => debug!(target: "mqtt_transport", "Pre-ConnAck event: {:?}", route),
            }
        }

        info!(target: "mqtt_transport", client_id, "MQTT session established");
        self.client = Some(client);
        self.event_loop = Some(event_loop);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        if let Err(e) = client.try_disconnect() {
            warn!(target: "mqtt_transport", "Failed to queue DISCONNECT: {}", e);
        } else if let Some(event_loop) = self.event_loop.as_mut() {
            // Drive the loop until the DISCONNECT is written and the socket closes
            let _ = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
                while event_loop.poll().await.is_ok() {}
            })
            .await;
        }

        self.drop_session();
        info!(target: "mqtt_transport", "MQTT session closed");
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.client()?
            .try_subscribe(topic, MessageHandler::reading_qos())
            .map_err(|e| TransportError::Connectivity(e.to_string()))?;

        let event_loop = self
            .event_loop
            .as_mut()
            .ok_or(TransportError::NotConnected)?;

        loop {
            let event = match event_loop.poll().await {
                Ok(event) => event,
                Err(e) => {
                    self.drop_session();
                    return Err(MessageHandler::classify_connection_error(e));
                }
            };

            match MessageHandler::route_mqtt_event(&event) {
                EventRoute::SubscriptionConfirmed {
                    packet_id,
                    granted: true,
                } => {
                    debug!(target: "mqtt_transport", packet_id, topic, "Subscription confirmed");
                    return Ok(());
                }
                EventRoute::SubscriptionConfirmed {
                    packet_id,
                    granted: false,
                } => {
                    self.drop_session();
                    return Err(TransportError::Protocol(format!(
                        "subscription {packet_id} to {topic} refused by broker"
                    )));
                }
                EventRoute::Disconnected => {
                    self.drop_session();
                    return Err(TransportError::Connectivity(
                        "broker closed the session".to_string(),
                    ));
                }
                EventRoute::MessageReceived { topic, payload } => {
                    self.pending.push_back(InboundMessage { topic, payload });
                }
                route => debug!(target: "mqtt_transport", "Pre-SubAck event: {:?}", route),
            }
        }
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client()?
            .try_publish(topic, MessageHandler::reading_qos(), false, payload)
            .map_err(|e| TransportError::Connectivity(e.to_string()))
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }

        let event_loop = self
            .event_loop
            .as_mut()
            .ok_or(TransportError::NotConnected)?;

        let event = match tokio::time::timeout(POLL_TIMEOUT, event_loop.poll()).await {
            Err(_) => return Ok(None),
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                self.drop_session();
                return Err(MessageHandler::classify_connection_error(e));
            }
        };

        let route = MessageHandler::route_mqtt_event(&event);
        if MessageHandler::is_noise(&route) {
            return Ok(None);
        }

        match route {
            EventRoute::MessageReceived { topic, payload } => {
                Ok(Some(InboundMessage { topic, payload }))
            }
            EventRoute::Disconnected => {
                self.drop_session();
                Err(TransportError::Connectivity(
                    "broker closed the session".to_string(),
                ))
            }
            EventRoute::SubscriptionConfirmed {
                packet_id,
                granted: false,
            } => {
                self.drop_session();
                Err(TransportError::Protocol(format!(
                    "subscription {packet_id} refused by broker"
                )))
            }
            EventRoute::SubscriptionConfirmed { packet_id, .. } => {
                debug!(target: "mqtt_transport", packet_id, "Subscription confirmed");
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn is_connected(&self) -> bool {
        self.event_loop.is_some()
    }
}
