//! Pure routing of rumqttc events and errors
//!
//! This module contains pure functions that turn rumqttc events into routing
//! decisions and rumqttc failures into [`TransportError`]s.

use crate::transport::TransportError;
use rumqttc::{ConnectionError, Event, Packet, QoS, SubscribeReasonCode};
use tracing::debug;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => match incoming {
                Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                Packet::Publish(publish) => EventRoute::MessageReceived {
                    topic: publish.topic.clone(),
                    payload: publish.payload.clone(),
                },
                Packet::Disconnect => EventRoute::Disconnected,
                Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                    packet_id: suback.pkid,
                    granted: suback
                        .return_codes
                        .iter()
                        .all(|code| matches!(code, SubscribeReasonCode::Success(_))),
                },
                other => EventRoute::InfrastructureEvent(format!("{other:?}")),
            },
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Classify an event loop failure (pure function)
    ///
    /// Refused or out-of-order handshakes are protocol errors; everything else
    /// means the link itself is gone.
    pub fn classify_connection_error(error: ConnectionError) -> TransportError {
        match error {
            ConnectionError::ConnectionRefused(code) => {
                TransportError::Protocol(format!("connection refused: {code:?}"))
            }
            ConnectionError::NotConnAck(packet) => {
                TransportError::Protocol(format!("expected ConnAck, got {packet:?}"))
            }
            other => TransportError::Connectivity(other.to_string()),
        }
    }

    /// QoS used for readings and the reading subscription
    ///
    /// Readings are periodic and superseded by the next one, so at-most-once
    /// delivery is enough.
    pub fn reading_qos() -> QoS {
        QoS::AtMostOnce
    }

    /// Log and filter events that carry nothing for the session (pure function)
    pub fn is_noise(route: &EventRoute) -> bool {
        match route {
            EventRoute::InfrastructureEvent(event) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event);
                true
            }
            EventRoute::OutgoingEvent => true,
            _ => false,
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on subscribed topic
    MessageReceived { topic: String, payload: bytes::Bytes },
    /// MQTT broker disconnected
    Disconnected,
    /// Subscription confirmed; `granted` is false if the broker refused any filter
    SubscriptionConfirmed { packet_id: u16, granted: bool },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}
