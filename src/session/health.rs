//! Pure state transition and reconnection logic for the link session
//!
//! This module contains pure functions for deciding connection state after
//! session events and for computing the delay before the next attempt.

use super::ConnectionState;
use crate::config::MqttSection;
use std::time::Duration;
use tracing::{error, info, warn};

/// Reconnection timing: an optional stepped pattern, then a sustained delay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delays in milliseconds for the first failed attempts
    pub backoff_pattern: Vec<u64>,
    /// Delay to use after pattern is exhausted
    pub sustained_delay: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_pattern: Vec::new(),
            sustained_delay: 5000,
        }
    }
}

impl ReconnectConfig {
    pub fn from_mqtt(config: &MqttSection) -> Self {
        Self {
            backoff_pattern: config.backoff_pattern_ms.clone(),
            sustained_delay: config.reconnect_delay_ms,
        }
    }

    /// Calculate backoff delay after the given number of consecutive failures
    pub fn calculate_backoff_delay(&self, failures: u32) -> u64 {
        let index = failures.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .copied()
            .unwrap_or(self.sustained_delay)
    }

    pub fn delay_after(&self, failures: u32) -> Duration {
        Duration::from_millis(self.calculate_backoff_delay(failures))
    }
}

/// Session events that trigger state transitions
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Handshake started with a fresh client identifier
    AttemptStarted(String),
    /// Handshake (and subscription, if any) completed
    Established,
    /// Handshake failed, timed out, or subscription was refused
    AttemptFailed(String),
    /// Live session dropped by the broker or the network
    Lost(String),
    /// Session closed locally
    Closed,
}

/// Pure state machine decisions for the link session
pub struct HealthMonitor;

impl HealthMonitor {
    /// Determine next state after connection event (pure function)
    pub fn determine_next_state(event: &ConnectionEvent) -> ConnectionState {
        match event {
            ConnectionEvent::AttemptStarted(_) => ConnectionState::Connecting,
            ConnectionEvent::Established => ConnectionState::Connected,
            ConnectionEvent::AttemptFailed(_)
            | ConnectionEvent::Lost(_)
            | ConnectionEvent::Closed => ConnectionState::Disconnected,
        }
    }

    /// Check if connection state allows publishing (pure function)
    pub fn can_publish(state: ConnectionState) -> bool {
        matches!(state, ConnectionState::Connected)
    }

    /// Log connection state transition
    pub fn log_state_transition(
        from: ConnectionState,
        to: ConnectionState,
        event: &ConnectionEvent,
    ) {
        match (from, to, event) {
            (_, ConnectionState::Connecting, ConnectionEvent::AttemptStarted(client_id)) => {
                info!(client_id = %client_id, "Attempting MQTT connection");
            }
            (ConnectionState::Connecting, ConnectionState::Connected, _) => {
                info!("MQTT connection established");
            }
            (_, ConnectionState::Disconnected, ConnectionEvent::AttemptFailed(reason)) => {
                warn!(reason = %reason, "MQTT connection attempt failed");
            }
            (ConnectionState::Connected, ConnectionState::Disconnected, ConnectionEvent::Lost(reason)) => {
                error!(reason = %reason, "MQTT connection lost");
            }
            (_, ConnectionState::Disconnected, ConnectionEvent::Closed) => {
                info!("MQTT connection closed");
            }
            _ => {
                info!("MQTT connection state: {:?} -> {:?}", from, to);
            }
        }
    }
}
