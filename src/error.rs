//! Error taxonomy for the room and fan nodes
//!
//! Connectivity and protocol errors are recovered by the link session, decode
//! errors are recovered per message, and only sensor initialization failures
//! are fatal.

use crate::config::ConfigError;
use crate::protocol::DecodeError;
use crate::session::ConnectionState;
use crate::transport::TransportError;
use thiserror::Error;

/// Main error type for node operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Connectivity error: {message}")]
    Connectivity { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Serialization error")]
    Serialization(#[source] serde_json::Error),

    #[error("Sensor error: {message}")]
    Sensor { message: String },

    #[error("Actuator error: {message}")]
    Actuator { message: String },

    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl NodeError {
    /// Create sensor error
    pub fn sensor<S: Into<String>>(message: S) -> Self {
        Self::Sensor {
            message: message.into(),
        }
    }

    /// Create actuator error
    pub fn actuator<S: Into<String>>(message: S) -> Self {
        Self::Actuator {
            message: message.into(),
        }
    }
}

impl From<TransportError> for NodeError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Connectivity(message) => NodeError::Connectivity { message },
            TransportError::Protocol(message) => NodeError::Protocol { message },
            TransportError::NotConnected => NodeError::NotConnected {
                state: ConnectionState::Disconnected,
            },
        }
    }
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
