//! Transport layer between a node and the broker
//!
//! This module provides the transport abstraction the link session drives,
//! and the MQTT implementation used on real deployments.

use bytes::Bytes;
use thiserror::Error;

pub mod mqtt;

/// Message delivered by the broker on a subscribed topic
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Transport failures, classified the way the link session recovers from them
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// No network, broker unreachable, or link lost mid-session
    #[error("Connectivity failure: {0}")]
    Connectivity(String),
    /// Broker refused the handshake or broke protocol
    #[error("Protocol failure: {0}")]
    Protocol(String),
    /// Operation needs an established connection
    #[error("Transport not connected")]
    NotConnected,
}

/// Transport trait for broker communication
///
/// This trait provides an abstraction over the network stack so the link
/// session can be driven by MQTT in production and an in-memory broker in
/// tests. A transport holds at most one broker connection at a time.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Open a fresh broker session and wait for the handshake to complete
    async fn connect(&mut self, client_id: &str) -> Result<(), TransportError>;

    /// Close the broker session, if any
    async fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Subscribe the current session to a topic
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Queue a message for the current session; delivery happens while polling
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Drive keep-alive and outbound traffic, returning at most one inbound message
    ///
    /// An error means the session is gone and a new `connect` is required.
    async fn poll(&mut self) -> Result<Option<InboundMessage>, TransportError>;

    /// Check if transport currently holds a live session
    fn is_connected(&self) -> bool;
}
