//! MQTT transport for the room and fan nodes
//!
//! This module separates pure functions from I/O operations:
//!
//! - [`connection`] - Pure option construction from configuration
//! - [`message_handler`] - Pure event routing and error classification
//! - [`client`] - Impure I/O operations around the rumqttc event loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use airlink::config::MqttSection;
//! use airlink::transport::{mqtt::MqttTransport, Transport};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MqttSection {
//!     broker_url: "mqtt://localhost:1883".to_string(),
//!     topic: "sensors/bedroom".to_string(),
//!     keep_alive_secs: 15,
//!     connect_timeout_secs: 10,
//!     reconnect_delay_ms: 5000,
//!     backoff_pattern_ms: Vec::new(),
//! };
//!
//! let mut transport = MqttTransport::new(config)?;
//! transport.connect("bedroom-1-a3f0").await?;
//! transport.subscribe("sensors/bedroom").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttTransport;
pub use connection::{configure_mqtt_options, MAX_PACKET_SIZE, MAX_READING_TOPIC_LEN};
pub use message_handler::{EventRoute, MessageHandler};
