//! Airlink - indoor air quality nodes over MQTT
//!
//! Two cooperating nodes share one broker topic:
//! - the room node samples a climate sensor and an air quality sensor, shows
//!   the AQI level on an RGB indicator and publishes each reading;
//! - the fan node subscribes to those readings and switches a fan whenever a
//!   pollutant reaches its threshold.
//!
//! Both nodes keep their broker link alive through a [`session::LinkSession`]
//! that reconnects forever with a fresh client identifier.
//!
//! # Quick Start
//!
//! ```rust
//! use airlink::node::ThresholdPolicy;
//! use airlink::protocol::{decode, encode, Reading};
//!
//! let reading = Reading {
//!     tvoc: 300,
//!     temperature: 24.5,
//!     humidity: 55.2,
//!     eco2: 900,
//!     aqi: 4,
//! };
//!
//! let bytes = encode(&reading).unwrap();
//! let payload = decode(&bytes).unwrap();
//! assert!(ThresholdPolicy::default().should_actuate(&payload));
//! ```

pub mod config;
pub mod error;
pub mod hal;
pub mod node;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod testing;
pub mod transport;

pub use config::*;
pub use error::{NodeError, NodeResult};
pub use node::{FanNode, PublisherNode};
pub use protocol::*;
pub use session::{ConnectionState, LinkSession, Role};
pub use transport::mqtt::MqttTransport;
