//! Static configuration for the room and fan nodes
//!
//! Every component receives its section of [`NodeConfig`] at construction.
//! Nothing here is mutated after loading.

use crate::node::policy::ThresholdPolicy;
use crate::protocol::topics::validate_topic;
use crate::transport::mqtt::MAX_READING_TOPIC_LEN;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main node configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub network: Option<NetworkSection>,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub publisher: PublisherSection,
    #[serde(default)]
    pub thresholds: ThresholdPolicy,
}

/// Node identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeSection {
    /// Node identifier (must match [a-zA-Z0-9._-]+), used as client id prefix
    pub id: String,
}

/// Wireless network credentials, handed to the radio layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    pub ssid: String,
    /// Environment variable containing the network password
    pub password_env: Option<String>,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL, `mqtt://host[:port]`
    pub broker_url: String,
    /// Fixed topic carrying readings for this deployment
    pub topic: String,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Sustained delay between reconnection attempts
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Optional stepped backoff used before the sustained delay kicks in
    #[serde(default)]
    pub backoff_pattern_ms: Vec<u64>,
}

fn default_keep_alive() -> u64 {
    15 // PubSubClient default
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_reconnect_delay() -> u64 {
    5000
}

/// Room node publishing cadence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublisherSection {
    #[serde(default = "default_publish_interval")]
    pub interval_ms: u64,
}

fn default_publish_interval() -> u64 {
    5000
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            interval_ms: default_publish_interval(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid node ID format: {0}")]
    InvalidNodeId(String),
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl NodeConfig {
    /// Load configuration from TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: NodeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_node_id(&self.node.id)?;
        validate_topic(&self.mqtt.topic)
            .map_err(|e| ConfigError::InvalidTopic(format!("{}: {e}", self.mqtt.topic)))?;
        if self.mqtt.topic.len() > MAX_READING_TOPIC_LEN {
            return Err(ConfigError::InvalidTopic(format!(
                "topic is {} bytes, readings fit only under topics up to {} bytes",
                self.mqtt.topic.len(),
                MAX_READING_TOPIC_LEN
            )));
        }
        self.mqtt.broker_address()?;

        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.mqtt.reconnect_delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.publisher.interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "publisher.interval_ms must be greater than 0".to_string(),
            ));
        }

        self.thresholds.validate()
    }

    /// Get network password from environment variable
    pub fn get_network_password(&self) -> Option<String> {
        self.network
            .as_ref()
            .and_then(|network| network.password_env.as_ref())
            .and_then(|name| std::env::var(name).ok())
    }

    /// Publishing interval as a duration
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publisher.interval_ms)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[node]
id = "test-node"

[mqtt]
broker_url = "mqtt://localhost:1883"
topic = "sensors/test"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

impl MqttSection {
    /// Parse the broker URL into host and port
    ///
    /// Only plain `mqtt://` (or `tcp://`) brokers are accepted.
    pub fn broker_address(&self) -> Result<(String, u16), ConfigError> {
        let url = Url::parse(&self.broker_url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(self.broker_url.clone()))?;

        if !matches!(url.scheme(), "mqtt" | "tcp") {
            return Err(ConfigError::InvalidBrokerUrl(format!(
                "{}: unsupported scheme '{}'",
                self.broker_url,
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(self.broker_url.clone()))?;

        Ok((host.to_string(), url.port().unwrap_or(1883)))
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Validate node ID format
fn validate_node_id(node_id: &str) -> Result<(), ConfigError> {
    let valid_chars = node_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if node_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidNodeId(format!(
            "Node ID '{node_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
