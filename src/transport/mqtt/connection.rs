//! Pure MQTT option construction
//!
//! Builds a fresh set of rumqttc options for every connection attempt, since
//! each attempt carries a newly generated client identifier.

use crate::config::{ConfigError, MqttSection};
use crate::protocol::MAX_ENCODED_READING_LEN;
use rumqttc::MqttOptions;

/// Packet size limit in bytes, matching the firmware's MQTT buffer
pub const MAX_PACKET_SIZE: usize = 512;

/// QoS 0 PUBLISH framing: fixed header with a two byte remaining length,
/// plus the topic length prefix
const PUBLISH_OVERHEAD: usize = 5;

/// Longest topic on which a full reading still fits in one packet
pub const MAX_READING_TOPIC_LEN: usize =
    MAX_PACKET_SIZE - PUBLISH_OVERHEAD - MAX_ENCODED_READING_LEN;

/// Capacity of the rumqttc request channel between client and event loop
pub const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Pure function to configure MQTT options from config
pub fn configure_mqtt_options(
    client_id: &str,
    config: &MqttSection,
) -> Result<MqttOptions, ConfigError> {
    let (host, port) = config.broker_address()?;

    let mut mqtt_options = MqttOptions::new(client_id, host, port);
    mqtt_options
        .set_keep_alive(config.keep_alive())
        .set_clean_session(true)
        .set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);

    Ok(mqtt_options)
}
