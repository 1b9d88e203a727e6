//! Room node to fan node over the in-memory broker

use airlink::config::NodeConfig;
use airlink::error::NodeError;
use airlink::node::{CycleOutcome, FanNode, PublisherNode, Rgb};
use airlink::protocol::DecodeError;
use airlink::testing::mocks::{MockBroker, MockTransport, RecordingActuator, ScriptedSensor};
use bytes::Bytes;
use std::time::Duration;

const TOPIC: &str = "sensors/bedroom";

fn config(node_id: &str) -> NodeConfig {
    NodeConfig::from_toml_str(&format!(
        r#"
[node]
id = "{node_id}"

[mqtt]
broker_url = "mqtt://localhost:1883"
topic = "{TOPIC}"
reconnect_delay_ms = 2000

[publisher]
interval_ms = 5000
"#
    ))
    .unwrap()
}

fn fan_node(broker: &MockBroker) -> FanNode<MockTransport, RecordingActuator> {
    FanNode::new(&config("fan-1"), broker.transport(), RecordingActuator::new())
}

fn room_node(
    broker: &MockBroker,
    sensor: ScriptedSensor,
) -> PublisherNode<MockTransport, ScriptedSensor, RecordingActuator> {
    PublisherNode::new(
        &config("bedroom-1"),
        broker.transport(),
        sensor,
        RecordingActuator::new(),
    )
}

/// Fan node started and subscribed
async fn ready_fan(broker: &MockBroker) -> FanNode<MockTransport, RecordingActuator> {
    let mut fan = fan_node(broker);
    fan.start().unwrap();
    assert!(fan.tick().await.is_none());
    assert_eq!(broker.subscriber_count(TOPIC).await, 1);
    fan
}

#[tokio::test(start_paused = true)]
async fn test_polluted_then_clean_switches_fan_on_then_off() {
    let broker = MockBroker::new();
    let mut fan = ready_fan(&broker).await;

    let mut room = room_node(&broker, ScriptedSensor::repeating(50, 450, 1).then(300, 900, 4));
    room.start().unwrap();

    assert!(matches!(room.tick().await, Some(CycleOutcome::Published(_))));
    assert!(matches!(fan.tick().await, Some(Ok(true))));
    assert_eq!(fan.fan_state(), Some(true));

    tokio::time::advance(Duration::from_millis(5000)).await;
    assert!(matches!(room.tick().await, Some(CycleOutcome::Published(_))));
    assert!(matches!(fan.tick().await, Some(Ok(false))));

    assert_eq!(fan.sink().outputs, vec![false, true, false]);
    assert_eq!(
        room.indicator().colors,
        vec![Rgb::new(255, 60, 0), Rgb::new(0, 0, 255)]
    );

    let published = broker.published().await;
    assert_eq!(
        published[0].1,
        br#"{"tvoc":300,"temperature":24.5,"humidity":55.2,"eco2":900,"aqi":4}"#.to_vec()
    );
}

#[tokio::test(start_paused = true)]
async fn test_partial_payload_never_switches_fan_on() {
    let broker = MockBroker::new();
    let mut fan = ready_fan(&broker).await;

    broker
        .inject(TOPIC, Bytes::from_static(br#"{"tvoc":50}"#))
        .await;
    assert!(matches!(fan.tick().await, Some(Ok(false))));

    broker
        .inject(TOPIC, Bytes::from_static(br#"{"tvoc":"high","eco2":null}"#))
        .await;
    assert!(matches!(fan.tick().await, Some(Ok(false))));
    assert_eq!(fan.fan_state(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_leaves_fan_unchanged() {
    let broker = MockBroker::new();
    let mut fan = ready_fan(&broker).await;

    broker
        .inject(TOPIC, Bytes::from_static(br#"{"aqi":5}"#))
        .await;
    assert!(matches!(fan.tick().await, Some(Ok(true))));

    broker
        .inject(TOPIC, Bytes::from_static(b"{not json"))
        .await;
    assert!(matches!(
        fan.tick().await,
        Some(Err(NodeError::Decode(DecodeError::Malformed(_))))
    ));
    assert_eq!(fan.fan_state(), Some(true));

    // The loop keeps going after a bad message
    broker
        .inject(TOPIC, Bytes::from_static(br#"{"aqi":1}"#))
        .await;
    assert!(matches!(fan.tick().await, Some(Ok(false))));
}

#[tokio::test(start_paused = true)]
async fn test_delivery_resumes_after_broker_drop() {
    let broker = MockBroker::new();
    let mut fan = ready_fan(&broker).await;
    let mut room = room_node(&broker, ScriptedSensor::repeating(300, 900, 4));
    room.start().unwrap();

    assert!(matches!(room.tick().await, Some(CycleOutcome::Published(_))));
    assert!(matches!(fan.tick().await, Some(Ok(true))));
    assert!(room.tick().await.is_none());

    broker.drop_all_connections().await;
    assert!(fan.tick().await.is_none());
    assert!(fan.tick().await.is_none());
    assert_eq!(broker.subscriber_count(TOPIC).await, 1);

    tokio::time::advance(Duration::from_millis(5000)).await;
    assert!(matches!(room.tick().await, Some(CycleOutcome::Published(_))));
    assert!(matches!(fan.tick().await, Some(Ok(true))));
    assert_eq!(room.session().stats().reconnects, 1);
}

#[tokio::test(start_paused = true)]
async fn test_room_run_loop_publishes_on_interval() {
    let broker = MockBroker::new();
    let mut room = room_node(&broker, ScriptedSensor::repeating(50, 450, 1));
    room.start().unwrap();

    room.run(
        tokio::time::sleep(Duration::from_millis(12_000)),
        Duration::from_millis(50),
    )
    .await
    .unwrap();

    // Cycles at 0s, 5s and 10s
    assert_eq!(broker.published().await.len(), 3);
    assert_eq!(room.indicator().colors.len(), 3);
}
