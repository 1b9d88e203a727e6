//! Mock implementations for testing
//!
//! Provides an in-memory broker with transports that can be dropped, refused
//! or stalled on demand, plus scripted sensors and a recording actuator, so
//! both nodes can be tested end to end without a broker or hardware.

use crate::error::{NodeError, NodeResult};
use crate::hal::{ActuatorSink, AirQualitySample, ClimateSample, SensorSource};
use crate::node::policy::Rgb;
use crate::protocol::topic_matches;
use crate::transport::{InboundMessage, Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

pub type PublishedMessage = (String, Vec<u8>);

#[derive(Debug, Default)]
struct BrokerSession {
    subscriptions: Vec<String>,
    inbox: VecDeque<InboundMessage>,
    /// Subscription refusal waiting to be reported on the next poll
    refused: Option<String>,
}

#[derive(Debug, Default)]
struct BrokerState {
    sessions: HashMap<u64, BrokerSession>,
    client_ids: Vec<String>,
    connect_attempts: u64,
    fail_connects: u32,
    hang_connects: u32,
    fail_subscribes: u32,
    refuse_subscribes: u32,
    published: Vec<PublishedMessage>,
}

impl BrokerState {
    fn route(&mut self, topic: &str, payload: &Bytes) {
        for session in self.sessions.values_mut() {
            if session
                .subscriptions
                .iter()
                .any(|subscribed| topic_matches(subscribed, topic))
            {
                session.inbox.push_back(InboundMessage {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                });
            }
        }
    }
}

/// In-memory broker shared by any number of [`MockTransport`]s
#[derive(Debug, Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
    next_endpoint: Arc<AtomicU64>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// New transport endpoint attached to this broker
    pub fn transport(&self) -> MockTransport {
        let endpoint = self.next_endpoint.fetch_add(1, Ordering::Relaxed);

        MockTransport {
            broker: self.clone(),
            endpoint,
            connected: false,
        }
    }

    /// Refuse the next connection attempt
    pub async fn fail_next_connect(&self) {
        self.state.lock().await.fail_connects += 1;
    }

    /// Never answer the next connection attempt
    pub async fn hang_next_connect(&self) {
        self.state.lock().await.hang_connects += 1;
    }

    /// Refuse the next subscription
    pub async fn fail_next_subscribe(&self) {
        self.state.lock().await.fail_subscribes += 1;
    }

    /// Accept the next `count` subscribe requests, then refuse each one on
    /// the following poll, the way a broker answers with a failed SubAck
    pub async fn refuse_subscriptions_on_ack(&self, count: u32) {
        self.state.lock().await.refuse_subscribes += count;
    }

    /// Drop every live session, as a broker restart or network loss would
    pub async fn drop_all_connections(&self) {
        self.state.lock().await.sessions.clear();
    }

    /// Publish from outside any node, as another client would
    pub async fn inject(&self, topic: &str, payload: Bytes) {
        self.state.lock().await.route(topic, &payload);
    }

    /// Everything published by transports, in order
    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().await.published.clone()
    }

    pub async fn connect_attempts(&self) -> u64 {
        self.state.lock().await.connect_attempts
    }

    /// Client identifiers of every accepted connection, in order
    pub async fn client_ids(&self) -> Vec<String> {
        self.state.lock().await.client_ids.clone()
    }

    /// Live sessions currently subscribed to `topic`
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .await
            .sessions
            .values()
            .filter(|session| session.subscriptions.iter().any(|s| s == topic))
            .count()
    }
}

/// Transport endpoint on a [`MockBroker`]
#[derive(Debug)]
pub struct MockTransport {
    broker: MockBroker,
    endpoint: u64,
    connected: bool,
}

impl MockTransport {
    /// Detect a session the broker dropped behind our back
    fn lost(&mut self) -> TransportError {
        if self.connected {
            self.connected = false;
            TransportError::Connectivity("connection reset by broker".to_string())
        } else {
            TransportError::NotConnected
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, client_id: &str) -> Result<(), TransportError> {
        self.connected = false;

        let hang = {
            let mut state = self.broker.state.lock().await;
            state.sessions.remove(&self.endpoint);
            state.connect_attempts += 1;

            if state.fail_connects > 0 {
                state.fail_connects -= 1;
                return Err(TransportError::Connectivity(
                    "connection refused".to_string(),
                ));
            }

            if state.hang_connects > 0 {
                state.hang_connects -= 1;
                true
            } else {
                state.client_ids.push(client_id.to_string());
                state
                    .sessions
                    .insert(self.endpoint, BrokerSession::default());
                false
            }
        };

        if hang {
            std::future::pending::<()>().await;
        }

        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.broker
            .state
            .lock()
            .await
            .sessions
            .remove(&self.endpoint);
        self.connected = false;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let mut state = self.broker.state.lock().await;

        if state.fail_subscribes > 0 {
            state.fail_subscribes -= 1;
            return Err(TransportError::Protocol(format!(
                "subscription to {topic} refused"
            )));
        }

        let refuse = state.refuse_subscribes > 0;
        let subscribed = match state.sessions.get_mut(&self.endpoint) {
            Some(session) if refuse => {
                session.refused = Some(topic.to_string());
                true
            }
            Some(session) => {
                session.subscriptions.push(topic.to_string());
                true
            }
            None => false,
        };
        if refuse && subscribed {
            state.refuse_subscribes -= 1;
        }
        drop(state);

        if subscribed {
            Ok(())
        } else {
            Err(self.lost())
        }
    }

    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        {
            let mut state = self.broker.state.lock().await;

            if state.sessions.contains_key(&self.endpoint) {
                let bytes = Bytes::from(payload.clone());
                state.published.push((topic.to_string(), payload));
                state.route(topic, &bytes);
                return Ok(());
            }
        }

        Err(self.lost())
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        let mut state = self.broker.state.lock().await;

        let refused = state
            .sessions
            .get_mut(&self.endpoint)
            .and_then(|session| session.refused.take());
        if let Some(topic) = refused {
            state.sessions.remove(&self.endpoint);
            drop(state);
            self.connected = false;
            return Err(TransportError::Protocol(format!(
                "subscription to {topic} refused by broker"
            )));
        }

        let delivered = state
            .sessions
            .get_mut(&self.endpoint)
            .map(|session| session.inbox.pop_front());
        drop(state);

        delivered.ok_or_else(|| self.lost())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Sensor returning scripted samples
#[derive(Debug)]
pub struct ScriptedSensor {
    script: VecDeque<AirQualitySample>,
    fallback: AirQualitySample,
    climate: ClimateSample,
    fail_init: bool,
    fail_reads: u32,
    /// Climate samples passed in as air quality calibration, in order
    pub calibrations: Vec<ClimateSample>,
}

impl ScriptedSensor {
    /// Sensor returning the same air quality values on every read
    pub fn repeating(tvoc: i32, eco2: i32, aqi: i32) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: AirQualitySample {
                status: 0,
                aqi,
                tvoc,
                eco2,
            },
            climate: ClimateSample {
                temperature: 24.5,
                humidity: 55.2,
            },
            fail_init: false,
            fail_reads: 0,
            calibrations: Vec::new(),
        }
    }

    /// Sensor whose initialization fails
    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::repeating(0, 0, 0)
        }
    }

    /// Queue a sample returned before falling back to the repeating one
    pub fn then(mut self, tvoc: i32, eco2: i32, aqi: i32) -> Self {
        self.script.push_back(AirQualitySample {
            status: 0,
            aqi,
            tvoc,
            eco2,
        });
        self
    }

    pub fn fail_next_read(&mut self) {
        self.fail_reads += 1;
    }
}

impl SensorSource for ScriptedSensor {
    fn init(&mut self) -> NodeResult<()> {
        if self.fail_init {
            return Err(NodeError::sensor("climate sensor not found"));
        }
        Ok(())
    }

    fn sample_climate(&mut self) -> NodeResult<ClimateSample> {
        if self.fail_reads > 0 {
            self.fail_reads -= 1;
            return Err(NodeError::sensor("climate sensor read timed out"));
        }
        Ok(self.climate)
    }

    fn sample_air_quality(&mut self, calibration: &ClimateSample) -> NodeResult<AirQualitySample> {
        self.calibrations.push(*calibration);
        Ok(self.script.pop_front().unwrap_or(self.fallback))
    }
}

/// Actuator recording every successful write
#[derive(Debug, Default)]
pub struct RecordingActuator {
    pub outputs: Vec<bool>,
    pub colors: Vec<Rgb>,
    fail_writes: u32,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_write(&mut self) {
        self.fail_writes += 1;
    }

    fn check(&mut self) -> NodeResult<()> {
        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(NodeError::actuator("output write failed"));
        }
        Ok(())
    }
}

impl ActuatorSink for RecordingActuator {
    fn set_digital_output(&mut self, on: bool) -> NodeResult<()> {
        self.check()?;
        self.outputs.push(on);
        Ok(())
    }

    fn set_color(&mut self, color: Rgb) -> NodeResult<()> {
        self.check()?;
        self.colors.push(color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broker_routes_between_transports() {
        let broker = MockBroker::new();
        let mut publisher = broker.transport();
        let mut subscriber = broker.transport();

        publisher.connect("room-0001").await.unwrap();
        subscriber.connect("fan-0002").await.unwrap();
        subscriber.subscribe("sensors/test").await.unwrap();

        publisher
            .publish("sensors/test", b"{\"aqi\":1}".to_vec())
            .await
            .unwrap();
        publisher
            .publish("sensors/other", b"{}".to_vec())
            .await
            .unwrap();

        let message = subscriber.poll().await.unwrap().unwrap();
        assert_eq!(message.topic, "sensors/test");
        assert!(subscriber.poll().await.unwrap().is_none());
        assert_eq!(broker.published().await.len(), 2);
        assert_eq!(broker.client_ids().await, vec!["room-0001", "fan-0002"]);
    }

    #[tokio::test]
    async fn test_dropped_session_surfaces_once() {
        let broker = MockBroker::new();
        let mut transport = broker.transport();
        transport.connect("node-0001").await.unwrap();

        broker.drop_all_connections().await;

        assert!(matches!(
            transport.poll().await,
            Err(TransportError::Connectivity(_))
        ));
        assert!(!transport.is_connected());
        assert_eq!(transport.poll().await, Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_subscription_refused_on_ack() {
        let broker = MockBroker::new();
        broker.refuse_subscriptions_on_ack(1).await;
        let mut transport = broker.transport();
        transport.connect("fan-0001").await.unwrap();

        assert!(transport.subscribe("sensors/test").await.is_ok());
        assert_eq!(broker.subscriber_count("sensors/test").await, 0);
        assert!(matches!(
            transport.poll().await,
            Err(TransportError::Protocol(_))
        ));
        assert!(!transport.is_connected());

        transport.connect("fan-0002").await.unwrap();
        transport.subscribe("sensors/test").await.unwrap();
        assert_eq!(transport.poll().await, Ok(None));
        assert_eq!(broker.subscriber_count("sensors/test").await, 1);
    }

    #[tokio::test]
    async fn test_failed_connect() {
        let broker = MockBroker::new();
        broker.fail_next_connect().await;
        let mut transport = broker.transport();

        assert!(transport.connect("node-0001").await.is_err());
        assert!(transport.connect("node-0002").await.is_ok());
        assert_eq!(broker.connect_attempts().await, 2);
    }

    #[test]
    fn test_scripted_sensor_sequence() {
        let mut sensor = ScriptedSensor::repeating(50, 450, 1).then(300, 900, 4);
        sensor.init().unwrap();

        let climate = sensor.sample_climate().unwrap();
        assert_eq!(sensor.sample_air_quality(&climate).unwrap().aqi, 4);
        assert_eq!(sensor.sample_air_quality(&climate).unwrap().aqi, 1);
        assert_eq!(sensor.calibrations.len(), 2);
    }
}
