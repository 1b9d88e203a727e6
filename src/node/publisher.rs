//! Room node: sample, publish and show air quality on a fixed interval

use crate::config::NodeConfig;
use crate::cycle_span;
use crate::error::{NodeError, NodeResult};
use crate::hal::{combine, ActuatorSink, SensorSource};
use crate::node::policy::indicator_color;
use crate::observability::metrics;
use crate::protocol::{encode, Reading};
use crate::session::{ConnectionState, LinkSession, Role};
use crate::transport::Transport;
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn, Instrument};

/// Result of one publish cycle
#[derive(Debug)]
pub enum CycleOutcome {
    /// Reading sent to the broker and shown on the indicator
    Published(Reading),
    /// Reading shown on the indicator but not sent
    PublishFailed { reading: Reading, error: NodeError },
    /// Sensor read failed; nothing sent, indicator untouched
    SensorFailed(NodeError),
}

pub struct PublisherNode<T: Transport, S: SensorSource, A: ActuatorSink> {
    session: LinkSession<T>,
    sensor: S,
    indicator: A,
    topic: String,
    interval: Duration,
    last_cycle_at: Option<Instant>,
    cycles: u64,
}

impl<T: Transport, S: SensorSource, A: ActuatorSink> PublisherNode<T, S, A> {
    pub fn new(config: &NodeConfig, transport: T, sensor: S, indicator: A) -> Self {
        Self {
            session: LinkSession::new(transport, &config.node.id, Role::Publisher, &config.mqtt),
            sensor,
            indicator,
            topic: config.mqtt.topic.clone(),
            interval: config.publish_interval(),
            last_cycle_at: None,
            cycles: 0,
        }
    }

    pub fn session(&self) -> &LinkSession<T> {
        &self.session
    }

    pub fn indicator(&self) -> &A {
        &self.indicator
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    /// Initialize the sensors; a failure here is fatal
    pub fn start(&mut self) -> NodeResult<()> {
        self.sensor.init().map_err(|e| {
            error!(error = %e, "Sensor initialization failed");
            e
        })?;
        info!(topic = %self.topic, interval_ms = self.interval.as_millis() as u64, "Room node started");
        Ok(())
    }

    fn cycle_due(&self) -> bool {
        self.last_cycle_at
            .map_or(true, |at| at.elapsed() >= self.interval)
    }

    /// One loop iteration: service the session, then publish if the interval elapsed
    pub async fn tick(&mut self) -> Option<CycleOutcome> {
        // Inbound traffic is not expected on the publisher side
        if let Some(message) = self.session.poll().await {
            debug!(topic = %message.topic, "Dropping inbound message");
        }

        if self.cycle_due() {
            Some(self.run_cycle().await)
        } else {
            None
        }
    }

    /// Sample, encode, publish and update the indicator
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.last_cycle_at = Some(Instant::now());
        self.cycles += 1;
        let span = cycle_span!(cycle = self.cycles);

        async {
            let started = Instant::now();

            if self.session.state() != ConnectionState::Connected && self.session.reconnect_due() {
                // Failure is recorded by the session; the cycle still runs locally
                let _ = self.session.connect().await;
            }

            let reading = match self.sample() {
                Ok(reading) => reading,
                Err(e) => {
                    warn!(error = %e, "Sensor read failed, skipping cycle");
                    metrics().sensor_failed();
                    return CycleOutcome::SensorFailed(e);
                }
            };

            let published = match encode(&reading) {
                Ok(payload) => self.session.publish(&self.topic, payload).await,
                Err(e) => Err(NodeError::Serialization(e)),
            };

            self.update_indicator(reading.aqi);
            metrics().cycle_completed(started.elapsed());

            match published {
                Ok(()) => {
                    info!(
                        tvoc = reading.tvoc,
                        eco2 = reading.eco2,
                        aqi = reading.aqi,
                        temperature = reading.temperature,
                        humidity = reading.humidity,
                        "Reading published"
                    );
                    CycleOutcome::Published(reading)
                }
                Err(error) => {
                    warn!(error = %error, "Reading not published");
                    CycleOutcome::PublishFailed { reading, error }
                }
            }
        }
        .instrument(span)
        .await
    }

    fn sample(&mut self) -> NodeResult<Reading> {
        let climate = self.sensor.sample_climate()?;
        let air = self.sensor.sample_air_quality(&climate)?;
        debug!(status = air.status, "Air quality sensor status");
        Ok(combine(&climate, &air))
    }

    fn update_indicator(&mut self, aqi: i32) {
        match self.indicator.set_color(indicator_color(aqi)) {
            Ok(()) => metrics().indicator_updated(),
            Err(e) => {
                warn!(error = %e, aqi, "Indicator update failed");
                metrics().actuator_failed();
            }
        }
    }

    /// Run until `shutdown` resolves, then close the session
    pub async fn run<F>(&mut self, shutdown: F, tick: Duration) -> NodeResult<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!(cycles = self.cycles, "Room node stopping");
        self.session.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::policy::Rgb;
    use crate::testing::mocks::{MockBroker, RecordingActuator, ScriptedSensor};

    fn node(
        broker: &MockBroker,
        sensor: ScriptedSensor,
    ) -> PublisherNode<crate::testing::mocks::MockTransport, ScriptedSensor, RecordingActuator>
    {
        let mut config = NodeConfig::test_config();
        config.publisher.interval_ms = 5000;
        PublisherNode::new(&config, broker.transport(), sensor, RecordingActuator::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_publishes() {
        let broker = MockBroker::new();
        let mut node = node(&broker, ScriptedSensor::repeating(300, 900, 4));
        node.start().unwrap();

        let outcome = node.tick().await;
        assert!(matches!(outcome, Some(CycleOutcome::Published(r)) if r.aqi == 4));

        let published = broker.published().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "sensors/test");
        assert_eq!(node.indicator().colors, vec![Rgb::new(255, 60, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_is_respected() {
        let broker = MockBroker::new();
        let mut node = node(&broker, ScriptedSensor::repeating(50, 450, 1));
        node.start().unwrap();

        assert!(node.tick().await.is_some());

        tokio::time::advance(Duration::from_millis(4900)).await;
        assert!(node.tick().await.is_none());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(node.tick().await.is_some());
        assert_eq!(broker.published().await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_still_updates_indicator() {
        let broker = MockBroker::new();
        broker.fail_next_connect().await;
        let mut node = node(&broker, ScriptedSensor::repeating(50, 450, 2));
        node.start().unwrap();

        let outcome = node.tick().await;
        assert!(matches!(
            outcome,
            Some(CycleOutcome::PublishFailed {
                error: NodeError::NotConnected { .. },
                ..
            })
        ));
        assert!(broker.published().await.is_empty());
        assert_eq!(node.indicator().colors, vec![Rgb::new(0, 255, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_failure_skips_cycle() {
        let broker = MockBroker::new();
        let mut node = node(&broker, ScriptedSensor::repeating(50, 450, 1));
        node.start().unwrap();
        node.sensor_mut().fail_next_read();

        let outcome = node.tick().await;
        assert!(matches!(outcome, Some(CycleOutcome::SensorFailed(_))));
        assert!(broker.published().await.is_empty());
        assert!(node.indicator().colors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sensor_init_failure_is_fatal() {
        let broker = MockBroker::new();
        let mut node = node(&broker, ScriptedSensor::failing_init());

        assert!(matches!(node.start(), Err(NodeError::Sensor { .. })));
    }
}
