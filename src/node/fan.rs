//! Fan node: switch the fan from readings delivered on the subscribed topic

use crate::config::NodeConfig;
use crate::error::{NodeError, NodeResult};
use crate::hal::ActuatorSink;
use crate::node::policy::ThresholdPolicy;
use crate::observability::metrics;
use crate::protocol::decode;
use crate::session::{LinkSession, Role};
use crate::transport::{InboundMessage, Transport};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct FanNode<T: Transport, A: ActuatorSink> {
    session: LinkSession<T>,
    fan: A,
    policy: ThresholdPolicy,
    fan_on: Option<bool>,
}

impl<T: Transport, A: ActuatorSink> FanNode<T, A> {
    pub fn new(config: &NodeConfig, transport: T, fan: A) -> Self {
        let role = Role::Subscriber {
            topic: config.mqtt.topic.clone(),
        };

        Self {
            session: LinkSession::new(transport, &config.node.id, role, &config.mqtt),
            fan,
            policy: config.thresholds,
            fan_on: None,
        }
    }

    pub fn session(&self) -> &LinkSession<T> {
        &self.session
    }

    /// Last state successfully written to the fan, `None` before `start`
    pub fn fan_state(&self) -> Option<bool> {
        self.fan_on
    }

    pub fn sink(&self) -> &A {
        &self.fan
    }

    /// Force the fan off before any reading arrives
    pub fn start(&mut self) -> NodeResult<()> {
        self.set_fan(false)?;
        info!(
            tvoc_max = self.policy.tvoc_max,
            eco2_max = self.policy.eco2_max,
            aqi_max = self.policy.aqi_max,
            "Fan node started"
        );
        Ok(())
    }

    fn set_fan(&mut self, on: bool) -> NodeResult<()> {
        if let Err(e) = self.fan.set_digital_output(on) {
            warn!(error = %e, on, "Fan output write failed");
            metrics().actuator_failed();
            return Err(e);
        }

        if self.fan_on != Some(on) {
            info!(fan = if on { "ON" } else { "OFF" }, "Fan switched");
        }
        self.fan_on = Some(on);
        metrics().fan_state(on);
        Ok(())
    }

    /// Decode one reading and write the fan output
    ///
    /// The output is written on every valid message. A payload that fails to
    /// decode leaves the fan as it was.
    pub fn handle_message(&mut self, message: &InboundMessage) -> NodeResult<bool> {
        let payload = match decode(&message.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    error = %e,
                    topic = %message.topic,
                    bytes = message.payload.len(),
                    "Discarding undecodable reading"
                );
                metrics().decode_failed();
                return Err(NodeError::Decode(e));
            }
        };

        if payload.is_partial() {
            debug!(?payload, "Reading has unset fields");
        }

        let exceeded = self.policy.exceeded(&payload);
        let on = !exceeded.is_empty();
        if on {
            let names: Vec<&str> = exceeded.iter().map(|p| p.name()).collect();
            debug!(exceeded = ?names, "Thresholds exceeded");
        }

        self.set_fan(on)?;
        Ok(on)
    }

    /// One loop iteration: service the session and act on a delivered reading
    pub async fn tick(&mut self) -> Option<NodeResult<bool>> {
        let message = self.session.poll().await?;
        Some(self.handle_message(&message))
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
                    // Errors are already logged and counted
                    let _ = self.tick().await;
                }
            }
        }

        info!(fan_on = ?self.fan_on, "Fan node stopping");
        self.session.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DecodeError;
    use crate::testing::mocks::{MockBroker, MockTransport, RecordingActuator};
    use bytes::Bytes;

    fn message(json: &'static str) -> InboundMessage {
        InboundMessage {
            topic: "sensors/test".to_string(),
            payload: Bytes::from_static(json.as_bytes()),
        }
    }

    fn node(broker: &MockBroker) -> FanNode<MockTransport, RecordingActuator> {
        FanNode::new(
            &NodeConfig::test_config(),
            broker.transport(),
            RecordingActuator::new(),
        )
    }

    #[tokio::test]
    async fn test_start_forces_fan_off() {
        let broker = MockBroker::new();
        let mut node = node(&broker);

        assert_eq!(node.fan_state(), None);
        node.start().unwrap();
        assert_eq!(node.fan_state(), Some(false));
        assert_eq!(node.sink().outputs, vec![false]);
    }

    #[tokio::test]
    async fn test_level_policy_writes_every_message() {
        let broker = MockBroker::new();
        let mut node = node(&broker);
        node.start().unwrap();

        assert!(node.handle_message(&message(r#"{"tvoc":300}"#)).unwrap());
        assert!(node.handle_message(&message(r#"{"eco2":900}"#)).unwrap());
        assert!(!node.handle_message(&message(r#"{"tvoc":50}"#)).unwrap());

        assert_eq!(node.sink().outputs, vec![false, true, true, false]);
    }

    #[tokio::test]
    async fn test_decode_failure_leaves_fan_unchanged() {
        let broker = MockBroker::new();
        let mut node = node(&broker);
        node.start().unwrap();
        node.handle_message(&message(r#"{"aqi":5}"#)).unwrap();

        let err = node.handle_message(&message("{not json")).unwrap_err();
        assert!(matches!(err, NodeError::Decode(DecodeError::Malformed(_))));

        let err = node.handle_message(&message("[1,2,3]")).unwrap_err();
        assert!(matches!(err, NodeError::Decode(DecodeError::NotAnObject)));

        assert_eq!(node.fan_state(), Some(true));
        assert_eq!(node.sink().outputs, vec![false, true]);
    }

    #[tokio::test]
    async fn test_actuator_failure_keeps_recorded_state() {
        let broker = MockBroker::new();
        let mut node = node(&broker);
        node.start().unwrap();

        node.fan.fail_next_write();
        let err = node.handle_message(&message(r#"{"tvoc":500}"#)).unwrap_err();
        assert!(matches!(err, NodeError::Actuator { .. }));
        assert_eq!(node.fan_state(), Some(false));
    }
}
