//! Threshold evaluation and indicator colors
//!
//! Both decisions are pure functions of a single reading: no history, no
//! hysteresis.

use crate::config::ConfigError;
use crate::protocol::Payload;
use serde::{Deserialize, Serialize};

/// Fan switching thresholds; a pollutant at or above its limit turns the fan on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// TVOC limit in ppb
    #[serde(default = "default_tvoc_max")]
    pub tvoc_max: i32,
    /// eCO2 limit in ppm
    #[serde(default = "default_eco2_max")]
    pub eco2_max: i32,
    /// AQI level limit (1-5 scale)
    #[serde(default = "default_aqi_max")]
    pub aqi_max: i32,
}

fn default_tvoc_max() -> i32 {
    220
}

fn default_eco2_max() -> i32 {
    800
}

fn default_aqi_max() -> i32 {
    3
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            tvoc_max: default_tvoc_max(),
            eco2_max: default_eco2_max(),
            aqi_max: default_aqi_max(),
        }
    }
}

/// Pollutants the fan reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pollutant {
    Tvoc,
    Eco2,
    Aqi,
}

/// Every pollutant checked by [`ThresholdPolicy::should_actuate`]
pub const POLLUTANTS: [Pollutant; 3] = [Pollutant::Tvoc, Pollutant::Eco2, Pollutant::Aqi];

impl Pollutant {
    pub fn name(self) -> &'static str {
        match self {
            Pollutant::Tvoc => "tvoc",
            Pollutant::Eco2 => "eco2",
            Pollutant::Aqi => "aqi",
        }
    }

    /// Measured value, or `None` when the payload left it unset
    fn value(self, payload: &Payload) -> Option<i32> {
        match self {
            Pollutant::Tvoc => payload.tvoc(),
            Pollutant::Eco2 => payload.eco2(),
            Pollutant::Aqi => payload.aqi(),
        }
    }
}

impl ThresholdPolicy {
    /// All limits must be strictly positive so the unset sentinel never reaches them
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pollutant in POLLUTANTS {
            let limit = self.limit(pollutant);
            if limit <= 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{}_max must be greater than 0, got {limit}",
                    pollutant.name()
                )));
            }
        }
        Ok(())
    }

    pub fn limit(&self, pollutant: Pollutant) -> i32 {
        match pollutant {
            Pollutant::Tvoc => self.tvoc_max,
            Pollutant::Eco2 => self.eco2_max,
            Pollutant::Aqi => self.aqi_max,
        }
    }

    /// Whether a pollutant is at or above its limit; unset never exceeds
    pub fn exceeds(&self, pollutant: Pollutant, payload: &Payload) -> bool {
        pollutant
            .value(payload)
            .is_some_and(|value| value >= self.limit(pollutant))
    }

    /// Pollutants at or above their limits, in table order
    pub fn exceeded(&self, payload: &Payload) -> Vec<Pollutant> {
        POLLUTANTS
            .into_iter()
            .filter(|pollutant| self.exceeds(*pollutant, payload))
            .collect()
    }

    pub fn should_actuate(&self, payload: &Payload) -> bool {
        POLLUTANTS
            .into_iter()
            .any(|pollutant| self.exceeds(pollutant, payload))
    }
}

/// 8-bit RGB color for the status LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Indicator color per AQI level 1 through 5
pub const AQI_COLORS: [Rgb; 5] = [
    Rgb::new(0, 0, 255),   // 1 excellent
    Rgb::new(0, 255, 0),   // 2 good
    Rgb::new(125, 125, 0), // 3 moderate
    Rgb::new(255, 60, 0),  // 4 poor
    Rgb::new(255, 0, 0),   // 5 unhealthy
];

/// Indicator color for an AQI level; anything outside 1..=5 turns the LED off
pub fn indicator_color(aqi: i32) -> Rgb {
    usize::try_from(aqi)
        .ok()
        .and_then(|level| level.checked_sub(1))
        .and_then(|index| AQI_COLORS.get(index).copied())
        .unwrap_or(Rgb::OFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    fn payload(json: &str) -> Payload {
        decode(json.as_bytes()).unwrap()
    }

    #[test]
    fn test_missing_fields_never_actuate() {
        let policy = ThresholdPolicy::default();

        assert!(!policy.should_actuate(&payload(r#"{"tvoc":50}"#)));
        assert!(!policy.should_actuate(&payload("{}")));
        assert!(!policy.should_actuate(&Payload::unset()));
    }

    #[test]
    fn test_threshold_boundaries() {
        let policy = ThresholdPolicy::default();

        assert!(policy.should_actuate(&payload(r#"{"tvoc":220}"#)));
        assert!(!policy.should_actuate(&payload(r#"{"tvoc":219}"#)));
        assert!(policy.should_actuate(&payload(r#"{"eco2":800}"#)));
        assert!(!policy.should_actuate(&payload(r#"{"eco2":799}"#)));
        assert!(policy.should_actuate(&payload(r#"{"aqi":3}"#)));
        assert!(!policy.should_actuate(&payload(r#"{"aqi":2}"#)));
    }

    #[test]
    fn test_any_pollutant_triggers() {
        let policy = ThresholdPolicy::default();
        let reading = payload(r#"{"tvoc":50,"eco2":450,"aqi":4}"#);

        assert!(policy.should_actuate(&reading));
        assert_eq!(policy.exceeded(&reading), vec![Pollutant::Aqi]);
    }

    #[test]
    fn test_sample_payloads() {
        let policy = ThresholdPolicy::default();

        let polluted = payload(
            r#"{"tvoc":300,"temperature":24.5,"humidity":55.2,"eco2":900,"aqi":4}"#,
        );
        assert_eq!(
            policy.exceeded(&polluted),
            vec![Pollutant::Tvoc, Pollutant::Eco2, Pollutant::Aqi]
        );

        let clean = payload(
            r#"{"tvoc":50,"temperature":24.5,"humidity":55.2,"eco2":450,"aqi":1}"#,
        );
        assert!(!policy.should_actuate(&clean));
    }

    #[test]
    fn test_custom_thresholds() {
        let policy = ThresholdPolicy {
            tvoc_max: 300,
            eco2_max: 1000,
            aqi_max: 5,
        };

        assert!(!policy.should_actuate(&payload(r#"{"tvoc":299,"eco2":999,"aqi":4}"#)));
        assert!(policy.should_actuate(&payload(r#"{"aqi":5}"#)));
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        assert!(ThresholdPolicy::default().validate().is_ok());

        let policy = ThresholdPolicy {
            eco2_max: 0,
            ..ThresholdPolicy::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidConfig(msg)) if msg.contains("eco2_max")
        ));

        let policy = ThresholdPolicy {
            aqi_max: -1,
            ..ThresholdPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_indicator_colors() {
        assert_eq!(indicator_color(1), Rgb::new(0, 0, 255));
        assert_eq!(indicator_color(2), Rgb::new(0, 255, 0));
        assert_eq!(indicator_color(3), Rgb::new(125, 125, 0));
        assert_eq!(indicator_color(4), Rgb::new(255, 60, 0));
        assert_eq!(indicator_color(5), Rgb::new(255, 0, 0));

        for unknown in [0, 6, -1, i32::MIN, i32::MAX] {
            assert_eq!(indicator_color(unknown), Rgb::OFF);
        }
    }
}
