//! Hardware seams for the nodes
//!
//! The room node reads a climate sensor and an air quality sensor and drives
//! an RGB status LED; the fan node drives one digital output. Real drivers sit
//! behind [`SensorSource`] and [`ActuatorSink`]; this module also provides the
//! simulated devices used by the host binaries.

use crate::error::{NodeError, NodeResult};
use crate::node::policy::Rgb;
use crate::protocol::Reading;
use serde::Serialize;
use tracing::{debug, info};

/// Temperature and relative humidity from the climate sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClimateSample {
    pub temperature: f64,
    pub humidity: f64,
}

/// Air quality sensor output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AirQualitySample {
    /// Raw device status byte; logged, never published
    pub status: u8,
    pub aqi: i32,
    pub tvoc: i32,
    pub eco2: i32,
}

/// Combine one climate and one air quality sample into a reading
pub fn combine(climate: &ClimateSample, air: &AirQualitySample) -> Reading {
    Reading {
        tvoc: air.tvoc,
        temperature: climate.temperature,
        humidity: climate.humidity,
        eco2: air.eco2,
        aqi: air.aqi,
    }
}

/// Sensor pair on the room node
pub trait SensorSource: Send {
    /// Bring both sensors up; failure here is fatal for the node
    fn init(&mut self) -> NodeResult<()>;

    fn sample_climate(&mut self) -> NodeResult<ClimateSample>;

    /// Sample air quality, compensated with the latest climate sample
    fn sample_air_quality(&mut self, calibration: &ClimateSample) -> NodeResult<AirQualitySample>;
}

/// Outputs driven by the nodes
pub trait ActuatorSink: Send {
    /// Fan relay or transistor on the fan node
    fn set_digital_output(&mut self, on: bool) -> NodeResult<()>;

    /// Status LED on the room node
    fn set_color(&mut self, color: Rgb) -> NodeResult<()>;
}

/// Air quality profile the simulated sensor steps through
#[derive(Debug, Clone, Copy)]
struct Scene {
    aqi: i32,
    tvoc: i32,
    eco2: i32,
}

const SCENES: [Scene; 5] = [
    Scene { aqi: 1, tvoc: 50, eco2: 450 },
    Scene { aqi: 2, tvoc: 120, eco2: 600 },
    Scene { aqi: 3, tvoc: 230, eco2: 780 },
    Scene { aqi: 4, tvoc: 300, eco2: 900 },
    Scene { aqi: 2, tvoc: 150, eco2: 650 },
];

/// Deterministic stand-in for the climate and air quality sensors
///
/// Each scene is held for `samples_per_scene` samples so a fan node on the
/// same topic visibly switches on and off.
#[derive(Debug)]
pub struct SimulatedSensor {
    samples: u64,
    samples_per_scene: u64,
    initialized: bool,
}

impl SimulatedSensor {
    pub fn new(samples_per_scene: u64) -> Self {
        Self {
            samples: 0,
            samples_per_scene: samples_per_scene.max(1),
            initialized: false,
        }
    }

    fn scene(&self) -> Scene {
        let index = (self.samples / self.samples_per_scene) as usize % SCENES.len();
        SCENES[index]
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(3)
    }
}

impl SensorSource for SimulatedSensor {
    fn init(&mut self) -> NodeResult<()> {
        self.initialized = true;
        info!("Simulated climate and air quality sensors initialized");
        Ok(())
    }

    fn sample_climate(&mut self) -> NodeResult<ClimateSample> {
        if !self.initialized {
            return Err(NodeError::sensor("climate sensor not initialized"));
        }

        // Slow sawtooth drift around 24.5 C / 55 %RH
        let step = (self.samples % 10) as f64;
        Ok(ClimateSample {
            temperature: 24.5 + step * 0.1,
            humidity: 55.0 + step * 0.2,
        })
    }

    fn sample_air_quality(&mut self, calibration: &ClimateSample) -> NodeResult<AirQualitySample> {
        if !self.initialized {
            return Err(NodeError::sensor("air quality sensor not initialized"));
        }

        let scene = self.scene();
        self.samples += 1;
        debug!(
            temperature = calibration.temperature,
            humidity = calibration.humidity,
            "Air quality compensation updated"
        );

        Ok(AirQualitySample {
            status: 0,
            aqi: scene.aqi,
            tvoc: scene.tvoc,
            eco2: scene.eco2,
        })
    }
}

/// Actuator that logs every write and remembers the last one
#[derive(Debug, Default)]
pub struct LoggingActuator {
    output: Option<bool>,
    color: Option<Rgb>,
}

impl LoggingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> Option<bool> {
        self.output
    }

    pub fn color(&self) -> Option<Rgb> {
        self.color
    }
}

impl ActuatorSink for LoggingActuator {
    fn set_digital_output(&mut self, on: bool) -> NodeResult<()> {
        if self.output != Some(on) {
            info!(fan = if on { "ON" } else { "OFF" }, "Fan output changed");
        }
        self.output = Some(on);
        Ok(())
    }

    fn set_color(&mut self, color: Rgb) -> NodeResult<()> {
        debug!(r = color.r, g = color.g, b = color.b, "Indicator color set");
        self.color = Some(color);
        Ok(())
    }
}
