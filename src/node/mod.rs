//! The two node roles
//!
//! - [`publisher`] - room node: samples sensors and publishes readings
//! - [`fan`] - fan node: subscribes to readings and switches the fan
//! - [`policy`] - threshold evaluation and indicator colors shared by both

pub mod fan;
pub mod policy;
pub mod publisher;

use std::time::Duration;

pub use fan::FanNode;
pub use policy::{indicator_color, Pollutant, Rgb, ThresholdPolicy};
pub use publisher::{CycleOutcome, PublisherNode};

/// Idle time between loop iterations in the host binaries
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);
