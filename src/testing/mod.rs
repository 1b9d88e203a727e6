//! Testing utilities and mock implementations
//!
//! This module provides an in-memory broker and scripted hardware for testing
//! both nodes without a real MQTT broker or sensors.

pub mod mocks;

pub use mocks::*;
