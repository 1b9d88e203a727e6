//! Thread-safe metrics collection system
//!
//! Provides atomic counters and mutex-protected collections for tracking
//! operational statistics across the link session, the publish cycle and the
//! fan actuator.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Most recent cycle durations kept for percentile calculation
const MAX_CYCLE_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    // MQTT metrics
    mqtt_connected: AtomicBool,
    connection_attempts: AtomicU64,
    connections_established: AtomicU64,
    connection_failures: AtomicU64,
    connections_lost: AtomicU64,
    messages_published: AtomicU64,
    publish_failures: AtomicU64,
    messages_delivered: AtomicU64,
    connection_start_time: AtomicU64,

    // Room node metrics
    cycles_completed: AtomicU64,
    sensor_failures: AtomicU64,
    indicator_updates: AtomicU64,
    cycle_times: Mutex<Vec<u64>>, // in milliseconds

    // Fan node metrics
    decode_failures: AtomicU64,
    fan_on: AtomicBool,
    fan_switches: AtomicU64,
    actuator_failures: AtomicU64,

    uptime_start: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            mqtt_connected: AtomicBool::new(false),
            connection_attempts: AtomicU64::new(0),
            connections_established: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
            connections_lost: AtomicU64::new(0),
            messages_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            connection_start_time: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            sensor_failures: AtomicU64::new(0),
            indicator_updates: AtomicU64::new(0),
            cycle_times: Mutex::new(Vec::new()),
            decode_failures: AtomicU64::new(0),
            fan_on: AtomicBool::new(false),
            fan_switches: AtomicU64::new(0),
            actuator_failures: AtomicU64::new(0),
            uptime_start: AtomicU64::new(current_timestamp()),
        }
    }

    // MQTT metrics
    pub fn mqtt_connection_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mqtt_connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(true, Ordering::Relaxed);
        self.connection_start_time
            .store(current_timestamp(), Ordering::Relaxed);
    }

    pub fn mqtt_connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn mqtt_connection_lost(&self) {
        self.connections_lost.fetch_add(1, Ordering::Relaxed);
        self.mqtt_connected.store(false, Ordering::Relaxed);
        self.connection_start_time.store(0, Ordering::Relaxed);
    }

    pub fn mqtt_message_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mqtt_publish_failed(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mqtt_message_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    // Room node metrics
    pub fn cycle_completed(&self, duration: Duration) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.cycle_times.lock() {
            times.push(duration.as_millis() as u64);

            // Limit to the most recent samples to prevent unbounded growth
            if times.len() > MAX_CYCLE_SAMPLES {
                times.remove(0);
            }
        }
    }

    pub fn sensor_failed(&self) {
        self.sensor_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn indicator_updated(&self) {
        self.indicator_updates.fetch_add(1, Ordering::Relaxed);
    }

    // Fan node metrics
    pub fn decode_failed(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fan_state(&self, on: bool) {
        let previous = self.fan_on.swap(on, Ordering::Relaxed);
        if previous != on {
            self.fan_switches.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn actuator_failed(&self) {
        self.actuator_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Calculate cycle time statistics (pure function)
    fn calculate_cycle_time_statistics(&self) -> (f64, f64, f64) {
        if let Ok(times) = self.cycle_times.lock() {
            if times.is_empty() {
                (0.0, 0.0, 0.0)
            } else {
                let mut sorted_times = times.clone();
                sorted_times.sort_unstable();

                let avg = sorted_times.iter().sum::<u64>() as f64 / sorted_times.len() as f64;
                (
                    avg,
                    percentile(&sorted_times, 50.0),
                    percentile(&sorted_times, 95.0),
                )
            }
        } else {
            (0.0, 0.0, 0.0)
        }
    }

    /// Calculate connection duration (pure function)
    fn calculate_connection_duration(&self, now: u64) -> u64 {
        if self.mqtt_connected.load(Ordering::Relaxed) {
            let start_time = self.connection_start_time.load(Ordering::Relaxed);
            if start_time > 0 {
                now.saturating_sub(start_time)
            } else {
                0
            }
        } else {
            0
        }
    }

    /// Get complete metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg_cycle_time_ms, cycle_time_p50_ms, cycle_time_p95_ms) =
            self.calculate_cycle_time_statistics();

        MetricsSnapshot {
            mqtt: MqttMetrics {
                connected: self.mqtt_connected.load(Ordering::Relaxed),
                connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
                connections_established: self.connections_established.load(Ordering::Relaxed),
                connection_failures: self.connection_failures.load(Ordering::Relaxed),
                connections_lost: self.connections_lost.load(Ordering::Relaxed),
                messages_published: self.messages_published.load(Ordering::Relaxed),
                publish_failures: self.publish_failures.load(Ordering::Relaxed),
                messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
                connection_duration_seconds: self.calculate_connection_duration(now),
            },
            publisher: PublisherMetrics {
                cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
                sensor_failures: self.sensor_failures.load(Ordering::Relaxed),
                indicator_updates: self.indicator_updates.load(Ordering::Relaxed),
                avg_cycle_time_ms,
                cycle_time_p50_ms,
                cycle_time_p95_ms,
            },
            fan: FanMetrics {
                fan_on: self.fan_on.load(Ordering::Relaxed),
                fan_switches: self.fan_switches.load(Ordering::Relaxed),
                decode_failures: self.decode_failures.load(Ordering::Relaxed),
                actuator_failures: self.actuator_failures.load(Ordering::Relaxed),
            },
            uptime_seconds: now.saturating_sub(self.uptime_start.load(Ordering::Relaxed)),
            timestamp: now,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Public metrics structures
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub mqtt: MqttMetrics,
    pub publisher: PublisherMetrics,
    pub fan: FanMetrics,
    pub uptime_seconds: u64,
    pub timestamp: u64,
}

#[derive(Debug, Serialize)]
pub struct MqttMetrics {
    pub connected: bool,
    pub connection_attempts: u64,
    pub connections_established: u64,
    pub connection_failures: u64,
    pub connections_lost: u64,
    pub messages_published: u64,
    pub publish_failures: u64,
    pub messages_delivered: u64,
    pub connection_duration_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct PublisherMetrics {
    pub cycles_completed: u64,
    pub sensor_failures: u64,
    pub indicator_updates: u64,
    pub avg_cycle_time_ms: f64,
    pub cycle_time_p50_ms: f64,
    pub cycle_time_p95_ms: f64,
}

#[derive(Debug, Serialize)]
pub struct FanMetrics {
    pub fan_on: bool,
    pub fan_switches: u64,
    pub decode_failures: u64,
    pub actuator_failures: u64,
}

// Helper functions
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let len = sorted_data.len();
    let index = (percentile / 100.0) * (len - 1) as f64;

    if index.fract() == 0.0 {
        sorted_data[index as usize] as f64
    } else {
        let lower_index = index.floor() as usize;
        let upper_index = index.ceil() as usize;
        let lower_value = sorted_data[lower_index] as f64;
        let upper_value = sorted_data[upper_index] as f64;

        lower_value + (upper_value - lower_value) * index.fract()
    }
}
