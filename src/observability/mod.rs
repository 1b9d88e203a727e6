//! Observability for the room and fan nodes
//!
//! Structured logging through `tracing` and a process-wide metrics collector
//! that is logged as a snapshot on shutdown.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{cycle_span, session_span};
