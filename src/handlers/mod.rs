//! HTTP endpoint handlers for the probe.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Health check endpoint
//! - `/status`: Last result of every scheduled check as JSON

pub mod health;
pub mod metrics;
pub mod status;

// Re-export handlers
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use status::status_handler;
