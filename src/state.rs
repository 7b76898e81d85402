//! Application state management for the probe.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background check tasks.

use ahash::AHashMap as HashMap;
use prometheus::Registry;
use proxmox_guest_probe::ProbeRuntime;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::metrics::ProbeMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Outcome of the most recent run of one scheduled check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckStatus {
    pub asset: String,
    pub check: String,
    pub success: bool,
    pub duration_seconds: f64,
    #[serde(skip)]
    pub finished_at: Instant,
    pub error: Option<String>,
    /// Items of the last successful run, by output type.
    pub state: Option<proxmox_guest_probe::CheckState>,
}

impl CheckStatus {
    pub fn age(&self) -> Duration {
        self.finished_at.elapsed()
    }
}

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: ProbeMetrics,
    pub runtime: Arc<ProbeRuntime>,
    pub config: Arc<Config>,
    /// Last result per `asset/check` key.
    pub statuses: RwLock<HashMap<String, CheckStatus>>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub async fn record_status(&self, key: String, status: CheckStatus) {
        self.statuses.write().await.insert(key, status);
    }
}
