//! Periodic check scheduling.
//!
//! Every configured (asset, check) pair gets its own tokio task. A run is
//! bounded by the configured check timeout; when it expires the check future
//! is dropped, which cancels any pending API request or backoff wait.
//! Failures are logged and recorded, they never stop the task.

use proxmox_guest_probe::{CheckState, ProbeError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::config::{
    AssetConfig, CheckEntry, DEFAULT_CHECK_TIMEOUT_SECONDS, DEFAULT_INTERVAL_SECONDS,
};
use crate::state::{CheckStatus, SharedState};

/// Why a single check run did not produce a state.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Check(#[from] ProbeError),

    #[error("check timed out after {0:?}")]
    Timeout(Duration),
}

/// Spawns one periodic task per configured check.
pub fn spawn_checks(state: &SharedState) -> Vec<JoinHandle<()>> {
    let default_interval = state
        .config
        .interval_seconds
        .unwrap_or(DEFAULT_INTERVAL_SECONDS);

    let mut handles = Vec::new();
    for asset in &state.config.assets {
        let asset = Arc::new(asset.clone());
        for entry in &asset.checks {
            let interval = Duration::from_secs(entry.interval_seconds.unwrap_or(default_interval));
            info!(
                "Scheduling {} on {} every {:?}",
                entry.label(),
                asset.name,
                interval
            );
            handles.push(tokio::spawn(check_loop(
                state.clone(),
                asset.clone(),
                entry.clone(),
                interval,
            )));
        }
    }
    handles
}

async fn check_loop(
    state: SharedState,
    asset: Arc<AssetConfig>,
    entry: CheckEntry,
    interval: Duration,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        // Errors are already logged and recorded
        let _ = run_once(&state, &asset, &entry).await;
    }
}

/// Runs one check once, records its outcome, and returns its state.
#[instrument(skip(state, asset, entry), fields(asset = %asset.name, check = %entry.label()))]
pub async fn run_once(
    state: &SharedState,
    asset: &AssetConfig,
    entry: &CheckEntry,
) -> Result<CheckState, RunError> {
    let timeout = Duration::from_secs(
        state
            .config
            .check_timeout_seconds
            .unwrap_or(DEFAULT_CHECK_TIMEOUT_SECONDS),
    );
    let label = entry.label();
    let start = Instant::now();

    let run = state.runtime.run_check(
        entry.check,
        &asset.name,
        &entry.config,
        &asset.credentials,
    );
    let result = match time::timeout(timeout, run).await {
        Ok(result) => result.map_err(RunError::from),
        Err(_) => Err(RunError::Timeout(timeout)),
    };

    let duration = start.elapsed().as_secs_f64();
    state.metrics.record_check(
        &asset.name,
        entry.check.as_str(),
        &label,
        result.is_ok(),
        duration,
    );

    match &result {
        Ok(check_state) => {
            let items: usize = check_state.values().map(Vec::len).sum();
            debug!("Check completed in {:.3}s with {} items", duration, items);
        }
        Err(e) => error!("Check failed after {:.3}s: {}", duration, e),
    }

    state
        .record_status(
            format!("{}/{}", asset.name, label),
            CheckStatus {
                asset: asset.name.clone(),
                check: label,
                success: result.is_ok(),
                duration_seconds: duration,
                finished_at: Instant::now(),
                error: result.as_ref().err().map(|e| e.to_string()),
                state: result.as_ref().ok().cloned(),
            },
        )
        .await;

    result
}
