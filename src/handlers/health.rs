//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns the probe's
//! topology cache state, resolver counters, and the last result of every check.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use proxmox_guest_probe::ExecutorStatsSnapshot;
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::{CheckStatus, SharedState};

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Overall health derived from the last run of every check.
///
/// Unhealthy only when every check that ran has failed; a single broken
/// guest degrades but does not fail the probe.
pub fn overall_status(statuses: &[&CheckStatus]) -> (StatusCode, &'static str) {
    let failing = statuses.iter().filter(|s| !s.success).count();
    if statuses.is_empty() {
        (StatusCode::OK, "OK - No checks have run yet")
    } else if failing == 0 {
        (StatusCode::OK, "OK")
    } else if failing < statuses.len() {
        (StatusCode::OK, "DEGRADED - Some checks failing")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "All checks failing")
    }
}

fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let statuses = state.statuses.read().await;
    let mut sorted: Vec<&CheckStatus> = statuses.values().collect();
    sorted.sort_by(|a, b| (&a.asset, &a.check).cmp(&(&b.asset, &b.check)));

    let (status, message) = overall_status(&sorted);
    let uptime_str = format_uptime(state.start_time.elapsed().as_secs());

    let topology = state.runtime.topology();
    let topology_age = topology
        .last_refresh()
        .map(|t| format!("{:.0}s ago", t.elapsed().as_secs_f64()))
        .unwrap_or_else(|| "never".to_string());

    let resolver = render_resolver_stats(&state.runtime.stats().snapshot());
    let checks = render_checks(&sorted);

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!(
            "{message}\n\nUptime: {uptime_str}\nTopology: {} guests, refreshed {topology_age}\n\n{resolver}\n{checks}",
            topology.len()
        ),
    )
}

/// Renders resolver counters as a plain-text table.
fn render_resolver_stats(stats: &ExecutorStatsSnapshot) -> String {
    let mut out = String::new();
    writeln!(out, "RESOLVER").ok();
    writeln!(out, "========").ok();
    writeln!(out).ok();
    for (name, value) in [
        ("cache hits", stats.cache_hits),
        ("cache misses", stats.cache_misses),
        ("refreshes", stats.refreshes),
        ("guest requests", stats.requests),
        ("retries", stats.retries),
        ("vmid not found", stats.vmid_not_found),
        ("failures", stats.failures),
    ] {
        writeln!(out, "{:20} | {:>10}", name, value).ok();
    }
    out
}

/// Renders the last result of every check as a plain-text table.
fn render_checks(statuses: &[&CheckStatus]) -> String {
    let mut out = String::new();
    writeln!(out, "CHECKS").ok();
    writeln!(out, "======").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:25} | {:15} | {:>8} | {:>10} | {}",
        "Asset", "Check", "Result", "Age (s)", "Error"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(80)).ok();

    for s in statuses {
        writeln!(
            out,
            "{:25} | {:15} | {:>8} | {:>10.0} | {}",
            s.asset,
            s.check,
            if s.success { "ok" } else { "failed" },
            s.age().as_secs_f64(),
            s.error.as_deref().unwrap_or("")
        )
        .ok();
    }
    out
}
