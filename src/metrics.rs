//! Prometheus metrics definitions for proxmox-guest-probe.
//!
//! Executor and topology values live in atomics inside the library and are
//! copied into counters and gauges on every scrape. Check run counters are updated by the
//! scheduler directly.

use prometheus::{CounterVec, Gauge, GaugeVec, IntCounter, Opts, Registry};
use proxmox_guest_probe::ProbeRuntime;

/// Collection of Prometheus metrics exported by the probe.
#[derive(Clone)]
pub struct ProbeMetrics {
    // ========== Check Metrics ==========
    pub check_runs_total: CounterVec,     // labels: check, result
    pub check_duration_seconds: GaugeVec, // labels: asset, check
    pub check_success: GaugeVec,          // labels: asset, check

    // ========== Topology Metrics ==========
    pub topology_guests: Gauge,
    pub topology_age_seconds: Gauge,
    pub topology_refreshes_total: IntCounter,
    pub topology_cache_hits_total: IntCounter,
    pub topology_cache_misses_total: IntCounter,

    // ========== Resolver Metrics ==========
    pub guest_requests_total: IntCounter,
    pub guest_retries_total: IntCounter,
    pub vmid_not_found_total: IntCounter,
    pub resolve_failures_total: IntCounter,

    // ========== Probe Metrics ==========
    pub scrape_duration_seconds: Gauge,
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, prometheus::Error> {
    let g = Gauge::new(name, help)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::new(name, help)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

/// Advances `counter` to `total`; the runtime's atomics only ever grow.
fn advance(counter: &IntCounter, total: u64) {
    counter.inc_by(total.saturating_sub(counter.get()));
}

impl ProbeMetrics {
    /// Creates and registers all metrics with `registry`.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let check_runs_total = CounterVec::new(
            Opts::new("proxmox_probe_check_runs_total", "Completed check runs by result"),
            &["check", "result"],
        )?;
        registry.register(Box::new(check_runs_total.clone()))?;

        let check_duration_seconds = GaugeVec::new(
            Opts::new(
                "proxmox_probe_check_duration_seconds",
                "Duration of the last run of each check",
            ),
            &["asset", "check"],
        )?;
        registry.register(Box::new(check_duration_seconds.clone()))?;

        let check_success = GaugeVec::new(
            Opts::new(
                "proxmox_probe_check_success",
                "Whether the last run of each check succeeded (1) or failed (0)",
            ),
            &["asset", "check"],
        )?;
        registry.register(Box::new(check_success.clone()))?;

        Ok(Self {
            check_runs_total,
            check_duration_seconds,
            check_success,
            topology_guests: gauge(
                registry,
                "proxmox_probe_topology_guests",
                "Guests currently held in the vmid-to-node cache",
            )?,
            topology_age_seconds: gauge(
                registry,
                "proxmox_probe_topology_age_seconds",
                "Seconds since the last topology refresh (-1 before the first)",
            )?,
            topology_refreshes_total: counter(
                registry,
                "proxmox_probe_topology_refreshes_total",
                "Cluster resource listings fetched to refresh the topology",
            )?,
            topology_cache_hits_total: counter(
                registry,
                "proxmox_probe_topology_cache_hits_total",
                "Guest lookups answered from the topology cache",
            )?,
            topology_cache_misses_total: counter(
                registry,
                "proxmox_probe_topology_cache_misses_total",
                "Guest lookups that required a topology refresh",
            )?,
            guest_requests_total: counter(
                registry,
                "proxmox_probe_guest_requests_total",
                "Guest requests issued by the resolving executor",
            )?,
            guest_retries_total: counter(
                registry,
                "proxmox_probe_guest_retries_total",
                "Guest requests retried after a refresh",
            )?,
            vmid_not_found_total: counter(
                registry,
                "proxmox_probe_vmid_not_found_total",
                "Lookups for vmids absent from the cluster resource listing",
            )?,
            resolve_failures_total: counter(
                registry,
                "proxmox_probe_resolve_failures_total",
                "Resolving executions that ended in an error",
            )?,
            scrape_duration_seconds: gauge(
                registry,
                "proxmox_probe_scrape_duration_seconds",
                "Time spent serving /metrics request",
            )?,
        })
    }

    /// Copies the runtime's counters and cache state into the exported series.
    pub fn update_from(&self, runtime: &ProbeRuntime) {
        let stats = runtime.stats().snapshot();
        advance(&self.topology_refreshes_total, stats.refreshes);
        advance(&self.topology_cache_hits_total, stats.cache_hits);
        advance(&self.topology_cache_misses_total, stats.cache_misses);
        advance(&self.guest_requests_total, stats.requests);
        advance(&self.guest_retries_total, stats.retries);
        advance(&self.vmid_not_found_total, stats.vmid_not_found);
        advance(&self.resolve_failures_total, stats.failures);

        let topology = runtime.topology();
        self.topology_guests.set(topology.len() as f64);
        self.topology_age_seconds.set(
            topology
                .last_refresh()
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(-1.0),
        );
    }

    /// Records the outcome of one check run.
    ///
    /// `kind` labels the run counter, `check` (kind plus vmid) the per-check gauges.
    pub fn record_check(
        &self,
        asset: &str,
        kind: &str,
        check: &str,
        success: bool,
        duration_seconds: f64,
    ) {
        let result = if success { "success" } else { "failure" };
        self.check_runs_total
            .with_label_values(&[kind, result])
            .inc();
        self.check_duration_seconds
            .with_label_values(&[asset, check])
            .set(duration_seconds);
        self.check_success
            .with_label_values(&[asset, check])
            .set(if success { 1.0 } else { 0.0 });
    }
}
