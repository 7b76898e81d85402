//! Resolving request executor for guests addressed by vmid only.
//!
//! The executor finds the node hosting a guest through the shared
//! [`TopologyCache`], issues the request, and recovers from a stale mapping
//! by refreshing the cache and retrying once:
//!
//! ```text
//! Lookup ──hit──▶ Request(1)
//!   │                 │ transport/HTTP failure
//!  miss               ▼
//!   ▼              Backoff ──▶ Refresh ──▶ Request(2) ──▶ done or error
//! Refresh ──▶ Request(1)
//! ```
//!
//! A single invocation performs at most [`MAX_REQUEST_ATTEMPTS`] requests and
//! at most two refreshes. Everything runs inside one future, so dropping it
//! (for example on a scheduler timeout) cancels any pending request or wait.

use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::client::ClusterClient;
use crate::error::ProbeError;
use crate::target::GuestKind;
use crate::topology::{TopologyCache, Vmid};

/// Wait between a failed first request and the refresh that precedes the retry.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Hard ceiling on guest requests per invocation.
pub const MAX_REQUEST_ATTEMPTS: u8 = 2;

/// Counters shared by every execution of one executor.
#[derive(Debug, Default)]
pub struct ExecutorStats {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub refreshes: AtomicU64,
    pub requests: AtomicU64,
    pub retries: AtomicU64,
    pub vmid_not_found: AtomicU64,
    pub failures: AtomicU64,
}

/// Point-in-time copy of [`ExecutorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutorStatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub refreshes: u64,
    pub requests: u64,
    pub retries: u64,
    pub vmid_not_found: u64,
    pub failures: u64,
}

impl ExecutorStats {
    pub fn snapshot(&self) -> ExecutorStatsSnapshot {
        ExecutorStatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            vmid_not_found: self.vmid_not_found.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Steps of a single resolving execution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Lookup,
    /// Refresh the cache, then issue request number `attempt`.
    Refresh { attempt: u8 },
    Request { node: String, attempt: u8 },
    /// Wait before the refresh that precedes request number `attempt`.
    Backoff { attempt: u8 },
}

/// Executes guest requests with vmid-to-node resolution and one retry.
pub struct ResolvingRequestExecutor {
    cache: Arc<TopologyCache>,
    backoff: Duration,
    stats: Arc<ExecutorStats>,
}

impl ResolvingRequestExecutor {
    pub fn new(cache: Arc<TopologyCache>) -> Self {
        Self {
            cache,
            backoff: DEFAULT_BACKOFF,
            stats: Arc::new(ExecutorStats::default()),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn cache(&self) -> &Arc<TopologyCache> {
        &self.cache
    }

    pub fn stats(&self) -> &Arc<ExecutorStats> {
        &self.stats
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Requests `path` below guest `vmid`, resolving its node first.
    #[instrument(skip(self, client), fields(kind = %kind))]
    pub async fn execute(
        &self,
        client: &ClusterClient,
        kind: GuestKind,
        vmid: Vmid,
        path: &str,
    ) -> Result<Value, ProbeError> {
        let result = self.run(client, kind, vmid, path).await;
        if result.is_err() {
            bump(&self.stats.failures);
        }
        result
    }

    async fn run(
        &self,
        client: &ClusterClient,
        kind: GuestKind,
        vmid: Vmid,
        path: &str,
    ) -> Result<Value, ProbeError> {
        let mut step = Step::Lookup;
        loop {
            step = match step {
                Step::Lookup => match self.cache.lookup(vmid) {
                    Some(node) => {
                        bump(&self.stats.cache_hits);
                        Step::Request { node, attempt: 1 }
                    }
                    None => {
                        bump(&self.stats.cache_misses);
                        debug!("vmid {} not cached, refreshing topology", vmid);
                        Step::Refresh { attempt: 1 }
                    }
                },

                Step::Refresh { attempt } => {
                    bump(&self.stats.refreshes);
                    let listing = client.list_resources().await?;
                    let guests = self.cache.refresh(&listing);
                    info!("Topology refreshed: {} guests", guests);

                    match self.cache.lookup(vmid) {
                        Some(node) => Step::Request { node, attempt },
                        None => {
                            bump(&self.stats.vmid_not_found);
                            return Err(ProbeError::VmidNotFound(vmid));
                        }
                    }
                }

                Step::Request { node, attempt } => {
                    bump(&self.stats.requests);
                    match client.guest_request(kind, &node, vmid, path).await {
                        Ok(data) => return Ok(data),
                        Err(e) if e.is_retryable() && attempt < MAX_REQUEST_ATTEMPTS => {
                            warn!(
                                "Request for {} {} on node {} failed: {} - retrying in {:?}",
                                kind, vmid, node, e, self.backoff
                            );
                            bump(&self.stats.retries);
                            Step::Backoff {
                                attempt: attempt + 1,
                            }
                        }
                        Err(e) => return Err(e),
                    }
                }

                Step::Backoff { attempt } => {
                    tokio::time::sleep(self.backoff).await;
                    Step::Refresh { attempt }
                }
            };
        }
    }
}
