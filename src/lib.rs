//! Proxmox Guest Probe Library
//!
//! This library queries a Proxmox VE cluster's management API for per-guest
//! metrics. Guests addressed only by their cluster-wide vmid are located
//! through a self-healing topology cache: when a request against the cached
//! node fails, the cache is refreshed from the cluster resource listing and
//! the request is retried once.
//!
//! # Features
//!
//! - **Topology Cache**: vmid → node mapping, replaced wholesale on refresh
//! - **Resolving Executor**: lookup, request, refresh and a single retry with backoff
//! - **Pluggable Transport**: the HTTPS transport sits behind a trait so tests can fake it
//! - **Check Adapters**: `proxmoxguest`, `vm` and `lxc` checks producing flat records
//!
//! # Usage
//!
//! ```rust,no_run
//! use proxmox_guest_probe::{
//!     CheckConfig, CheckKind, CredentialSet, HttpTransport, ProbeRuntime, TopologyCache,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), proxmox_guest_probe::ProbeError> {
//! let transport = Arc::new(HttpTransport::new(Duration::from_secs(30))?);
//! let cache = Arc::new(TopologyCache::new());
//! let runtime = ProbeRuntime::new(transport, cache, Duration::from_secs(5));
//!
//! let credentials = CredentialSet::new("monitor", "pve", "probe", "secret");
//! let state = runtime
//!     .run_check(CheckKind::Vm, "pve01.example", &CheckConfig::for_vmid(100), &credentials)
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&state).unwrap());
//! # Ok(())
//! # }
//! ```

pub mod check_config;
pub mod checks;
pub mod client;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod target;
pub mod topology;

// Re-export main types for convenience
pub use check_config::{CheckConfig, DEFAULT_API_PORT};
pub use checks::{CheckKind, CheckState, ProbeRuntime};
pub use client::{ClusterClient, HttpTransport, Transport};
pub use credentials::{AuthHeader, CredentialSet};
pub use error::ProbeError;
pub use executor::{ExecutorStats, ExecutorStatsSnapshot, ResolvingRequestExecutor};
pub use target::{ApiBase, GuestKind, RequestTarget};
pub use topology::{ClusterResource, TopologyCache, Vmid};
