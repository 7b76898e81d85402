//! Guest-to-node topology cache.
//!
//! The cache maps every qemu/lxc guest id to the node that hosted it at the
//! time of the last cluster resource listing. It is owned explicitly by the
//! probe runtime and shared with check tasks through an `Arc`.
//!
//! A refresh always replaces the whole map, so migrated or removed guests
//! correct themselves on the next listing. Concurrent refreshes race with
//! last-writer-wins; each listing is a complete snapshot on its own.

use ahash::AHashMap as HashMap;
use serde::Deserialize;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;
use tracing::debug;

/// Cluster-wide guest identifier.
pub type Vmid = u32;

/// One entry of `GET /cluster/resources`.
///
/// Nodes, storages and pools share the listing with guests; those carry no
/// vmid and are skipped by [`TopologyCache::refresh`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClusterResource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub vmid: Option<Vmid>,
    #[serde(default)]
    pub node: Option<String>,
}

impl ClusterResource {
    pub fn guest(kind: &str, vmid: Vmid, node: &str) -> Self {
        Self {
            kind: kind.to_string(),
            vmid: Some(vmid),
            node: Some(node.to_string()),
        }
    }

    fn is_guest(&self) -> bool {
        matches!(self.kind.as_str(), "qemu" | "lxc")
    }
}

#[derive(Default)]
struct Snapshot {
    nodes: HashMap<Vmid, String>,
    refreshed_at: Option<Instant>,
}

/// Shared vmid → node mapping.
#[derive(Default)]
pub struct TopologyCache {
    inner: RwLock<Snapshot>,
}

impl TopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node currently recorded for `vmid`, if any.
    pub fn lookup(&self, vmid: Vmid) -> Option<String> {
        let snapshot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        snapshot.nodes.get(&vmid).cloned()
    }

    /// Replaces the whole mapping with the guests found in `listing`.
    ///
    /// Returns the number of guests captured.
    pub fn refresh(&self, listing: &[ClusterResource]) -> usize {
        let nodes: HashMap<Vmid, String> = listing
            .iter()
            .filter(|r| r.is_guest())
            .filter_map(|r| Some((r.vmid?, r.node.clone()?)))
            .collect();
        let count = nodes.len();

        let mut snapshot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.nodes = nodes;
        snapshot.refreshed_at = Some(Instant::now());
        drop(snapshot);

        debug!("Topology cache replaced with {} guests", count);
        count
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .nodes
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time of the last refresh, `None` while the cache is still cold.
    pub fn last_refresh(&self) -> Option<Instant> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refreshed_at
    }
}
