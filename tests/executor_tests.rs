//! Integration tests for the resolving request executor.
//!
//! A fake cluster stands in for the HTTPS transport: it serves the resource
//! listing from its current guest placement and answers guest requests only
//! on the node that actually hosts the guest. Time is paused so the backoff
//! wait elapses instantly.

use async_trait::async_trait;
use proxmox_guest_probe::{
    AuthHeader, CheckConfig, ClusterClient, CredentialSet, GuestKind, ProbeError,
    ResolvingRequestExecutor, TopologyCache, Transport, Vmid,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const STATUS: &str = "/status/current";

/// In-memory cluster with movable guests and nodes that can go down.
struct FakeCluster {
    placement: Mutex<Vec<(Vmid, &'static str, String)>>,
    down: Mutex<HashSet<String>>,
    listing_fails: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl FakeCluster {
    fn new(placement: &[(Vmid, &'static str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            placement: Mutex::new(
                placement
                    .iter()
                    .map(|(vmid, kind, node)| (*vmid, *kind, node.to_string()))
                    .collect(),
            ),
            down: Mutex::new(HashSet::new()),
            listing_fails: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn set_down(&self, node: &str) {
        self.down.lock().unwrap().insert(node.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn refreshes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|url| url.ends_with("/cluster/resources"))
            .count()
    }

    fn guest_requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|url| url.contains("/nodes/"))
            .collect()
    }

    fn listing(&self) -> Value {
        let guests: Vec<Value> = self
            .placement
            .lock()
            .unwrap()
            .iter()
            .map(|(vmid, kind, node)| json!({"type": kind, "vmid": vmid, "node": node}))
            .chain(std::iter::once(json!({"type": "node", "node": "a"})))
            .collect();
        json!({ "data": guests })
    }
}

#[async_trait]
impl Transport for FakeCluster {
    async fn get_json(
        &self,
        url: &str,
        _auth: &AuthHeader,
        _verify_tls: bool,
    ) -> Result<Value, ProbeError> {
        self.calls.lock().unwrap().push(url.to_string());

        if url.ends_with("/cluster/resources") {
            if *self.listing_fails.lock().unwrap() {
                return Err(ProbeError::Transport("connection reset".into()));
            }
            return Ok(self.listing());
        }

        let rest = url
            .split("/api2/json/nodes/")
            .nth(1)
            .expect("guest url");
        let parts: Vec<&str> = rest.split('/').collect();
        let (node, kind, vmid) = (parts[0], parts[1], parts[2].parse::<Vmid>().unwrap());

        if self.down.lock().unwrap().contains(node) {
            return Err(ProbeError::Transport("connection refused".into()));
        }

        let hosted = self
            .placement
            .lock()
            .unwrap()
            .iter()
            .any(|(v, k, n)| *v == vmid && *k == kind && n == node);
        if hosted {
            Ok(json!({"data": {"vmid": vmid, "status": "running", "node": node}}))
        } else {
            Err(ProbeError::Http {
                status: 500,
                url: url.to_string(),
            })
        }
    }
}

fn client(cluster: &Arc<FakeCluster>) -> ClusterClient {
    let creds = CredentialSet::new("monitor", "pve", "probe", "secret");
    ClusterClient::from_check(cluster.clone(), "pve01", &CheckConfig::for_vmid(100), &creds)
        .unwrap()
}

fn executor(cache: &Arc<TopologyCache>) -> ResolvingRequestExecutor {
    ResolvingRequestExecutor::new(cache.clone())
}

fn warm_cache(entries: &[(Vmid, &str)]) -> Arc<TopologyCache> {
    let cache = Arc::new(TopologyCache::new());
    let listing: Vec<_> = entries
        .iter()
        .map(|(vmid, node)| proxmox_guest_probe::ClusterResource::guest("qemu", *vmid, node))
        .collect();
    cache.refresh(&listing);
    cache
}

#[tokio::test(start_paused = true)]
async fn test_cold_cache_refreshes_then_requests() {
    // Cold cache, guest listed on a
    let cluster = FakeCluster::new(&[(100, "qemu", "a")]);
    let cache = Arc::new(TopologyCache::new());

    let data = executor(&cache)
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap();

    assert_eq!(data["node"], "a");
    assert_eq!(cluster.refreshes(), 1);
    assert_eq!(
        cluster.guest_requests(),
        vec!["https://pve01:8006/api2/json/nodes/a/qemu/100/status/current".to_string()]
    );
    assert_eq!(cluster.calls()[0], "https://pve01:8006/api2/json/cluster/resources");
    assert_eq!(cache.lookup(100).as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_vmid_fails_without_request() {
    // Cold cache, guest absent from the listing
    let cluster = FakeCluster::new(&[]);
    let cache = Arc::new(TopologyCache::new());
    let executor = executor(&cache);

    let err = executor
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::VmidNotFound(100)));
    assert_eq!(cluster.refreshes(), 1);
    assert!(cluster.guest_requests().is_empty());

    let stats = executor.stats().snapshot();
    assert_eq!(stats.vmid_not_found, 1);
    assert_eq!(stats.failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_skips_refresh() {
    let cluster = FakeCluster::new(&[(100, "qemu", "a")]);
    let cache = warm_cache(&[(100, "a")]);
    let executor = executor(&cache);

    executor
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap();

    assert_eq!(cluster.refreshes(), 0);
    assert_eq!(cluster.guest_requests().len(), 1);
    assert_eq!(executor.stats().snapshot().cache_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_migrated_guest_recovered_after_backoff() {
    // Cache says a, guest has moved to b
    let cluster = FakeCluster::new(&[(100, "qemu", "b")]);
    let cache = warm_cache(&[(100, "a")]);
    let executor = executor(&cache);
    let start = tokio::time::Instant::now();

    let data = executor
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap();

    assert_eq!(data["node"], "b");
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert_eq!(cluster.refreshes(), 1);

    let requests = cluster.guest_requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].contains("/nodes/a/qemu/100"));
    assert!(requests[1].contains("/nodes/b/qemu/100"));
    assert_eq!(cache.lookup(100).as_deref(), Some("b"));
    assert_eq!(executor.stats().snapshot().retries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_failure_stops_after_two_requests() {
    // Cold cache, guest on a but node a unreachable: two refreshes and two requests
    let cluster = FakeCluster::new(&[(100, "qemu", "a")]);
    cluster.set_down("a");
    let cache = Arc::new(TopologyCache::new());

    let err = executor(&cache)
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Transport(ref msg) if msg == "connection refused"));
    assert_eq!(cluster.refreshes(), 2);
    assert_eq!(cluster.guest_requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_warm_cache_failure_refreshes_once_more() {
    // First request fails: exactly one more refresh and one more request
    let cluster = FakeCluster::new(&[(100, "qemu", "a")]);
    cluster.set_down("a");
    let cache = warm_cache(&[(100, "a")]);

    let err = executor(&cache)
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(cluster.refreshes(), 1);
    assert_eq!(cluster.guest_requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_second_error_propagated_unchanged() {
    // Guest migrated to a node that is down: the retry error is the one returned
    let cluster = FakeCluster::new(&[(100, "qemu", "b")]);
    cluster.set_down("b");
    let cache = warm_cache(&[(100, "a")]);

    let err = executor(&cache)
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Transport(_)));
    let requests = cluster.guest_requests();
    assert!(requests[0].contains("/nodes/a/"));
    assert!(requests[1].contains("/nodes/b/"));
}

#[tokio::test(start_paused = true)]
async fn test_guest_removed_during_retry_is_not_found() {
    let cluster = FakeCluster::new(&[]);
    let cache = warm_cache(&[(100, "a")]);

    let err = executor(&cache)
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::VmidNotFound(100)));
    assert_eq!(cluster.guest_requests().len(), 1);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_listing_failure_propagates() {
    let cluster = FakeCluster::new(&[(100, "qemu", "a")]);
    *cluster.listing_fails.lock().unwrap() = true;
    let cache = Arc::new(TopologyCache::new());

    let err = executor(&cache)
        .execute(&client(&cluster), GuestKind::Qemu, 100, STATUS)
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Transport(_)));
    assert_eq!(cluster.refreshes(), 1);
    assert!(cluster.guest_requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_guest_kind_selects_path() {
    let cluster = FakeCluster::new(&[(200, "lxc", "c")]);
    let cache = Arc::new(TopologyCache::new());

    executor(&cache)
        .execute(&client(&cluster), GuestKind::Lxc, 200, STATUS)
        .await
        .unwrap();

    assert!(cluster.guest_requests()[0].contains("/nodes/c/lxc/200/status/current"));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_backoff_leaves_no_refresh() {
    let cluster = FakeCluster::new(&[(100, "qemu", "b")]);
    let cache = warm_cache(&[(100, "a")]);
    let executor = executor(&cache);
    let client = client(&cluster);

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        executor.execute(&client, GuestKind::Qemu, 100, STATUS),
    )
    .await;
    assert!(result.is_err(), "execution should time out during backoff");

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(cluster.refreshes(), 0);
    assert_eq!(cluster.guest_requests().len(), 1);
    assert_eq!(cache.lookup(100).as_deref(), Some("a"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_checks_share_cache() {
    let cluster = FakeCluster::new(&[(100, "qemu", "a"), (101, "qemu", "b"), (102, "lxc", "a")]);
    let cache = Arc::new(TopologyCache::new());
    let executor = Arc::new(executor(&cache));

    let mut handles = Vec::new();
    for (vmid, kind) in [(100, GuestKind::Qemu), (101, GuestKind::Qemu), (102, GuestKind::Lxc)] {
        let executor = executor.clone();
        let cluster = cluster.clone();
        handles.push(tokio::spawn(async move {
            executor
                .execute(&client(&cluster), kind, vmid, STATUS)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(cluster.guest_requests().len(), 3);
    // Each cold invocation refreshes on its own; nothing is coalesced
    assert!(cluster.refreshes() >= 1 && cluster.refreshes() <= 3);
}
