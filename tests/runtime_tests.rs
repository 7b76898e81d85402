//! End-to-end tests of `ProbeRuntime::run_check` over a canned transport.

use async_trait::async_trait;
use proxmox_guest_probe::{
    AuthHeader, CheckConfig, CheckKind, CredentialSet, ProbeError, ProbeRuntime, TopologyCache,
    Transport,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers each URL with a fixed payload and records auth headers.
#[derive(Default)]
struct CannedTransport {
    responses: HashMap<String, Value>,
    calls: Mutex<Vec<(String, String, bool)>>,
}

impl CannedTransport {
    fn with(mut self, url: &str, data: Value) -> Self {
        self.responses
            .insert(url.to_string(), json!({ "data": data }));
        self
    }

    fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn get_json(
        &self,
        url: &str,
        auth: &AuthHeader,
        verify_tls: bool,
    ) -> Result<Value, ProbeError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), auth.as_str().to_string(), verify_tls));
        self.responses.get(url).cloned().ok_or(ProbeError::Http {
            status: 404,
            url: url.to_string(),
        })
    }
}

const BASE: &str = "https://pve01:8006/api2/json";

fn creds() -> CredentialSet {
    CredentialSet::new("monitor", "pve", "probe", "s3cret")
}

fn runtime(transport: &Arc<CannedTransport>) -> ProbeRuntime {
    ProbeRuntime::new(
        transport.clone(),
        Arc::new(TopologyCache::new()),
        Duration::from_secs(5),
    )
}

fn listing() -> Value {
    json!([
        {"type": "qemu", "vmid": 100, "node": "a"},
        {"type": "lxc", "vmid": 200, "node": "b"},
        {"type": "node", "node": "a"}
    ])
}

#[tokio::test]
async fn test_vm_check_resolves_node() {
    let transport = Arc::new(
        CannedTransport::default()
            .with(&format!("{BASE}/cluster/resources"), listing())
            .with(
                &format!("{BASE}/nodes/a/qemu/100/status/current"),
                json!({
                    "vmid": 100,
                    "name": "web01",
                    "status": "running",
                    "cpu": 0.5,
                    "agent": 1,
                    "ballooninfo": {"total_mem": 1000.0, "free_mem": 250.0, "actual": 800.0}
                }),
            ),
    );
    let runtime = runtime(&transport);

    let state = runtime
        .run_check(CheckKind::Vm, "pve01", &CheckConfig::for_vmid(100), &creds())
        .await
        .unwrap();

    let vm = &state["vm"][0];
    assert_eq!(vm["name"], "web01");
    assert_eq!(vm["cpu"], 50.0);
    assert_eq!(vm["agent"], true);
    assert!(state.contains_key("ballooninfo"));
    assert_eq!(runtime.topology().len(), 2);
    assert_eq!(runtime.stats().snapshot().refreshes, 1);
}

#[tokio::test]
async fn test_lxc_check_uses_lxc_path() {
    let transport = Arc::new(
        CannedTransport::default()
            .with(&format!("{BASE}/cluster/resources"), listing())
            .with(
                &format!("{BASE}/nodes/b/lxc/200/status/current"),
                json!({"vmid": 200, "name": "dns", "status": "running", "mem": 256.0, "maxmem": 1024.0}),
            ),
    );

    let state = runtime(&transport)
        .run_check(CheckKind::Lxc, "pve01", &CheckConfig::for_vmid(200), &creds())
        .await
        .unwrap();

    assert_eq!(state["lxc"][0]["percent_used"], 25.0);
    assert_eq!(
        transport.urls().last().map(String::as_str),
        Some("https://pve01:8006/api2/json/nodes/b/lxc/200/status/current")
    );
}

#[tokio::test]
async fn test_proxmoxguest_check_uses_configured_node() {
    let transport = Arc::new(CannedTransport::default().with(
        "https://10.0.0.5:8443/api2/json/nodes/pve2/qemu/100/status/current",
        json!({"vmid": 100, "name": "web01", "status": "stopped"}),
    ));
    let config = CheckConfig {
        address: Some("10.0.0.5".into()),
        port: Some(8443),
        ssl: Some(true),
        node: Some("pve2".into()),
        vmid: Some(100),
    };

    let state = runtime(&transport)
        .run_check(CheckKind::ProxmoxGuest, "pve01", &config, &creds())
        .await
        .unwrap();

    let guest = &state["guest"][0];
    assert_eq!(guest["name"], "100");
    assert_eq!(guest["vm_name"], "web01");

    let calls = transport.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "PVEAPIToken=monitor@pve!probe=s3cret");
    assert!(calls[0].2, "ssl: true verifies certificates");
}

#[tokio::test]
async fn test_missing_credentials_make_no_calls() {
    let transport = Arc::new(CannedTransport::default());
    let incomplete = CredentialSet {
        secret: None,
        ..creds()
    };

    let err = runtime(&transport)
        .run_check(CheckKind::Vm, "pve01", &CheckConfig::for_vmid(100), &incomplete)
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Credential));
    assert!(transport.urls().is_empty());
}

#[tokio::test]
async fn test_missing_vmid_makes_no_calls() {
    let transport = Arc::new(CannedTransport::default());

    let err = runtime(&transport)
        .run_check(CheckKind::Lxc, "pve01", &CheckConfig::default(), &creds())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Config(ref field) if field == "vmid"));
    assert!(transport.urls().is_empty());
}

#[tokio::test]
async fn test_proxmoxguest_without_node_makes_no_calls() {
    let transport = Arc::new(CannedTransport::default());

    let err = runtime(&transport)
        .run_check(CheckKind::ProxmoxGuest, "pve01", &CheckConfig::for_vmid(100), &creds())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Config(ref field) if field == "node"));
    assert!(transport.urls().is_empty());
}

#[tokio::test]
async fn test_malformed_status_is_decode_error() {
    let transport = Arc::new(
        CannedTransport::default()
            .with(&format!("{BASE}/cluster/resources"), listing())
            .with(
                &format!("{BASE}/nodes/a/qemu/100/status/current"),
                json!({"vmid": 100}),
            ),
    );

    let err = runtime(&transport)
        .run_check(CheckKind::Vm, "pve01", &CheckConfig::for_vmid(100), &creds())
        .await
        .unwrap_err();

    assert!(matches!(err, ProbeError::Decode(_)));
    assert!(!err.is_retryable());
}
