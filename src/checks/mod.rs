//! Check adapters and the runtime that executes them.
//!
//! Each check turns one API payload into a [`CheckState`]: a map from output
//! type name (`vm`, `nics`, ...) to the items of that type.
//!
//! - `proxmoxguest`: qemu guest on a configured node, requested directly
//! - `vm`: qemu guest addressed by vmid only, node resolved by the executor
//! - `lxc`: container addressed by vmid only, node resolved by the executor

pub mod guest;
pub mod lxc;
pub mod util;
pub mod vm;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::check_config::CheckConfig;
use crate::client::{ClusterClient, Transport};
use crate::credentials::CredentialSet;
use crate::error::ProbeError;
use crate::executor::{ExecutorStats, ResolvingRequestExecutor};
use crate::target::{GuestKind, RequestTarget};
use crate::topology::TopologyCache;

pub use guest::guest_state;
pub use lxc::lxc_state;
pub use util::to_percent_used;
pub use vm::vm_state;

/// Output of one check: type name → items.
pub type CheckState = BTreeMap<String, Vec<Value>>;

/// Path of the live guest status below a guest endpoint.
pub const STATUS_PATH: &str = "/status/current";

/// Checks this probe knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    ProxmoxGuest,
    Vm,
    Lxc,
}

impl CheckKind {
    pub const ALL: [CheckKind; 3] = [CheckKind::ProxmoxGuest, CheckKind::Vm, CheckKind::Lxc];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::ProxmoxGuest => "proxmoxguest",
            CheckKind::Vm => "vm",
            CheckKind::Lxc => "lxc",
        }
    }

    /// Whether the hosting node is resolved at runtime instead of configured.
    pub fn resolves_node(&self) -> bool {
        !matches!(self, CheckKind::ProxmoxGuest)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProbeError::UnsupportedTarget(s.to_string()))
    }
}

/// Process-wide state shared by all check invocations.
///
/// Owns the topology cache through its executor and borrows the transport;
/// cloning the `Arc`s is all a check task needs.
pub struct ProbeRuntime {
    transport: Arc<dyn Transport>,
    executor: ResolvingRequestExecutor,
}

impl ProbeRuntime {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<TopologyCache>, backoff: Duration) -> Self {
        Self {
            transport,
            executor: ResolvingRequestExecutor::new(cache).with_backoff(backoff),
        }
    }

    pub fn topology(&self) -> &Arc<TopologyCache> {
        self.executor.cache()
    }

    pub fn stats(&self) -> &Arc<ExecutorStats> {
        self.executor.stats()
    }

    /// Runs one check against the asset `asset_name`.
    #[instrument(skip(self, config, credentials))]
    pub async fn run_check(
        &self,
        kind: CheckKind,
        asset_name: &str,
        config: &CheckConfig,
        credentials: &CredentialSet,
    ) -> Result<CheckState, ProbeError> {
        let client =
            ClusterClient::from_check(self.transport.clone(), asset_name, config, credentials)?;
        debug!("Running {} check against {:?}", kind, client.base());

        match kind {
            CheckKind::ProxmoxGuest => {
                let vm = client
                    .request(RequestTarget::Guest(GuestKind::Qemu), STATUS_PATH)
                    .await?;
                guest_state(&vm)
            }
            CheckKind::Vm => {
                let vmid = config.vmid.ok_or_else(|| ProbeError::Config("vmid".into()))?;
                let vm = self
                    .executor
                    .execute(&client, GuestKind::Qemu, vmid, STATUS_PATH)
                    .await?;
                vm_state(&vm)
            }
            CheckKind::Lxc => {
                let vmid = config.vmid.ok_or_else(|| ProbeError::Config("vmid".into()))?;
                let ct = self
                    .executor
                    .execute(&client, GuestKind::Lxc, vmid, STATUS_PATH)
                    .await?;
                lxc_state(&ct)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_kind() {
        assert_eq!("vm".parse::<CheckKind>().unwrap(), CheckKind::Vm);
        assert_eq!(
            "proxmoxguest".parse::<CheckKind>().unwrap(),
            CheckKind::ProxmoxGuest
        );
        assert!(matches!(
            "storage".parse::<CheckKind>(),
            Err(ProbeError::UnsupportedTarget(_))
        ));
    }

    #[test]
    fn test_serde_names_match_display() {
        for kind in CheckKind::ALL {
            let yaml = serde_yaml::to_string(&kind).unwrap();
            assert_eq!(yaml.trim(), kind.as_str());
        }
        assert!(!CheckKind::ProxmoxGuest.resolves_node());
        assert!(CheckKind::Lxc.resolves_node());
    }
}
