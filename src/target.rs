//! Request targets and endpoint construction.
//!
//! Every API call is addressed at the cluster, at a node, or at a guest on a
//! node. URLs take the shape `https://{address}:{port}/api2/json/{suffix}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProbeError;
use crate::topology::Vmid;

/// Kind of guest managed by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuestKind {
    /// Virtual machine.
    Qemu,
    /// Container.
    Lxc,
}

impl GuestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuestKind::Qemu => "qemu",
            GuestKind::Lxc => "lxc",
        }
    }
}

impl fmt::Display for GuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuestKind {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qemu" => Ok(GuestKind::Qemu),
            "lxc" => Ok(GuestKind::Lxc),
            other => Err(ProbeError::UnsupportedTarget(other.to_string())),
        }
    }
}

/// Location an API request is addressed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTarget {
    Cluster,
    Node,
    Guest(GuestKind),
}

impl FromStr for RequestTarget {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cluster" => Ok(RequestTarget::Cluster),
            "node" => Ok(RequestTarget::Node),
            other => other.parse().map(RequestTarget::Guest),
        }
    }
}

/// Scheme, host and port shared by all requests of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    address: String,
    port: u16,
}

impl ApiBase {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    fn root(&self) -> String {
        format!("https://{}:{}/api2/json", self.address, self.port)
    }

    /// URL below `/cluster`.
    pub fn cluster(&self, path: &str) -> String {
        format!("{}/cluster{}", self.root(), path)
    }

    /// URL below `/nodes/{node}`.
    pub fn node(&self, node: &str, path: &str) -> String {
        format!("{}/nodes/{}{}", self.root(), node, path)
    }

    /// URL below `/nodes/{node}/{kind}/{vmid}`.
    pub fn guest(&self, node: &str, kind: GuestKind, vmid: Vmid, path: &str) -> String {
        format!("{}/nodes/{}/{}/{}{}", self.root(), node, kind, vmid, path)
    }

    /// Builds the URL for `target`, taking node and vmid from configuration.
    ///
    /// Fails with [`ProbeError::Config`] when the target needs a node or vmid
    /// that was not configured.
    pub fn endpoint(
        &self,
        target: RequestTarget,
        node: Option<&str>,
        vmid: Option<Vmid>,
        path: &str,
    ) -> Result<String, ProbeError> {
        match target {
            RequestTarget::Cluster => Ok(self.cluster(path)),
            RequestTarget::Node => {
                let node = node.ok_or_else(|| ProbeError::Config("node".into()))?;
                Ok(self.node(node, path))
            }
            RequestTarget::Guest(kind) => {
                let node = node.ok_or_else(|| ProbeError::Config("node".into()))?;
                let vmid = vmid.ok_or_else(|| ProbeError::Config("vmid".into()))?;
                Ok(self.guest(node, kind, vmid, path))
            }
        }
    }
}
