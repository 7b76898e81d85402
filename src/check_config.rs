//! Per-check configuration consumed by the API client.
//!
//! These values come from the probe configuration file, one block per
//! configured check. Missing `node`/`vmid` are only an error for targets that
//! need them, so both stay optional here.

use serde::{Deserialize, Serialize};

use crate::topology::Vmid;

/// Default port of the Proxmox VE management API.
pub const DEFAULT_API_PORT: u16 = 8006;

/// Connection and addressing settings for one check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// API host; falls back to the asset name when empty or absent.
    pub address: Option<String>,
    pub port: Option<u16>,
    /// Verify TLS certificates. Defaults to `false`.
    pub ssl: Option<bool>,
    /// Node hosting the guest, required for node and direct guest requests.
    pub node: Option<String>,
    pub vmid: Option<Vmid>,
}

impl CheckConfig {
    /// Guest addressed only by vmid, node resolved at runtime.
    pub fn for_vmid(vmid: Vmid) -> Self {
        Self {
            vmid: Some(vmid),
            ..Self::default()
        }
    }

    /// Effective API address for the given asset.
    pub fn address_or<'a>(&'a self, asset_name: &'a str) -> &'a str {
        match self.address.as_deref() {
            Some(address) if !address.is_empty() => address,
            _ => asset_name,
        }
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_API_PORT)
    }

    pub fn verify_tls(&self) -> bool {
        self.ssl.unwrap_or(false)
    }
}
