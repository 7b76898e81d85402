//! Check command implementation.
//!
//! Runs one configured check once and prints its state.

use proxmox_guest_probe::{CheckKind, CheckState, Vmid};

use crate::cli::CheckFormat;
use crate::config::{AssetConfig, CheckEntry};
use crate::scheduler::run_once;
use crate::state::SharedState;

/// Finds the configured check of `kind` on `asset`, optionally for one vmid.
pub fn select_check<'a>(
    asset: &'a AssetConfig,
    kind: CheckKind,
    vmid: Option<Vmid>,
) -> Option<&'a CheckEntry> {
    asset
        .checks
        .iter()
        .filter(|entry| entry.check == kind)
        .find(|entry| vmid.is_none() || entry.config.vmid == vmid)
}

/// Runs one check and prints its state.
pub async fn command_check(
    state: &SharedState,
    asset_name: &str,
    kind: CheckKind,
    vmid: Option<Vmid>,
    format: CheckFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let asset = state
        .config
        .find_asset(asset_name)
        .ok_or_else(|| format!("asset '{asset_name}' is not configured"))?;

    let entry = select_check(asset, kind, vmid).ok_or_else(|| match vmid {
        Some(vmid) => format!("no {kind} check for vmid {vmid} on asset '{asset_name}'"),
        None => format!("no {kind} check configured on asset '{asset_name}'"),
    })?;

    let check_state = run_once(state, asset, entry).await?;

    println!("{}", render_state(&check_state, &format)?);
    Ok(())
}

/// Renders a check state; absent payload fields stay `null`.
pub fn render_state(
    state: &CheckState,
    format: &CheckFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        CheckFormat::Json => serde_json::to_string_pretty(state)?,
        CheckFormat::Yaml => serde_yaml::to_string(state)?,
    };
    Ok(output)
}
