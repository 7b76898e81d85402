//! `lxc` check: container addressed by vmid only.

use serde_json::Value;

use super::util::{item_with, items_per_key, pick, require, to_percent_used};
use super::CheckState;
use crate::error::ProbeError;

const LXC_FIELDS: &[&str] = &[
    "cpus",
    "disk",
    "diskread",
    "diskwrite",
    "maxdisk",
    "maxmem",
    "maxswap",
    "mem",
    "swap",
    "netin",
    "netout",
    "pid",
    "uptime",
];

/// Builds the check state from an lxc `status/current` payload.
pub fn lxc_state(ct: &Value) -> Result<CheckState, ProbeError> {
    let vmid = require(ct, "vmid")?;
    let status = require(ct, "status")?;

    let mut item = item_with(pick(ct, "name"), ct, LXC_FIELDS);
    item.insert("vmid".into(), vmid);
    item.insert("status".into(), status);
    let cpu = ct.get("cpu").and_then(Value::as_f64).unwrap_or(0.0);
    item.insert("cpu".into(), Value::from(cpu * 100.0));

    let maxmem = ct.get("maxmem").and_then(Value::as_f64);
    let mem = ct.get("mem").and_then(Value::as_f64);
    let free = maxmem.zip(mem).map(|(max, used)| max - used);
    item.insert("percent_used".into(), Value::from(to_percent_used(maxmem, free)));

    let mut state = CheckState::new();
    state.insert("lxc".into(), vec![Value::Object(item)]);
    if let Some(nics) = items_per_key(ct.get("nics"), &["netin", "netout"]) {
        state.insert("nics".into(), nics);
    }
    Ok(state)
}
