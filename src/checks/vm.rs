//! `vm` check: qemu guest addressed by vmid only.

use serde_json::{Map, Value};

use super::util::{item_with, items_per_key, pick, require, to_percent_used};
use super::CheckState;
use crate::error::ProbeError;

const VM_FIELDS: &[&str] = &[
    "balloon",
    "cpus",
    "disk",
    "diskread",
    "diskwrite",
    "freemem",
    "maxdisk",
    "maxmem",
    "mem",
    "netin",
    "netout",
    "pid",
    "qmpstatus",
    "running-machine",
    "running-qemu",
    "uptime",
];

const BALLOON_FIELDS: &[&str] = &[
    "free_mem",
    "major_page_faults",
    "last_update",
    "minor_page_faults",
    "mem_swapped_out",
    "actual",
    "max_mem",
    "total_mem",
    "mem_swapped_in",
];

const BLOCKSTAT_FIELDS: &[&str] = &[
    "account_failed",
    "account_invalid",
    "failed_flush_operations",
    "failed_rd_operations",
    "failed_unmap_operations",
    "failed_wr_operations",
    "failed_zone_append_operations",
    "flush_operations",
    "flush_total_time_ns",
    "idle_time_ns",
    "invalid_flush_operations",
    "invalid_rd_operations",
    "invalid_unmap_operations",
    "invalid_wr_operations",
    "invalid_zone_append_operations",
    "rd_bytes",
    "rd_merged",
    "rd_operations",
    "rd_total_time_ns",
    "timed_stats",
    "unmap_bytes",
    "unmap_merged",
    "unmap_operations",
    "unmap_total_time_ns",
    "wr_bytes",
    "wr_highest_offset",
    "wr_merged",
    "wr_operations",
    "wr_total_time_ns",
    "zone_append_bytes",
    "zone_append_merged",
    "zone_append_operations",
    "zone_append_total_time_ns",
];

const SUPPORT_FIELDS: &[&str] = &[
    "backup-fleecing",
    "backup-max-workers",
    "pbs-dirty-bitmap",
    "pbs-dirty-bitmap-migration",
    "pbs-dirty-bitmap-savevm",
    "pbs-library-version",
    "pbs-masterkey",
    "query-bitmap-info",
];

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Null) | None => false,
    }
}

fn named(name: &str, mut item: Map<String, Value>) -> Value {
    item.insert("name".into(), Value::from(name));
    Value::Object(item)
}

/// Builds the check state from a qemu `status/current` payload.
pub fn vm_state(vm: &Value) -> Result<CheckState, ProbeError> {
    let vmid = require(vm, "vmid")?;
    let status = require(vm, "status")?;

    let mut item = item_with(pick(vm, "name"), vm, VM_FIELDS);
    item.insert("vmid".into(), vmid);
    item.insert("status".into(), status);
    item.insert("agent".into(), Value::Bool(truthy(vm.get("agent"))));
    let cpu = vm.get("cpu").and_then(Value::as_f64).unwrap_or(0.0);
    item.insert("cpu".into(), Value::from(cpu * 100.0));

    let mut state = CheckState::new();
    state.insert("vm".into(), vec![Value::Object(item)]);

    if let Some(balloon) = vm.get("ballooninfo").filter(|v| !v.is_null()) {
        let total = balloon.get("total_mem").and_then(Value::as_f64);
        let actual = balloon.get("actual").and_then(Value::as_f64);
        let free = balloon.get("free_mem").and_then(Value::as_f64);

        let mut info = item_with(Value::Null, balloon, BALLOON_FIELDS);
        info.insert("percent_used".into(), Value::from(to_percent_used(total, free)));
        info.insert(
            "percent_used_actual".into(),
            Value::from(to_percent_used(actual, free)),
        );
        state.insert("ballooninfo".into(), vec![named("ballooninfo", info)]);
    }

    if let Some(blockstat) = items_per_key(vm.get("blockstat"), BLOCKSTAT_FIELDS) {
        state.insert("blockstat".into(), blockstat);
    }

    if let Some(ha) = vm.get("ha").filter(|v| !v.is_null()) {
        let mut item = Map::new();
        item.insert("managed".into(), Value::Bool(truthy(ha.get("managed"))));
        state.insert("ha".into(), vec![named("ha", item)]);
    }

    if let Some(support) = vm.get("proxmox-support").filter(|v| !v.is_null()) {
        let item = item_with(Value::Null, support, SUPPORT_FIELDS);
        state.insert("proxmox_support".into(), vec![named("proxmox_support", item)]);
    }

    if let Some(nics) = items_per_key(vm.get("nics"), &["netin", "netout"]) {
        state.insert("nics".into(), nics);
    }

    Ok(state)
}
