//! `proxmoxguest` check: qemu guest on a configured node.

use serde_json::Value;

use super::util::{item_with, items_per_key, require};
use super::CheckState;
use crate::error::ProbeError;

const GUEST_FIELDS: &[&str] = &[
    "balloon",
    "cpu",
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

/// Builds the check state from a `status/current` payload.
pub fn guest_state(vm: &Value) -> Result<CheckState, ProbeError> {
    let vmid = require(vm, "vmid")?;
    let status = require(vm, "status")?;

    let name = vmid
        .as_str()
        .map(str::to_owned)
        .unwrap_or_else(|| vmid.to_string());
    let mut item = item_with(Value::from(name), vm, GUEST_FIELDS);
    item.insert("vmid".into(), vmid);
    item.insert("status".into(), status);
    item.insert("vm_name".into(), vm.get("name").cloned().unwrap_or(Value::Null));

    let mut state = CheckState::new();
    state.insert("guest".into(), vec![Value::Object(item)]);
    if let Some(nics) = items_per_key(vm.get("nics"), &["netin", "netout"]) {
        state.insert("nics".into(), nics);
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_guest_item_named_after_vmid() {
        let vm = json!({
            "vmid": 100,
            "name": "web01",
            "status": "running",
            "cpu": 0.25,
            "running-qemu": "8.1.2",
            "nics": {"tap100i0": {"netin": 10, "netout": 20}}
        });

        let state = guest_state(&vm).unwrap();
        let guest = &state["guest"][0];
        assert_eq!(guest["name"], "100");
        assert_eq!(guest["vm_name"], "web01");
        assert_eq!(guest["cpu"], 0.25);
        assert_eq!(guest["running_qemu"], "8.1.2");
        assert_eq!(guest["pid"], Value::Null);
        assert_eq!(state["nics"][0]["name"], "tap100i0");
    }

    #[test]
    fn test_string_vmid_named_without_quotes() {
        let state = guest_state(&json!({"vmid": "100", "status": "running"})).unwrap();
        assert_eq!(state["guest"][0]["name"], "100");
        assert_eq!(state["guest"][0]["vmid"], "100");
    }

    #[test]
    fn test_status_is_required() {
        assert!(guest_state(&json!({"vmid": 100})).is_err());
    }
}
