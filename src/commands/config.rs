//! Config command implementation.
//!
//! Generates an example configuration file in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::example();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("proxmox-guest-probe.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Proxmox Guest Probe Configuration
# =================================
#
# Telemetry Listener
# ------------------
# bind: "0.0.0.0"                # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                     # HTTP port for /metrics, /health, /status
# enable_telemetry: true         # Disable to run checks without a listener
#
# Scheduling
# ----------
# interval_seconds: 300          # Run every check each N seconds
# check_timeout_seconds: 60      # Abort a single check run after N seconds
# backoff_seconds: 5             # Wait before refresh + retry of a failed guest request
# request_timeout_seconds: 30    # Timeout of a single API request
#
# Logging
# -------
# log_level: "info"              # off, error, warn, info, debug, trace
#
# Assets
# ------
# Each asset is one cluster API endpoint. `name` doubles as the API address
# unless a check sets `address`. Credentials are a PVE API token.
#
# Check kinds:
#   vm            qemu guest by vmid; node resolved from the cluster
#   lxc           container by vmid; node resolved from the cluster
#   proxmoxguest  qemu guest on the configured `node`
#
# Check config: address, port (8006), ssl (false = skip certificate checks),
# node, vmid
"#;

    format!("{comments}\n{yaml}")
}
