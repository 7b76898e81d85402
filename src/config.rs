//! Configuration management for proxmox-guest-probe.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use clap::ValueEnum;
use ahash::AHashSet as HashSet;
use proxmox_guest_probe::{CheckConfig, CheckKind, CredentialSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_INTERVAL_SECONDS: u64 = 300;
pub const DEFAULT_CHECK_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_BACKOFF_SECONDS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

const REDACTED: &str = "<redacted>";

/// One check configured for an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEntry {
    pub check: CheckKind,
    /// Overrides the global interval for this check.
    #[serde(default, alias = "interval-seconds")]
    pub interval_seconds: Option<u64>,
    #[serde(default)]
    pub config: CheckConfig,
}

impl CheckEntry {
    /// Stable label for logs and status keys, e.g. `vm/100`.
    pub fn label(&self) -> String {
        match self.config.vmid {
            Some(vmid) => format!("{}/{}", self.check, vmid),
            None => self.check.to_string(),
        }
    }
}

/// A monitored cluster and the checks run against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// Asset name; also the API address unless a check overrides it.
    pub name: String,
    #[serde(default)]
    pub credentials: CredentialSet,
    #[serde(default)]
    pub checks: Vec<CheckEntry>,
}

/// Probe configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Telemetry listener
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "enable-telemetry")]
    pub enable_telemetry: Option<bool>,

    // Scheduling
    #[serde(alias = "interval-seconds")]
    pub interval_seconds: Option<u64>,
    #[serde(alias = "check-timeout-seconds")]
    pub check_timeout_seconds: Option<u64>,
    #[serde(alias = "backoff-seconds")]
    pub backoff_seconds: Option<u64>,
    #[serde(alias = "request-timeout-seconds")]
    pub request_timeout_seconds: Option<u64>,

    // Logging
    pub log_level: Option<String>,

    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            enable_telemetry: Some(true),
            interval_seconds: Some(DEFAULT_INTERVAL_SECONDS),
            check_timeout_seconds: Some(DEFAULT_CHECK_TIMEOUT_SECONDS),
            backoff_seconds: Some(DEFAULT_BACKOFF_SECONDS),
            request_timeout_seconds: Some(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            log_level: Some("info".into()),
            assets: Vec::new(),
        }
    }
}

impl Config {
    /// Example configuration used by the `config` subcommand.
    pub fn example() -> Self {
        Self {
            assets: vec![AssetConfig {
                name: "pve01.example.com".into(),
                credentials: CredentialSet::new("monitor", "pve", "probe", "xxxxxxxx-xxxx"),
                checks: vec![
                    CheckEntry {
                        check: CheckKind::Vm,
                        config: CheckConfig::for_vmid(100),
                        interval_seconds: None,
                    },
                    CheckEntry {
                        check: CheckKind::Lxc,
                        config: CheckConfig::for_vmid(200),
                        interval_seconds: Some(60),
                    },
                    CheckEntry {
                        check: CheckKind::ProxmoxGuest,
                        config: CheckConfig {
                            node: Some("pve01".into()),
                            vmid: Some(101),
                            ..CheckConfig::default()
                        },
                        interval_seconds: None,
                    },
                ],
            }],
            ..Self::default()
        }
    }

    /// Copy of this config with every token secret replaced.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for asset in &mut config.assets {
            if asset.credentials.secret.is_some() {
                asset.credentials.secret = Some(REDACTED.into());
            }
        }
        config
    }

    /// Configured log level, `info` when unset.
    pub fn effective_log_level(&self) -> Result<LogLevel, String> {
        match self.log_level.as_deref() {
            None => Ok(LogLevel::Info),
            Some(level) => LogLevel::from_str(level, true)
                .map_err(|_| format!("unknown log_level '{level}'")),
        }
    }

    pub fn find_asset(&self, name: &str) -> Option<&AssetConfig> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    for (field, value) in [
        ("interval_seconds", cfg.interval_seconds),
        ("check_timeout_seconds", cfg.check_timeout_seconds),
        ("request_timeout_seconds", cfg.request_timeout_seconds),
    ] {
        if value == Some(0) {
            return Err(format!("{field} must be greater than 0").into());
        }
    }

    cfg.effective_log_level()?;

    let mut names = HashSet::new();
    for asset in &cfg.assets {
        if asset.name.trim().is_empty() {
            return Err("asset with empty name".into());
        }
        if !names.insert(asset.name.as_str()) {
            return Err(format!("duplicate asset '{}'", asset.name).into());
        }
        if asset.credentials.resolve().is_err() {
            return Err(format!(
                "asset '{}': credentials need username, realm, token_id and secret",
                asset.name
            )
            .into());
        }

        for entry in &asset.checks {
            if entry.interval_seconds == Some(0) {
                return Err(format!(
                    "asset '{}', check {}: interval_seconds must be greater than 0",
                    asset.name,
                    entry.label()
                )
                .into());
            }
            if entry.config.vmid.is_none() {
                return Err(format!(
                    "asset '{}', check {}: missing `vmid`",
                    asset.name, entry.check
                )
                .into());
            }
            if !entry.check.resolves_node() && entry.config.node.is_none() {
                return Err(format!(
                    "asset '{}', check {}: missing `node`",
                    asset.name,
                    entry.label()
                )
                .into());
            }
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(interval) = args.interval_seconds {
        config.interval_seconds = Some(interval);
    }
    if let Some(timeout) = args.check_timeout_seconds {
        config.check_timeout_seconds = Some(timeout);
    }
    if let Some(backoff) = args.backoff_seconds {
        config.backoff_seconds = Some(backoff);
    }
    if let Some(level) = &args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }
    if args.disable_telemetry {
        config.enable_telemetry = Some(false);
    }

    Ok(config)
}

/// Configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(format!("config file not found: {}", p.display()).into());
            }
            p.to_path_buf()
        }
        None => {
            // Try default locations
            let defaults = [
                "/etc/proxmox-guest-probe/config.yaml",
                "/etc/proxmox-guest-probe/config.yml",
                "/etc/proxmox-guest-probe/config.json",
                "./proxmox-guest-probe.yaml",
                "./proxmox-guest-probe.yml",
                "./proxmox-guest-probe.json",
            ];

            match defaults.iter().map(PathBuf::from).find(|p| p.exists()) {
                Some(p) => p,
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content, &path)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses `content` according to the extension of `path` (YAML by default).
pub fn parse_config(content: &str, path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format, with secrets redacted
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(&config.redacted(), &format)?);
    Ok(())
}
