//! CLI arguments and subcommands for proxmox-guest-probe.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use proxmox_guest_probe::{CheckKind, Vmid};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format options for `check`
#[derive(Debug, Clone, ValueEnum)]
pub enum CheckFormat {
    Json,
    Yaml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "proxmox-guest-probe",
    about = "Monitoring probe for Proxmox VE guests",
    long_about = "Monitoring probe for Proxmox VE guests.\n\n\
                  Queries the cluster management API for per-guest VM and container metrics. \
                  Guests configured by vmid only are located through a self-healing \
                  vmid-to-node cache that follows migrations.",
    version = "0.1.0",
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Telemetry HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind telemetry listener to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides `log_level` from the config file)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Run every check each N seconds
    #[arg(long)]
    pub interval_seconds: Option<u64>,

    /// Abort a single check run after N seconds
    #[arg(long)]
    pub check_timeout_seconds: Option<u64>,

    /// Wait N seconds before refreshing the topology after a failed guest request
    #[arg(long)]
    pub backoff_seconds: Option<u64>,

    /// Disable the /metrics and /health listener
    #[arg(long)]
    pub disable_telemetry: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one configured check once and print its result
    Check {
        /// Asset name as configured
        #[arg(short = 'a', long)]
        asset: String,

        /// Check to run (proxmoxguest, vm, lxc)
        #[arg(long)]
        check: CheckKind,

        /// Select the configured check for this vmid
        #[arg(long)]
        vmid: Option<Vmid>,

        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: CheckFormat,
    },

    /// Generate an example configuration file
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
