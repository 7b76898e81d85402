//! CLI command implementations for proxmox-guest-probe.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Run one configured check once
//! - `config`: Example configuration file generation

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
