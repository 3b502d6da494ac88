//! # CLI Interface
//!
//! Defines the command-line argument structure for `gridcert-node` using
//! `clap` derive. Supports three subcommands: `run`, `replay` and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// GridCert certificate registry node.
///
/// Hosts a single energy-certificate registry, applies operations to it in
/// arrival order, and exposes the registry over HTTP together with
/// Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "gridcert-node",
    about = "GridCert energy certificate registry node",
    version,
    propagate_version = true
)]
pub struct GridCertCli {
    /// Log output format: "pretty" or "json".
    #[arg(long, global = true, env = "GRIDCERT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl GridCertCli {
    /// The parsed log format.
    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.log_format)
    }
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the registry over HTTP.
    Run(RunArgs),
    /// Apply a JSON file of operations to a fresh registry and print the
    /// outcome of each, followed by the notification log.
    Replay(ReplayArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Principal that receives the Admin role when a new registry is created.
    #[arg(long, env = "GRIDCERT_ADMIN", default_value = "admin")]
    pub admin: String,

    /// JSON snapshot to load at startup and write back at shutdown.
    ///
    /// When omitted, the registry lives in memory only.
    #[arg(long, env = "GRIDCERT_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Port for the HTTP API.
    #[arg(long, env = "GRIDCERT_RPC_PORT", default_value_t = 9841)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "GRIDCERT_METRICS_PORT", default_value_t = 9842)]
    pub metrics_port: u16,
}

/// Arguments for the `replay` subcommand.
#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// JSON file holding an array of operations.
    pub operations: PathBuf,

    /// Principal that receives the Admin role in the fresh registry.
    #[arg(long, env = "GRIDCERT_ADMIN", default_value = "admin")]
    pub admin: String,

    /// Write the final registry snapshot to this file.
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,

    /// Stop at the first rejected operation instead of continuing.
    #[arg(long)]
    pub fail_fast: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        GridCertCli::command().debug_assert();
    }

    #[test]
    fn replay_args_parse() {
        let cli = GridCertCli::parse_from([
            "gridcert-node",
            "replay",
            "ops.json",
            "--admin",
            "root",
            "--fail-fast",
        ]);
        match cli.command {
            Commands::Replay(args) => {
                assert_eq!(args.operations, PathBuf::from("ops.json"));
                assert_eq!(args.admin, "root");
                assert!(args.fail_fast);
                assert!(args.snapshot_out.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
