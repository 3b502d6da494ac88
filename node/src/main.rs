// Copyright (c) 2026 GridCert Contributors. MIT License.
// See LICENSE for details.

//! # GridCert Node
//!
//! Entry point for the `gridcert-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and either serves the registry over HTTP
//! or replays a file of operations against a fresh registry.
//!
//! The binary supports three subcommands:
//!
//! - `run`    : serve the registry API and metrics
//! - `replay` : apply an operations file and print the outcome
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod replay;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Mutex;

use cli::{Commands, GridCertCli};
use metrics::NodeMetrics;
use state::NodeLedger;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = GridCertCli::parse();
    let format = cli.log_format();

    match cli.command {
        Commands::Run(args) => {
            logging::init_logging(logging::DEFAULT_FILTER, format);
            run_node(args).await
        }
        Commands::Replay(args) => {
            logging::init_logging("gridcert_node=warn,gridcert_contracts=warn", format);
            replay::run(args)
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Serves the HTTP API and metrics endpoint until a shutdown signal arrives,
/// then writes the snapshot back if one was configured.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        admin = %args.admin,
        "starting gridcert-node"
    );

    // --- Registry state ---
    let ledger = match &args.state_file {
        Some(path) => NodeLedger::load_or_new(path, &args.admin)?,
        None => NodeLedger::new(&args.admin),
    };
    let ledger = Arc::new(Mutex::new(ledger));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());

    // --- Application state ---
    let app_state = api::AppState {
        version: format!(
            "{} (registry {})",
            env!("CARGO_PKG_VERSION"),
            gridcert_contracts::config::REGISTRY_VERSION,
        ),
        ledger: Arc::clone(&ledger),
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    if let Some(path) = &args.state_file {
        ledger.lock().await.save(path)?;
    }

    tracing::info!("gridcert-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("gridcert-node {}", env!("CARGO_PKG_VERSION"));
    println!("registry      {}", gridcert_contracts::config::REGISTRY_VERSION);
    println!("energy unit   {}", gridcert_contracts::config::ENERGY_UNIT);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
