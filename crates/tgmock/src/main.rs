//! tgmock - mock Telegram Bot API server
//!
//! Main entry point. Binds the mock, prints the bound port as the only line
//! on stdout, and serves until SIGINT or SIGTERM.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;

use tgmock_server::{MockServer, SeededSource};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Stdout carries the port line, so logs go to stderr.
    let filter = if cli.verbose {
        "tgmock=debug,tgmock_server=debug,tower_http=debug,info"
    } else {
        "tgmock=info,tgmock_server=warn,warn"
    };
    let console_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let (file_layer, _guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tgmock.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "tgmock=trace,tgmock_server=trace,tower_http=debug,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    let config = cli.to_config();
    let mut server = MockServer::new(config).context("invalid configuration")?;
    if let Some(seed) = cli.seed {
        server = server.with_fault_source(Arc::new(SeededSource::new(seed)));
    }

    let handle = server
        .start()
        .await
        .context("failed to start mock server")?;

    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", handle.port())?;
        stdout.flush()?;
    }

    shutdown_signal().await;
    info!("Shutting down");

    handle.shutdown().await.context("server did not shut down cleanly")?;
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
