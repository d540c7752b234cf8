//! monitor - metrics daemon sidecar
//!
//! Starts the daemon, then serves the HTTP control surface that rewrites its
//! configuration and reloads it.

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Parser;
use monitor_server::{DaemonProcess, ProcessRunner, Settings, bootstrap, daemon_flags};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("monitor=info".parse()?))
        .init();

    let settings = Settings::parse();
    let env: BTreeMap<String, String> = std::env::vars().collect();
    let config = settings.server_config(&env);

    let daemon = Arc::new(DaemonProcess::new(daemon_flags(&env, &config.render.config_path)));
    let listen_addr = config.listen_addr;
    let server = bootstrap(config, &env, daemon.clone()).await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown requested");
    };

    if settings.skip_daemon {
        info!("daemon start skipped");
        server.serve_with_shutdown(listen_addr, shutdown).await?;
        return Ok(());
    }

    tokio::select! {
        result = server.serve_with_shutdown(listen_addr, shutdown) => result?,
        result = daemon.run() => {
            result?;
            anyhow::bail!("daemon exited");
        }
    }
    Ok(())
}
