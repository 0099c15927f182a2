//! API gateway server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ Gateway::handle
//!                                   │
//!                                   ├─ routing: Router (ArcSwap<RouteTable>) → Matcher
//!                                   ├─ middleware: error_mapping → route stages
//!                                   ├─ dispatch: pool slot → Transport, retries, deadline
//!                                   └─ aggregate: fan-out → merged JSON
//!
//!     Background: health monitor, config watcher + SIGHUP reload,
//!                 admin API, Prometheus exporter, signal-driven shutdown
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::watcher::ConfigWatcher;
use api_gateway::lifecycle::spawn_signal_handlers;
use api_gateway::observability::{logging, metrics};
use api_gateway::{admin, load_config, GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Reverse-proxy API gateway", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    if args.check {
        api_gateway::RouteTable::build(&config)?;
        println!("{}: {} routes, {} aggregates OK", args.config.display(), config.routes.len(), config.aggregates.len());
        return Ok(());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?args.config, "api-gateway starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address, metrics disabled"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        max_connections = config.listener.max_connections,
        max_body_bytes = config.listener.max_body_bytes,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let (watcher, config_updates) = ConfigWatcher::new(&args.config);
    let _file_watch = match watcher.watch() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config file watch unavailable, reload via SIGHUP only");
            None
        }
    };
    let _signals = spawn_signal_handlers(shutdown.clone(), watcher);

    let admin_config = config.admin.clone();
    let server = GatewayServer::new(config)?;

    if admin_config.enabled {
        let admin_listener = TcpListener::bind(&admin_config.bind_address).await?;
        let gateway = Arc::clone(server.gateway());
        let stop = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(admin_listener, gateway, &admin_config.api_key, stop).await {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
