use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use zapi_gateway::channels::{ChannelService, ConfigCipher, InMemoryChannelStore};
use zapi_gateway::server::config::ServerConfig;
use zapi_gateway::server::logging::init_logging;
use zapi_gateway::version::VERSION;
use zapi_gateway::web::create_axum_router;
use zapi_gateway::zapi::ZApiClient;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("Gateway version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();

    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting gateway, version: {}", VERSION);
    if server_config.uses_development_key() {
        warn!("CHANNEL_ENCRYPTION_KEY is not set; using the development key. Do not use it in production.");
    }

    let gateway = Arc::new(ZApiClient::new(
        server_config.zapi_base_url.clone(),
        server_config.request_timeout(),
    )?);
    info!(base_url = %gateway.base_url(), "Z-API client ready.");

    let cipher = ConfigCipher::from_hex(&server_config.channel_encryption_key)?;
    let channel_service = Arc::new(ChannelService::new(
        Arc::new(InMemoryChannelStore::new()),
        cipher,
    ));

    let app = create_axum_router(gateway, channel_service, server_config.clone());

    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.set_keepalive(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(1024)?;
    info!(address = %addr, "HTTP server listening.");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Box::new)?;

    info!("Gateway stopped.");
    Ok(())
}
