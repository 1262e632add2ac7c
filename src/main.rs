//! Echo server built on the session dispatcher.
//!
//! Every request is answered with a JSON description of itself. Useful for
//! exercising keep-alive behaviour and TLS setup by hand:
//!
//! ```text
//! session-dispatcher --port 8080
//! curl -v http://localhost:8080/hello --next http://localhost:8080/again
//! ```

use std::path::PathBuf;

use clap::Parser;
use hyper::StatusCode;
use serde_json::json;

use session_dispatcher::config::{load_config, ServerConfig};
use session_dispatcher::http::{HttpRequest, HttpResponse};
use session_dispatcher::observability::{logging, metrics};
use session_dispatcher::protocol::RequestMessage;
use session_dispatcher::{BoxError, HttpServer, ServerError};

#[derive(Parser)]
#[command(name = "session-dispatcher")]
#[command(about = "Keep-alive aware echo server", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured host.
    #[arg(long)]
    host: Option<String>,

    /// Override the configured port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("session-dispatcher v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        host = %config.host,
        port = config.port,
        tls = config.security.is_tls(),
        read_timeout_secs = config.session.read_timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let server = HttpServer::bind(config).await?;

    tokio::select! {
        never = server.start(echo, report) => match never {},
        () = shutdown_signal() => {}
    }

    tracing::info!(active_sessions = server.active_sessions(), "Shutdown complete");
    Ok(())
}

async fn echo(request: HttpRequest) -> Result<HttpResponse, BoxError> {
    let headers: serde_json::Map<String, serde_json::Value> = request
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned().into(),
            )
        })
        .collect();

    let body = json!({
        "method": request.method().as_str(),
        "path": request.uri().path(),
        "query": request.uri().query(),
        "version": format!("{:?}", request.version()),
        "keep_alive": request.keep_alive(),
        "headers": headers,
        "body": String::from_utf8_lossy(request.body()),
    });

    Ok(HttpResponse::json(StatusCode::OK, &body))
}

fn report(error: ServerError) {
    tracing::error!(kind = error.kind(), error = %error, "Server error");
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
