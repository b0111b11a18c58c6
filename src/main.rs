use docdex::{api, config, logging, pipeline};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();

    let service = match pipeline::PipelineService::new().await {
        Ok(service) => Arc::new(service),
        Err(error) => {
            tracing::error!(error = %error, "Pipeline initialization failed");
            std::process::exit(1);
        }
    };

    let router = api::create_router(service);
    let (listener, port) = bind_listener().await.expect("Failed to bind listener");
    tracing::info!(port, "docdex listening");
    axum::serve(listener, router)
        .await
        .expect("HTTP server terminated unexpectedly");
}

/// Bind the configured port, or scan the fallback range for a free one.
async fn bind_listener() -> std::io::Result<(TcpListener, u16)> {
    const FALLBACK_PORTS: std::ops::RangeInclusive<u16> = 4400..=4499;

    let candidates: Vec<u16> = match config::get_config().server_port {
        Some(fixed) => vec![fixed],
        None => FALLBACK_PORTS.collect(),
    };

    let mut last_error = None;
    for port in candidates {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port busy; trying next");
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "no candidate port available",
        )
    }))
}
