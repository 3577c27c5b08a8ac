//! Web server setup and routing

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api;
use crate::config::TlsConfig;
use crate::serial;
use crate::state::AppState;

/// HTTP routes over the shared state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Query form kept for simple curl/browser use
        .route("/", get(api::query_command))
        .route("/api/command", post(api::post_command))
        .route("/api/devices", get(api::list_devices))
        .route(
            "/api/history",
            get(api::get_history).delete(api::clear_history),
        )
        .route("/api/export", get(api::get_export).post(api::save_export))
        .route("/api/config", get(api::get_config))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the control surfaces (HTTP or HTTPS depending on config, plus serial)
pub async fn run(state: Arc<AppState>, bind: &str, tls: Option<&TlsConfig>) -> Result<()> {
    let app = router(state.clone());

    if state.config.serial.enabled {
        let serial_config = state.config.serial.clone();
        tokio::spawn(serial::run(state.clone(), serial_config));
    } else {
        info!("Serial transport disabled");
    }

    if let Some(tls_config) = tls {
        run_https(app, bind, tls_config).await
    } else {
        run_http(app, bind).await
    }
}

/// Run plain HTTP server
async fn run_http(app: Router, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(address = %bind, protocol = "HTTP", "Starting web server");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Run HTTPS server with TLS
async fn run_https(app: Router, bind: &str, tls: &TlsConfig) -> Result<()> {
    use axum_server::tls_rustls::RustlsConfig;
    use std::path::Path;

    for (label, file) in [("certificate", &tls.cert), ("key", &tls.key)] {
        if !Path::new(file).exists() {
            anyhow::bail!("TLS {} file not found: {}", label, file);
        }
    }

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key).await?;
    let addr: std::net::SocketAddr = bind.parse()?;
    info!(address = %bind, protocol = "HTTPS", cert = %tls.cert, "Starting web server with TLS");

    axum_server::bind_rustls(addr, rustls_config)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
