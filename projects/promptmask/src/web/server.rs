use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::web::api::{download_video, get_status, get_video, upload_video};
use crate::web::AppState;

/// Upload size cap; large enough for the short clips this service is for.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/upload", post(upload_video))
        .route("/api/status/:job_id", get(get_status))
        .route("/api/video/:job_id", get(get_video))
        .route("/api/download/:job_id", get(download_video))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(host: IpAddr, port: u16, state: Arc<AppState>) -> Result<()> {
    let mut current_port = port;
    let listener = loop {
        let addr = SocketAddr::new(host, current_port);
        match TcpListener::bind(addr) {
            Ok(listener) => {
                listener.set_nonblocking(true)?;
                info!("Successfully bound to {}", addr);
                break listener;
            }
            Err(e) => {
                warn!("Failed to bind to {}: {}. Trying next port...", addr, e);
                current_port += 1;
                if current_port == 0 {
                    return Err(anyhow::anyhow!("No available ports found"));
                }
            }
        }
    };

    let app = build_router(state);

    let tokio_listener = tokio::net::TcpListener::from_std(listener)?;
    info!(
        "Promptmask server started on http://{:?}",
        tokio_listener.local_addr()?
    );

    axum::serve(tokio_listener, app).await?;

    Ok(())
}
