//! HTTP transport - JSON over HTTP in front of the resolver
//!
//! Each request opens its own read-only store on the blocking pool, so
//! requests share nothing but the immutable [`Settings`].

use axum::{
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::config::Settings;

pub mod routes;

/// Server state
pub struct AppState {
    pub settings: Settings,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/stats", get(routes::get_stats))
        .route("/v1/leaks", get(routes::list_leaks))
        .route("/v1/leaks/{leak_id}", get(routes::get_leak))
        .route("/v1/leaks/{leak_id}/emails", get(routes::get_leak_emails))
        .route("/v1/email/{address}/leaks", get(routes::get_leaks_by_email))
        .route("/v1/emails/{email_id}/leaks", get(routes::get_leaks_by_email_id))
        .route("/v1/domain/{domain}/leaks", get(routes::get_leaks_by_domain))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(settings: Settings) -> anyhow::Result<()> {
    let addr = settings.listen_addr()?;
    tracing::info!("Serving {} on {}", settings.database.display(), addr);

    let app = build_router(Arc::new(AppState { settings }));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
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
    tracing::info!("Shutdown signal received");
}
