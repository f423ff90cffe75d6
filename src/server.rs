//! Inbound relay surface
//!
//! Accepts `{endpoint, prompt, offer}` over HTTP and answers with the
//! normalized relay outcome.

use crate::config::AppConfig;
use crate::errors::{CameraError, ErrorKind};
use crate::relay::{NegotiationRelay, OfferRequest, OfferResult};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::future::Future;

#[derive(Clone)]
pub struct RelayState {
    relay: NegotiationRelay,
}

impl RelayState {
    pub fn new(relay: NegotiationRelay) -> Self {
        Self { relay }
    }
}

/// Router serving the offer route and a health check
pub fn router(relay: NegotiationRelay, offer_route: &str) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(offer_route, post(handle_offer))
        .with_state(RelayState::new(relay))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": crate::VERSION }))
}

async fn handle_offer(State(state): State<RelayState>, body: Bytes) -> Response {
    let result = match serde_json::from_slice::<OfferRequest>(&body) {
        Ok(request) => state.relay.relay(&request).await,
        Err(e) => {
            log::error!("Rejected unreadable offer request: {}", e);
            OfferResult::Failed {
                kind: ErrorKind::MalformedBody,
                message: e.to_string(),
            }
        }
    };

    let (status, body) = result.into_parts();
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

/// Serve the relay on `config.server.bind` until `shutdown` resolves.
pub async fn serve_with_shutdown<F>(config: &AppConfig, shutdown: F) -> Result<(), CameraError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr().map_err(CameraError::Backend)?;
    let relay = NegotiationRelay::from_config(&config.relay)
        .map_err(|e| CameraError::Backend(e.to_string()))?;
    let app = router(relay, &config.server.offer_route);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CameraError::Backend(format!("Failed to bind {}: {}", addr, e)))?;
    log::info!(
        "Relay listening on {} (offers at {})",
        addr,
        config.server.offer_route
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| CameraError::Backend(format!("Server error: {}", e)))?;

    log::info!("Relay stopped");
    Ok(())
}

/// Serve the relay until ctrl-c.
pub async fn serve(config: &AppConfig) -> Result<(), CameraError> {
    serve_with_shutdown(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
