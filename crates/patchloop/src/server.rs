//! Webhook server: verifies deliveries and hands flows to background workers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::runner::FlowRunner;
use crate::webhook::{route_event, verify_signature, Dispatch, EVENT_HEADER, SIGNATURE_HEADER};
use crate::workspace::run_isolated;

#[derive(Clone)]
pub struct AppState {
    pub secret: Option<Arc<str>>,
    pub ready_label: Arc<str>,
    pub dispatches: mpsc::UnboundedSender<Dispatch>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, String)> {
    let secret = state.secret.as_deref().ok_or_else(|| {
        error!("Webhook secret is not configured");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook secret is not configured".to_string(),
        )
    })?;

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    verify_signature(secret.as_bytes(), &body, signature).map_err(|e| {
        warn!(error = %e, "Rejected webhook delivery");
        (StatusCode::UNAUTHORIZED, e.to_string())
    })?;

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let routed = route_event(event, &body, &state.ready_label)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid payload: {}", e)))?;

    if let Some(dispatch) = routed.dispatch {
        info!(
            event,
            repository = %dispatch.repository,
            flow = dispatch.request.name(),
            "Dispatching flow"
        );
        state.dispatches.send(dispatch).map_err(|_| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Dispatch worker has stopped".to_string(),
            )
        })?;
    }

    Ok(Json(json!({"status": routed.status})))
}

/// Run each dispatch in its own task on its own clone
async fn dispatch_worker(runner: Arc<FlowRunner>, mut dispatches: mpsc::UnboundedReceiver<Dispatch>) {
    while let Some(dispatch) = dispatches.recv().await {
        let runner = runner.clone();
        tokio::spawn(async move {
            let flow = dispatch.request.name();
            match run_isolated(&runner, &dispatch).await {
                Ok(outcome) => {
                    info!(flow, repository = %dispatch.repository, status = outcome.status(), "Flow finished")
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!(flow, repository = %dispatch.repository, error = %message, "Flow failed")
                }
            }
        });
    }
}

pub async fn serve(runner: FlowRunner, bind: &str) -> Result<()> {
    let settings = runner.settings();
    let secret: Option<Arc<str>> = settings.secrets.webhook_secret.as_deref().map(Arc::from);
    if secret.is_none() {
        warn!("GITHUB_WEBHOOK_SECRET is not set; every delivery will be refused");
    }
    let ready_label: Arc<str> = settings.pipeline_config(PathBuf::from(".")).ready_label.into();

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(dispatch_worker(Arc::new(runner), rx));

    let router = create_router(AppState {
        secret,
        ready_label,
        dispatches: tx,
    });

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind webhook server to {}", bind))?;
    info!(addr = bind, "Webhook server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Webhook server error")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}
