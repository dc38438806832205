use crate::discord::{self, DiscordWebhook, WebhookApi};
use crate::identity::{IdentityApi, StubIdentity};
use crate::models::{SubmissionRequest, VerifyRequest};
use crate::rate_limit::RateLimiter;
use crate::validation;
use anyhow::Result;
use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::{env, net::SocketAddr, sync::Arc};
use tokio::sync::Semaphore;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_CONCURRENT_DISPATCHES: usize = 8;
const DEFAULT_PORT: u16 = 8080;

#[derive(Clone)]
pub struct AppState {
    pub webhook: Option<Arc<dyn WebhookApi>>,
    pub identity: Arc<dyn IdentityApi>,
    pub rate_limiter: Arc<RateLimiter>,
    pub dispatch_sem: Arc<Semaphore>,
}

pub async fn run_server() -> Result<()> {
    let webhook = DiscordWebhook::from_env()?.map(|w| Arc::new(w) as Arc<dyn WebhookApi>);
    match &webhook {
        Some(_) => info!("Webhook forwarding enabled"),
        None => warn!("DISCORD_WEBHOOK_URL not set - accepted reports will not be forwarded"),
    }

    let state = AppState {
        webhook,
        identity: Arc::new(StubIdentity),
        rate_limiter: Arc::new(RateLimiter::new()),
        dispatch_sem: Arc::new(Semaphore::new(MAX_CONCURRENT_DISPATCHES)),
    };

    let app = build_router(state);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/client-address", get(client_address))
        .route("/verify-identity", post(verify_identity))
        .route("/submit-report", post(submit_report))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

async fn client_address(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Json<Value> {
    let address = extract_address(&headers, peer.as_ref().map(|p| &p.0));
    Json(json!({ "address": address }))
}

async fn verify_identity(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> (StatusCode, Json<Value>) {
    if !validation::is_valid_identity_id(&request.identity_id) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "valid": false,
                "exists": false,
                "message": "Identity ID must be 17-20 digits"
            })),
        );
    }

    match state.identity.verify(&request.identity_id).await {
        Ok(exists) => (
            StatusCode::OK,
            Json(json!({
                "valid": true,
                "exists": exists,
                "message": if exists { "Identity found" } else { "Identity not found" }
            })),
        ),
        Err(e) => {
            error!("Identity lookup failed for {}: {}", request.identity_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "valid": false,
                    "exists": false,
                    "message": "Identity service is unavailable"
                })),
            )
        }
    }
}

async fn submit_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Json(report): Json<SubmissionRequest>,
) -> (StatusCode, Json<Value>) {
    let address = extract_address(&headers, peer.as_ref().map(|p| &p.0));

    if !state.rate_limiter.admit(&address).await {
        warn!(client = %address, "Submission rejected: rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "message": "Too many submissions. Please wait a couple of minutes and try again."
            })),
        );
    }

    if let Err(err) = validation::validate(&report) {
        info!(
            client = %address,
            field = err.field,
            "Submission rejected: {}", err.message
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": err.message })),
        );
    }

    let submitted_at = Utc::now();
    // Audit entry: there is no persistence, so the log is the record.
    info!(
        client = %address,
        identity = %report.identity_id,
        department = %report.department,
        rank = %report.rank,
        at = %submitted_at.to_rfc3339(),
        "Accepted resignation report from '{}'", report.name_and_code
    );

    let payload = discord::build_payload(&report, &address, submitted_at);
    let webhook = state.webhook.clone();
    let sem = state.dispatch_sem.clone();
    tokio::spawn(async move {
        let _permit = match sem.acquire_owned().await {
            Ok(p) => p,
            Err(_) => return,
        };
        discord::dispatch(webhook.as_ref(), &payload).await;
    });

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Report submitted. Expect a decision within 24 hours."
        })),
    )
}

fn extract_address(headers: &HeaderMap, peer: Option<&SocketAddr>) -> String {
    headers
        .get("cf-connecting-ip")
        .or_else(|| headers.get("x-real-ip"))
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .or_else(|| peer.map(|a| a.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
