use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    clients::{broker::BrokerClient, database::DurableStore, health::HealthChecker},
    models::{
        health::HealthStatus,
        message::{NotificationRequest, QueuedResponse},
    },
    pipeline::RecentNotifications,
};

pub struct AppState {
    pub broker: Arc<dyn BrokerClient>,
    pub store: Arc<dyn DurableStore>,
    pub recent: RecentNotifications,
    pub health_checker: HealthChecker,
    pub notification_topic: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/notify", post(enqueue_notification))
        .route("/notify/recent", get(recent_notifications))
        .route("/notify/history", get(notification_history))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

pub async fn run_api_server(port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Notification gateway started");

    serve(listener, state).await
}

/// Enqueues and returns without waiting for processing.
async fn enqueue_notification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NotificationRequest>,
) -> impl IntoResponse {
    match state
        .broker
        .publish(&state.notification_topic, &request.message)
        .await
    {
        Ok(()) => {
            info!(topic = %state.notification_topic, "Message sent to broker");
            (StatusCode::OK, Json(QueuedResponse::accepted()))
        }
        Err(e) => {
            error!(error = %e, "Failed to enqueue notification");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(QueuedResponse::rejected(e.to_string())),
            )
        }
    }
}

async fn recent_notifications(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.recent.recent().await {
        Ok(messages) => (StatusCode::OK, Json(messages)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read recent notifications");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn notification_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.find_all().await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to read notification history");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}
