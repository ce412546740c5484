use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::oneshot;

use crate::services::users::UserRequest;
use crate::services::ServiceError;

pub async fn get_user_stats(
    State(state): State<super::AppState>,
    Path(phone): Path<String>,
) -> impl IntoResponse {
    let (stats_tx, stats_rx) = oneshot::channel();

    let send_result = state
        .user_channel
        .send(UserRequest::GetStats {
            phone,
            response: stats_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error", "details": e.to_string()})),
        );
    }

    match stats_rx.await {
        Ok(Ok(stats)) => (StatusCode::OK, Json(json!(stats))),
        Ok(Err(ServiceError::UserNotFound(phone))) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found", "phone": phone})),
        ),
        Ok(Err(service_error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error", "details": e.to_string()})),
        ),
    }
}

#[derive(Deserialize)]
pub struct SubscriptionUpdate {
    plan: String,
    #[serde(default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "active".to_string()
}

pub async fn update_subscription(
    State(state): State<super::AppState>,
    Path(phone): Path<String>,
    Json(update): Json<SubscriptionUpdate>,
) -> impl IntoResponse {
    let (user_tx, user_rx) = oneshot::channel();

    let send_result = state
        .user_channel
        .send(UserRequest::UpdateSubscription {
            phone,
            plan: update.plan,
            status: update.status,
            response: user_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error", "details": e.to_string()})),
        );
    }

    match user_rx.await {
        Ok(Ok(user)) => (StatusCode::OK, Json(json!(user))),
        Ok(Err(service_error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Internal server error", "details": e.to_string()})),
        ),
    }
}
