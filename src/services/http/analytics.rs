use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tokio::sync::oneshot;

use crate::services::analytics::AnalyticsRequest;

pub async fn get_dashboard(
    State(state): State<super::AppState>,
    Path(phone): Path<String>,
) -> impl IntoResponse {
    let (dashboard_tx, dashboard_rx) = oneshot::channel();

    let send_result = state
        .analytics_channel
        .send(AnalyticsRequest::Dashboard {
            phone,
            response: dashboard_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to process request: {}", e)})),
        );
    }

    match dashboard_rx.await {
        Ok(Ok(dashboard)) => (StatusCode::OK, Json(json!(dashboard))),
        Ok(Err(service_error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to receive response: {}", e)})),
        ),
    }
}

pub async fn get_report(
    State(state): State<super::AppState>,
    Path(phone): Path<String>,
) -> impl IntoResponse {
    let (report_tx, report_rx) = oneshot::channel();

    let send_result = state
        .analytics_channel
        .send(AnalyticsRequest::FinancialReport {
            phone,
            response: report_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to process request: {}", e)})),
        );
    }

    match report_rx.await {
        Ok(Ok(report)) => (StatusCode::OK, Json(json!(report))),
        Ok(Err(service_error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to receive response: {}", e)})),
        ),
    }
}
