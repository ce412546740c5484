use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;
use tokio::sync::oneshot;

use crate::models::receipts::GenerateRequest;
use crate::services::receipts::ReceiptRequest;
use crate::services::ServiceError;

pub async fn generate_receipt(
    State(state): State<super::AppState>,
    Json(request): Json<GenerateRequest>,
) -> Response {
    let (receipt_tx, receipt_rx) = oneshot::channel();
    let (phone, draft) = request.into_draft();

    let send_result = state
        .receipt_channel
        .send(ReceiptRequest::Generate {
            phone,
            draft,
            via: "api".to_string(),
            response: receipt_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to process request: {}", e)})),
        )
            .into_response();
    }

    match receipt_rx.await {
        Ok(Ok(receipt)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "receiptId": receipt.receipt_id,
                "receiptNumber": receipt.receipt_number,
                "downloadUrl": receipt.download_url,
                "message": "Receipt generated successfully"
            })),
        )
            .into_response(),
        Ok(Err(ServiceError::QuotaExceeded { usage, limit, plan_name })) => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Receipt limit exceeded",
                "message": format!(
                    "Você atingiu o limite de {limit} recibos do plano {plan_name} ({usage} usados). Faça upgrade para continuar."
                ),
                "upgradeUrl": format!("{}/plans", state.public_url)
            })),
        )
            .into_response(),
        Ok(Err(ServiceError::Validation(message))) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Validation failed", "message": message})),
        )
            .into_response(),
        Ok(Err(service_error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to generate receipt", "message": service_error.to_string()})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to receive response: {}", e)})),
        )
            .into_response(),
    }
}

pub async fn download_receipt(
    State(state): State<super::AppState>,
    Path(receipt_id): Path<String>,
) -> Response {
    let (receipt_tx, receipt_rx) = oneshot::channel();

    let send_result = state
        .receipt_channel
        .send(ReceiptRequest::Get {
            id: receipt_id,
            response: receipt_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to process request: {}", e)})),
        )
            .into_response();
    }

    match receipt_rx.await {
        Ok(Ok(Some(receipt))) => Redirect::temporary(&receipt.pdf_url).into_response(),
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Receipt not found"})),
        )
            .into_response(),
        Ok(Err(service_error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": service_error.to_string()})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to receive response: {}", e)})),
        )
            .into_response(),
    }
}

pub async fn list_receipts(
    State(state): State<super::AppState>,
    Path(phone): Path<String>,
) -> impl IntoResponse {
    let (list_tx, list_rx) = oneshot::channel();

    let send_result = state
        .receipt_channel
        .send(ReceiptRequest::History {
            phone,
            limit: 20,
            response: list_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to process request: {}", e)})),
        );
    }

    match list_rx.await {
        Ok(Ok(receipts)) => (StatusCode::OK, Json(json!({"receipts": receipts}))),
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

pub async fn void_receipt(
    State(state): State<super::AppState>,
    Path(receipt_id): Path<String>,
) -> impl IntoResponse {
    let (void_tx, void_rx) = oneshot::channel();

    let send_result = state
        .receipt_channel
        .send(ReceiptRequest::Void {
            id: receipt_id,
            response: void_tx,
        })
        .await;
    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to process request: {}", e)})),
        );
    }

    match void_rx.await {
        Ok(Ok(receipt)) => (StatusCode::OK, Json(json!(receipt))),
        Ok(Err(service_error)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Receipt not found", "details": service_error.to_string()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to receive response: {}", e)})),
        ),
    }
}
