use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::analytics::AnalyticsRequest;
use super::conversation::ConversationRequest;
use super::receipts::ReceiptRequest;
use super::users::UserRequest;
use super::whatsapp::OutboundRequest;
use crate::models::whatsapp::{InboundMessage, Reply};
use crate::settings::Settings;

mod analytics;
mod receipts;
mod users;

#[derive(Clone)]
struct AppState {
    conversation_channel: mpsc::Sender<ConversationRequest>,
    user_channel: mpsc::Sender<UserRequest>,
    receipt_channel: mpsc::Sender<ReceiptRequest>,
    analytics_channel: mpsc::Sender<AnalyticsRequest>,
    outbound_channel: mpsc::Sender<OutboundRequest>,
    verify_token: String,
    public_url: String,
}

/// Inbound webhook. The provider only needs the ack within its timeout;
/// the processing outcome travels back over the outbound message channel,
/// so the turn is enqueued and the request answered immediately.
async fn receive_webhook(
    State(state): State<AppState>,
    Json(message): Json<InboundMessage>,
) -> impl IntoResponse {
    log::info!("Message from {}.", message.from);

    match state
        .conversation_channel
        .send(ConversationRequest::Inbound { message })
        .await
    {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            log::error!("Failed to enqueue webhook message: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "error")
        }
    }
}

/// Meta-style verification handshake.
async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == Some("subscribe") && token == Some(state.verify_token.as_str()) {
        (StatusCode::OK, challenge)
    } else {
        (StatusCode::FORBIDDEN, "verification failed".to_string())
    }
}

#[derive(Deserialize)]
struct SendRequest {
    to: String,
    message: String,
}

/// Manual outbound send, kept around for testing the channel.
async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> impl IntoResponse {
    let (send_tx, send_rx) = oneshot::channel();

    let send_result = state
        .outbound_channel
        .send(OutboundRequest::Deliver {
            to: request.to.clone(),
            reply: Reply::Text(request.message),
            response: Some(send_tx),
        })
        .await;

    if let Err(e) = send_result {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Failed to process request: {}", e)})),
        );
    }

    match send_rx.await {
        Ok(Ok(())) => (
            StatusCode::OK,
            Json(json!({"success": true, "to": request.to})),
        ),
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

pub async fn start_http_server(
    settings: &Settings,
    conversation_channel: mpsc::Sender<ConversationRequest>,
    user_channel: mpsc::Sender<UserRequest>,
    receipt_channel: mpsc::Sender<ReceiptRequest>,
    analytics_channel: mpsc::Sender<AnalyticsRequest>,
    outbound_channel: mpsc::Sender<OutboundRequest>,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        conversation_channel,
        user_channel,
        receipt_channel,
        analytics_channel,
        outbound_channel,
        verify_token: settings.whatsapp.verify_token.clone(),
        public_url: settings.server.public_url.clone(),
    };

    let app = Router::new()
        .route("/api/whatsapp/webhook", post(receive_webhook).get(verify_webhook))
        .route("/api/whatsapp/send", post(send_message))
        .route("/api/users/{phone}/stats", get(users::get_user_stats))
        .route("/api/users/{phone}/subscription", post(users::update_subscription))
        .route("/api/receipts/generate", post(receipts::generate_receipt))
        .route("/api/receipts/download/{receipt_id}", get(receipts::download_receipt))
        .route("/api/receipts/list/{phone}", get(receipts::list_receipts))
        .route("/api/receipts/{receipt_id}/void", post(receipts::void_receipt))
        .route("/api/analytics/dashboard/{phone}", get(analytics::get_dashboard))
        .route("/api/analytics/report/{phone}", get(analytics::get_report))
        .route("/health", get(|| async { "OK" }))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener =
        tokio::net::TcpListener::bind((settings.server.host.as_str(), settings.server.port))
            .await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
