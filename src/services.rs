use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::repositories::sessions::SessionStore;
use crate::settings::Settings;

pub mod analytics;
pub mod conversation;
mod http;
pub mod receipts;
pub mod renderer;
pub mod users;
pub mod whatsapp;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Quota exceeded: {usage}/{limit} receipts on {plan_name}")]
    QuotaExceeded {
        usage: i64,
        limit: i64,
        plan_name: String,
    },
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Render error: {0}")]
    Render(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (receipt_tx, mut receipt_rx) = mpsc::channel(512);
    let (analytics_tx, mut analytics_rx) = mpsc::channel(512);
    let (conversation_tx, mut conversation_rx) = mpsc::channel(512);
    let (outbound_tx, mut outbound_rx) = mpsc::channel(512);

    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        settings.sessions.ttl_secs,
    )));
    sessions.start_sweep_task();

    let mut user_service = users::UserService::new();
    let mut receipt_service = receipts::ReceiptService::new();
    let mut analytics_service = analytics::AnalyticsService::new();
    let mut conversation_service = conversation::ConversationService::new();
    let mut whatsapp_service = whatsapp::WhatsAppService::new();

    log::info!("Starting user service.");
    let user_pool = pool.clone();
    tokio::spawn(async move {
        user_service
            .run(users::UserRequestHandler::new(user_pool), &mut user_rx)
            .await;
    });

    log::info!("Starting receipt service.");
    let receipt_pool = pool.clone();
    let renderer_client = renderer::RendererClient::new(
        settings.renderer.url.clone(),
        Duration::from_secs(settings.renderer.timeout_secs),
    );
    let receipt_public_url = settings.server.public_url.clone();
    tokio::spawn(async move {
        receipt_service
            .run(
                receipts::ReceiptRequestHandler::new(
                    receipt_pool,
                    renderer_client,
                    receipt_public_url,
                ),
                &mut receipt_rx,
            )
            .await;
    });

    log::info!("Starting analytics service.");
    let analytics_pool = pool.clone();
    tokio::spawn(async move {
        analytics_service
            .run(
                analytics::AnalyticsRequestHandler::new(analytics_pool),
                &mut analytics_rx,
            )
            .await;
    });

    log::info!("Starting WhatsApp delivery service.");
    let whatsapp_settings = settings.whatsapp.clone();
    tokio::spawn(async move {
        whatsapp_service
            .run(
                whatsapp::WhatsAppRequestHandler::new(whatsapp_settings),
                &mut outbound_rx,
            )
            .await;
    });

    log::info!("Starting conversation service.");
    let conversation_handler = conversation::ConversationRequestHandler::new(
        Arc::clone(&sessions),
        user_tx.clone(),
        receipt_tx.clone(),
        analytics_tx.clone(),
        outbound_tx.clone(),
        settings.server.public_url.clone(),
    );
    tokio::spawn(async move {
        conversation_service
            .run(conversation_handler, &mut conversation_rx)
            .await;
    });

    log::info!("Starting HTTP server.");
    http::start_http_server(
        &settings,
        conversation_tx,
        user_tx,
        receipt_tx,
        analytics_tx,
        outbound_tx,
    )
    .await?;

    Ok(())
}
