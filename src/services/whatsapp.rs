use async_trait::async_trait;
use serde_json::json;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::whatsapp::{Reply, ReplyOption};
use crate::settings;
use crate::utils::phone;

pub enum OutboundRequest {
    Deliver {
        to: String,
        reply: Reply,
        response: Option<oneshot::Sender<Result<(), ServiceError>>>,
    },
}

/// Meta Graph API client. With `simulation` enabled nothing leaves the
/// process; messages are logged instead.
#[derive(Clone)]
struct WhatsAppApi {
    api_url: String,
    access_token: String,
    phone_number_id: String,
    simulation: bool,
    client: reqwest::Client,
}

impl WhatsAppApi {
    fn new(settings: settings::WhatsApp) -> Self {
        WhatsAppApi {
            api_url: settings.api_url,
            access_token: settings.access_token,
            phone_number_id: settings.phone_number_id,
            simulation: settings.simulation,
            client: reqwest::Client::new(),
        }
    }

    async fn post_message(&self, payload: serde_json::Value) -> Result<(), anyhow::Error> {
        self.client
            .post(format!("{}/{}/messages", self.api_url, self.phone_number_id))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<(), anyhow::Error> {
        if self.simulation {
            log::info!("[simulation] -> {}: {}", to, text);
            return Ok(());
        }

        self.post_message(json!({
            "messaging_product": "whatsapp",
            "to": phone::api_recipient(to),
            "type": "text",
            "text": { "body": text }
        }))
        .await
    }

    async fn send_buttons(
        &self,
        to: &str,
        text: &str,
        options: &[ReplyOption],
    ) -> Result<(), anyhow::Error> {
        if self.simulation {
            log::info!("[simulation] -> {} (buttons): {}", to, text);
            return Ok(());
        }

        let buttons: Vec<_> = options
            .iter()
            .map(|option| {
                json!({
                    "type": "reply",
                    "reply": { "id": option.id, "title": option.title }
                })
            })
            .collect();

        self.post_message(json!({
            "messaging_product": "whatsapp",
            "to": phone::api_recipient(to),
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": text },
                "action": { "buttons": buttons }
            }
        }))
        .await
    }

    async fn send_list(
        &self,
        to: &str,
        text: &str,
        button: &str,
        options: &[ReplyOption],
    ) -> Result<(), anyhow::Error> {
        if self.simulation {
            log::info!("[simulation] -> {} (list): {}", to, text);
            return Ok(());
        }

        let rows: Vec<_> = options
            .iter()
            .map(|option| json!({ "id": option.id, "title": option.title, "description": "" }))
            .collect();

        self.post_message(json!({
            "messaging_product": "whatsapp",
            "to": phone::api_recipient(to),
            "type": "interactive",
            "interactive": {
                "type": "list",
                "body": { "text": text },
                "action": {
                    "button": button,
                    "sections": [{ "title": "Opções", "rows": rows }]
                }
            }
        }))
        .await
    }
}

#[derive(Clone)]
pub struct WhatsAppRequestHandler {
    api: WhatsAppApi,
}

impl WhatsAppRequestHandler {
    pub fn new(settings: settings::WhatsApp) -> Self {
        WhatsAppRequestHandler {
            api: WhatsAppApi::new(settings),
        }
    }

    /// Interactive sends that fail degrade to the numbered plain-text
    /// rendering, so the conversation stays completable over plain text.
    async fn deliver(&self, to: &str, reply: &Reply) -> Result<(), ServiceError> {
        let result = match reply {
            Reply::Text(text) => self.api.send_text(to, text).await,
            Reply::Buttons { text, options } => {
                match self.api.send_buttons(to, text, options).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        log::warn!("Interactive send to {} failed, falling back: {}", to, e);
                        self.api.send_text(to, &plain_text_fallback(reply)).await
                    }
                }
            }
            Reply::List { text, button, options } => {
                match self.api.send_list(to, text, button, options).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        log::warn!("List send to {} failed, falling back: {}", to, e);
                        self.api.send_text(to, &plain_text_fallback(reply)).await
                    }
                }
            }
        };

        result.map_err(|e| ServiceError::Communication("WhatsApp".to_string(), e.to_string()))
    }
}

/// Numbered plain-text rendering of an interactive message.
pub fn plain_text_fallback(reply: &Reply) -> String {
    match reply {
        Reply::Text(text) => text.clone(),
        Reply::Buttons { text, options } | Reply::List { text, options, .. } => {
            let mut rendered = text.clone();
            for (index, option) in options.iter().enumerate() {
                rendered.push_str(&format!("\n{}. {}", index + 1, option.title));
            }
            rendered
        }
    }
}

#[async_trait]
impl RequestHandler<OutboundRequest> for WhatsAppRequestHandler {
    async fn handle_request(&self, request: OutboundRequest) {
        match request {
            OutboundRequest::Deliver { to, reply, response } => {
                let result = self.deliver(&to, &reply).await;
                if let Err(e) = &result {
                    log::error!("Failed to deliver message to {}: {}", to, e);
                }
                if let Some(response) = response {
                    let _ = response.send(result);
                }
            }
        }
    }
}

pub struct WhatsAppService;

impl WhatsAppService {
    pub fn new() -> Self {
        WhatsAppService {}
    }
}

#[async_trait]
impl Service<OutboundRequest, WhatsAppRequestHandler> for WhatsAppService {}
