use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::{mpsc, oneshot};

use super::analytics::AnalyticsRequest;
use super::receipts::ReceiptRequest;
use super::users::UserRequest;
use super::whatsapp::OutboundRequest;
use super::{RequestHandler, Service, ServiceError};
use crate::models::analytics::{Dashboard, FinancialReport};
use crate::models::receipts::{GeneratedReceipt, Receipt, ReceiptDraft};
use crate::models::sessions::Session;
use crate::models::users::{ProfileUpdate, User, UserStats};
use crate::models::whatsapp::{InboundMessage, Reply};
use crate::repositories::sessions::SessionStore;
use crate::utils::phone;

pub mod engine;
pub mod intents;
pub mod messages;

use engine::{Context, Effect, Step};

pub enum ConversationRequest {
    Inbound { message: InboundMessage },
}

/// Drives one conversation turn: looks up the session under the per-phone
/// lock, runs the pure transition, executes its side effect over the
/// sibling services and commits the new session only when the effect
/// succeeded. Failures never escape a turn; the user gets an error reply
/// and the prior session snapshot stays authoritative.
#[derive(Clone)]
pub struct ConversationRequestHandler {
    sessions: Arc<SessionStore>,
    user_channel: mpsc::Sender<UserRequest>,
    receipt_channel: mpsc::Sender<ReceiptRequest>,
    analytics_channel: mpsc::Sender<AnalyticsRequest>,
    outbound_channel: mpsc::Sender<OutboundRequest>,
    public_url: String,
}

impl ConversationRequestHandler {
    pub fn new(
        sessions: Arc<SessionStore>,
        user_channel: mpsc::Sender<UserRequest>,
        receipt_channel: mpsc::Sender<ReceiptRequest>,
        analytics_channel: mpsc::Sender<AnalyticsRequest>,
        outbound_channel: mpsc::Sender<OutboundRequest>,
        public_url: String,
    ) -> Self {
        ConversationRequestHandler {
            sessions,
            user_channel,
            receipt_channel,
            analytics_channel,
            outbound_channel,
            public_url,
        }
    }

    async fn handle_inbound(&self, message: InboundMessage) {
        let phone = phone::normalize(&message.from);
        let lock = self.sessions.lock(&phone);
        let _turn = lock.lock().await;

        let reply = match self.process_turn(&phone, &message).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Conversation turn failed for {}: {}", phone, e);
                messages::generic_error()
            }
        };

        self.deliver(&phone, reply).await;
    }

    async fn process_turn(
        &self,
        phone: &str,
        message: &InboundMessage,
    ) -> Result<Reply, ServiceError> {
        let user = self.create_or_get_user(phone).await?;
        let session = self.sessions.get(phone).unwrap_or_default();
        let ctx = Context {
            public_url: self.public_url.clone(),
            today: Local::now().date_naive(),
        };

        let step = engine::transition(&session, message, &user, &ctx);
        self.apply(phone, step).await
    }

    async fn apply(&self, phone: &str, step: Step) -> Result<Reply, ServiceError> {
        let Step {
            next,
            data,
            reply,
            effect,
        } = step;
        let committed = Session { state: next, data };

        match effect {
            Effect::None => {
                self.sessions.put(phone, committed);
                Ok(reply)
            }
            Effect::SaveProfile { update } => match self.update_profile(phone, update).await {
                Ok(_) => {
                    self.sessions.put(phone, committed);
                    Ok(reply)
                }
                Err(e) => {
                    log::warn!("Profile update failed for {}: {}", phone, e);
                    Ok(messages::profile_save_error())
                }
            },
            Effect::FetchStats => {
                self.sessions.put(phone, committed);
                match self.get_stats(phone).await {
                    Ok(stats) => Ok(messages::stats_reply(&stats, &self.public_url)),
                    Err(e) => {
                        log::warn!("Stats unavailable for {}: {}", phone, e);
                        Ok(reply)
                    }
                }
            }
            Effect::FetchDashboard => {
                self.sessions.put(phone, committed);
                match self.get_dashboard(phone).await {
                    Ok(dashboard) => Ok(messages::dashboard_reply(&dashboard, &self.public_url)),
                    Err(e) => {
                        log::warn!("Dashboard unavailable for {}: {}", phone, e);
                        Ok(reply)
                    }
                }
            }
            Effect::FetchHistory => {
                self.sessions.put(phone, committed);
                match self.get_history(phone).await {
                    Ok(receipts) => Ok(messages::history_reply(&receipts, &self.public_url)),
                    Err(e) => {
                        log::warn!("History unavailable for {}: {}", phone, e);
                        Ok(reply)
                    }
                }
            }
            Effect::FetchReport => {
                self.sessions.put(phone, committed);
                match self.get_report(phone).await {
                    Ok(report) => Ok(messages::report_reply(&report, &self.public_url)),
                    Err(e) => {
                        log::warn!("Report unavailable for {}: {}", phone, e);
                        Ok(reply)
                    }
                }
            }
            Effect::Generate { draft } => match self.generate(phone, draft).await {
                Ok(receipt) => {
                    self.sessions.put(phone, committed);
                    Ok(messages::success(&receipt))
                }
                Err(ServiceError::QuotaExceeded {
                    usage,
                    limit,
                    plan_name,
                }) => {
                    self.sessions.put(phone, Session::default());
                    Ok(messages::quota_exceeded(usage, limit, &plan_name, &self.public_url))
                }
                Err(e) => {
                    log::error!("Receipt generation failed for {}: {}", phone, e);
                    Ok(reply)
                }
            },
        }
    }

    async fn deliver(&self, to: &str, reply: Reply) {
        let request = OutboundRequest::Deliver {
            to: to.to_string(),
            reply,
            response: None,
        };
        if let Err(e) = self.outbound_channel.send(request).await {
            log::error!("Failed to queue outbound message for {}: {}", to, e);
        }
    }

    async fn create_or_get_user(&self, phone: &str) -> Result<User, ServiceError> {
        let (user_tx, user_rx) = oneshot::channel();
        self.user_channel
            .send(UserRequest::CreateOrGet {
                phone: phone.to_string(),
                response: user_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?;

        user_rx
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?
    }

    async fn update_profile(&self, phone: &str, update: ProfileUpdate) -> Result<User, ServiceError> {
        let (user_tx, user_rx) = oneshot::channel();
        self.user_channel
            .send(UserRequest::UpdateProfile {
                phone: phone.to_string(),
                update,
                response: user_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?;

        user_rx
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?
    }

    async fn get_stats(&self, phone: &str) -> Result<UserStats, ServiceError> {
        let (stats_tx, stats_rx) = oneshot::channel();
        self.user_channel
            .send(UserRequest::GetStats {
                phone: phone.to_string(),
                response: stats_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?;

        stats_rx
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?
    }

    async fn get_dashboard(&self, phone: &str) -> Result<Dashboard, ServiceError> {
        let (dashboard_tx, dashboard_rx) = oneshot::channel();
        self.analytics_channel
            .send(AnalyticsRequest::Dashboard {
                phone: phone.to_string(),
                response: dashboard_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?;

        dashboard_rx
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?
    }

    async fn get_history(&self, phone: &str) -> Result<Vec<Receipt>, ServiceError> {
        let (history_tx, history_rx) = oneshot::channel();
        self.receipt_channel
            .send(ReceiptRequest::History {
                phone: phone.to_string(),
                limit: 5,
                response: history_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?;

        history_rx
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?
    }

    async fn get_report(&self, phone: &str) -> Result<FinancialReport, ServiceError> {
        let (report_tx, report_rx) = oneshot::channel();
        self.analytics_channel
            .send(AnalyticsRequest::FinancialReport {
                phone: phone.to_string(),
                response: report_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?;

        report_rx
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?
    }

    async fn generate(
        &self,
        phone: &str,
        draft: ReceiptDraft,
    ) -> Result<GeneratedReceipt, ServiceError> {
        let (receipt_tx, receipt_rx) = oneshot::channel();
        self.receipt_channel
            .send(ReceiptRequest::Generate {
                phone: phone.to_string(),
                draft,
                via: "whatsapp".to_string(),
                response: receipt_tx,
            })
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?;

        receipt_rx
            .await
            .map_err(|e| ServiceError::Communication("Conversation".to_string(), e.to_string()))?
    }
}

#[async_trait]
impl RequestHandler<ConversationRequest> for ConversationRequestHandler {
    async fn handle_request(&self, request: ConversationRequest) {
        match request {
            ConversationRequest::Inbound { message } => {
                self.handle_inbound(message).await;
            }
        }
    }
}

pub struct ConversationService;

impl ConversationService {
    pub fn new() -> Self {
        ConversationService {}
    }
}

#[async_trait]
impl Service<ConversationRequest, ConversationRequestHandler> for ConversationService {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use crate::models::sessions::ConversationState;

    const PHONE: &str = "+5511988887777";

    #[derive(Clone, Copy)]
    enum GenerateMode {
        Succeed,
        QuotaExceeded,
        RenderFailed,
    }

    struct Fixture {
        handler: ConversationRequestHandler,
        outbound_rx: mpsc::Receiver<OutboundRequest>,
        users: Arc<StdMutex<HashMap<String, User>>>,
        generated: Arc<StdMutex<Vec<ReceiptDraft>>>,
        sessions: Arc<SessionStore>,
    }

    fn new_user(phone: &str) -> User {
        let now = chrono::Local::now().naive_local();
        User {
            phone: phone.to_string(),
            full_name: None,
            cpf_cnpj: None,
            plan: "FREE".to_string(),
            subscription_status: "active".to_string(),
            receipts_used: 0,
            last_receipt_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn complete_user(phone: &str) -> User {
        let mut user = new_user(phone);
        user.full_name = Some("Maria Silva".to_string());
        user.cpf_cnpj = Some("123.456.789-00".to_string());
        user
    }

    fn spawn_fake_user_service(
        mut rx: mpsc::Receiver<UserRequest>,
        users: Arc<StdMutex<HashMap<String, User>>>,
    ) {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    UserRequest::CreateOrGet { phone, response } => {
                        let user = users
                            .lock()
                            .unwrap()
                            .entry(phone.clone())
                            .or_insert_with(|| new_user(&phone))
                            .clone();
                        let _ = response.send(Ok(user));
                    }
                    UserRequest::Get { phone, response } => {
                        let user = users.lock().unwrap().get(&phone).cloned();
                        let _ = response.send(Ok(user));
                    }
                    UserRequest::UpdateProfile {
                        phone,
                        update,
                        response,
                    } => {
                        let mut map = users.lock().unwrap();
                        match map.get_mut(&phone) {
                            Some(user) => {
                                if let Some(name) = update.full_name {
                                    user.full_name = Some(name);
                                }
                                if let Some(document) = update.cpf_cnpj {
                                    user.cpf_cnpj = Some(document);
                                }
                                let _ = response.send(Ok(user.clone()));
                            }
                            None => {
                                let _ = response.send(Err(ServiceError::UserNotFound(phone)));
                            }
                        }
                    }
                    UserRequest::UpdateSubscription { phone, response, .. } => {
                        let _ = response.send(Err(ServiceError::UserNotFound(phone)));
                    }
                    UserRequest::GetStats { response, .. } => {
                        let _ = response.send(Ok(UserStats {
                            plan: "FREE".to_string(),
                            plan_name: "Plano Gratuito".to_string(),
                            current_month_usage: 2,
                            monthly_limit: Some(5),
                            remaining_receipts: Some(3),
                            subscription_status: "active".to_string(),
                            total_receipts: 2,
                        }));
                    }
                }
            }
        });
    }

    fn spawn_fake_receipt_service(
        mut rx: mpsc::Receiver<ReceiptRequest>,
        generated: Arc<StdMutex<Vec<ReceiptDraft>>>,
        mode: GenerateMode,
    ) {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    ReceiptRequest::Generate {
                        draft, response, ..
                    } => {
                        let result = match mode {
                            GenerateMode::Succeed => {
                                let mut log = generated.lock().unwrap();
                                log.push(draft);
                                let count = log.len();
                                Ok(GeneratedReceipt {
                                    receipt_id: format!("receipt-{count}"),
                                    receipt_number: format!("{count:03}/2025"),
                                    download_url: format!(
                                        "https://recibolegal.com.br/api/receipts/download/receipt-{count}"
                                    ),
                                })
                            }
                            GenerateMode::QuotaExceeded => Err(ServiceError::QuotaExceeded {
                                usage: 5,
                                limit: 5,
                                plan_name: "Plano Gratuito".to_string(),
                            }),
                            GenerateMode::RenderFailed => {
                                Err(ServiceError::Render("renderer timed out".to_string()))
                            }
                        };
                        let _ = response.send(result);
                    }
                    ReceiptRequest::Get { response, .. } => {
                        let _ = response.send(Ok(None));
                    }
                    ReceiptRequest::History { response, .. } => {
                        let _ = response.send(Ok(Vec::new()));
                    }
                    ReceiptRequest::Void { response, .. } => {
                        let _ = response.send(Err(ServiceError::Persistence("void".to_string())));
                    }
                }
            }
        });
    }

    fn spawn_fake_analytics_service(mut rx: mpsc::Receiver<AnalyticsRequest>) {
        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    AnalyticsRequest::Dashboard { response, .. } => {
                        let _ = response
                            .send(Err(ServiceError::Persistence("unavailable".to_string())));
                    }
                    AnalyticsRequest::FinancialReport { response, .. } => {
                        let _ = response
                            .send(Err(ServiceError::Persistence("unavailable".to_string())));
                    }
                }
            }
        });
    }

    fn fixture(mode: GenerateMode) -> Fixture {
        let (user_tx, user_rx) = mpsc::channel(64);
        let (receipt_tx, receipt_rx) = mpsc::channel(64);
        let (analytics_tx, analytics_rx) = mpsc::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);

        let users = Arc::new(StdMutex::new(HashMap::new()));
        let generated = Arc::new(StdMutex::new(Vec::new()));

        spawn_fake_user_service(user_rx, Arc::clone(&users));
        spawn_fake_receipt_service(receipt_rx, Arc::clone(&generated), mode);
        spawn_fake_analytics_service(analytics_rx);

        let sessions = Arc::new(SessionStore::new(Duration::from_secs(60)));
        let handler = ConversationRequestHandler::new(
            Arc::clone(&sessions),
            user_tx,
            receipt_tx,
            analytics_tx,
            outbound_tx,
            "https://recibolegal.com.br".to_string(),
        );

        Fixture {
            handler,
            outbound_rx,
            users,
            generated,
            sessions,
        }
    }

    async fn send(fixture: &mut Fixture, body: &str) -> String {
        fixture
            .handler
            .handle_request(ConversationRequest::Inbound {
                message: InboundMessage {
                    from: format!("whatsapp:{PHONE}"),
                    text: body.to_string(),
                    button_id: None,
                },
            })
            .await;

        match fixture.outbound_rx.recv().await {
            Some(OutboundRequest::Deliver { reply, .. }) => reply.text().to_string(),
            None => panic!("no outbound reply"),
        }
    }

    fn confirming_session() -> Session {
        Session {
            state: ConversationState::Confirming,
            data: crate::models::sessions::SessionData {
                user_full_name: None,
                draft: ReceiptDraft {
                    client_name: Some("Empresa X".to_string()),
                    client_document: Some("12.345.678/0001-90".to_string()),
                    service_name: Some("Consultoria".to_string()),
                    service_description: Some(String::new()),
                    amount: Some("100.00".to_string()),
                    date: Some("23/07/2025".to_string()),
                },
            },
        }
    }

    #[tokio::test]
    async fn full_receipt_flow_end_to_end() {
        let mut fx = fixture(GenerateMode::Succeed);

        let reply = send(&mut fx, "oi").await;
        assert!(reply.contains("primeiro acesso"));

        let reply = send(&mut fx, "Maria Silva").await;
        assert!(reply.contains("CPF ou CNPJ"));

        let reply = send(&mut fx, "123.456.789-00").await;
        assert!(reply.contains("Perfil configurado"));
        assert!(fx.users.lock().unwrap().get(PHONE).unwrap().profile_complete());

        let reply = send(&mut fx, "Empresa X").await;
        assert!(reply.contains("CPF ou CNPJ"));

        let reply = send(&mut fx, "12.345.678/0001-90").await;
        assert!(reply.contains("nome do serviço"));

        let reply = send(&mut fx, "Consultoria em Marketing Digital").await;
        assert!(reply.contains("descrição"));

        let reply = send(&mut fx, "pular").await;
        assert!(reply.contains("valor"));

        let reply = send(&mut fx, "1500,50").await;
        assert!(reply.contains("data"));

        let reply = send(&mut fx, "hoje").await;
        assert!(reply.contains("Conferindo"));
        assert!(reply.contains("1500.50"));

        let reply = send(&mut fx, "sim").await;
        assert!(reply.contains("001/2025"));
        assert!(reply.contains("criado com sucesso"));

        {
            let drafts = fx.generated.lock().unwrap();
            assert_eq!(drafts.len(), 1);
            assert_eq!(drafts[0].client_name.as_deref(), Some("Empresa X"));
            assert_eq!(drafts[0].amount.as_deref(), Some("1500.50"));
            assert_eq!(drafts[0].service_description.as_deref(), Some(""));
        }

        let session = fx.sessions.get(PHONE).unwrap();
        assert_eq!(session.state, ConversationState::Completed);
    }

    #[tokio::test]
    async fn quota_exhaustion_resets_session_with_upgrade_message() {
        let mut fx = fixture(GenerateMode::QuotaExceeded);
        fx.users
            .lock()
            .unwrap()
            .insert(PHONE.to_string(), complete_user(PHONE));
        fx.sessions.put(PHONE, confirming_session());

        let reply = send(&mut fx, "sim").await;
        assert!(reply.contains("Limite atingido"));
        assert!(reply.contains("/plans"));
        assert!(fx.generated.lock().unwrap().is_empty());
        assert_eq!(fx.sessions.get(PHONE).unwrap().state, ConversationState::Start);
    }

    #[tokio::test]
    async fn generation_failure_keeps_the_confirming_state() {
        let mut fx = fixture(GenerateMode::RenderFailed);
        fx.users
            .lock()
            .unwrap()
            .insert(PHONE.to_string(), complete_user(PHONE));
        fx.sessions.put(PHONE, confirming_session());

        let reply = send(&mut fx, "sim").await;
        assert!(reply.contains("Ops"));

        // The prior snapshot stays authoritative; the user can retry "sim".
        let session = fx.sessions.get(PHONE).unwrap();
        assert_eq!(session.state, ConversationState::Confirming);
        assert_eq!(session.data.draft.client_name.as_deref(), Some("Empresa X"));
    }

    #[tokio::test]
    async fn status_reply_uses_fetched_stats() {
        let mut fx = fixture(GenerateMode::Succeed);
        fx.users
            .lock()
            .unwrap()
            .insert(PHONE.to_string(), complete_user(PHONE));

        let reply = send(&mut fx, "status").await;
        assert!(reply.contains("2/5"));
        assert!(reply.contains("Plano Gratuito"));
    }

    #[tokio::test]
    async fn dashboard_failure_falls_back_gracefully() {
        let mut fx = fixture(GenerateMode::Succeed);
        fx.users
            .lock()
            .unwrap()
            .insert(PHONE.to_string(), complete_user(PHONE));

        let reply = send(&mut fx, "dashboard").await;
        assert!(reply.contains("indisponível"));
    }
}
