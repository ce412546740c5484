use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::users::{ProfileUpdate, User, UserStats};
use crate::quota;
use crate::repositories::users::UserRepository;

pub enum UserRequest {
    CreateOrGet {
        phone: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    Get {
        phone: String,
        response: oneshot::Sender<Result<Option<User>, ServiceError>>,
    },
    UpdateProfile {
        phone: String,
        update: ProfileUpdate,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    UpdateSubscription {
        phone: String,
        plan: String,
        status: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    GetStats {
        phone: String,
        response: oneshot::Sender<Result<UserStats, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
}

impl UserRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = UserRepository::new(sql_conn);

        UserRequestHandler { repository }
    }

    async fn create_or_get(&self, phone: &str) -> Result<User, ServiceError> {
        self.repository
            .create_or_get(phone)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))
    }

    async fn get(&self, phone: &str) -> Result<Option<User>, ServiceError> {
        self.repository
            .get_by_phone(phone)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))
    }

    async fn update_profile(
        &self,
        phone: &str,
        update: &ProfileUpdate,
    ) -> Result<User, ServiceError> {
        self.repository
            .update_profile(phone, update)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))
    }

    async fn update_subscription(
        &self,
        phone: &str,
        plan: &str,
        status: &str,
    ) -> Result<User, ServiceError> {
        self.repository
            .update_subscription(phone, plan, status)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))
    }

    async fn get_stats(&self, phone: &str) -> Result<UserStats, ServiceError> {
        let user = self
            .repository
            .get_by_phone(phone)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?
            .ok_or_else(|| ServiceError::UserNotFound(phone.to_string()))?;

        let current_month_usage = self
            .repository
            .current_month_usage(phone)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        let plan = user.plan();

        Ok(UserStats {
            plan: plan.id().to_string(),
            plan_name: plan.name().to_string(),
            current_month_usage,
            monthly_limit: plan.monthly_limit(),
            remaining_receipts: quota::remaining(plan, current_month_usage),
            subscription_status: user.subscription_status,
            total_receipts: user.receipts_used,
        })
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::CreateOrGet { phone, response } => {
                let user = self.create_or_get(&phone).await;
                let _ = response.send(user);
            }
            UserRequest::Get { phone, response } => {
                let user = self.get(&phone).await;
                let _ = response.send(user);
            }
            UserRequest::UpdateProfile {
                phone,
                update,
                response,
            } => {
                let user = self.update_profile(&phone, &update).await;
                let _ = response.send(user);
            }
            UserRequest::UpdateSubscription {
                phone,
                plan,
                status,
                response,
            } => {
                let user = self.update_subscription(&phone, &plan, &status).await;
                let _ = response.send(user);
            }
            UserRequest::GetStats { phone, response } => {
                let stats = self.get_stats(&phone).await;
                let _ = response.send(stats);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
