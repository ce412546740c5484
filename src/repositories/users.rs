use anyhow::bail;
use chrono::Local;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::users::{ProfileUpdate, User};

#[derive(Clone)]
pub struct UserRepository {
    conn: PgPool,
}

impl UserRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    /// Idempotent: first contact creates the user on the free plan.
    pub async fn create_or_get(&self, phone: &str) -> Result<User, anyhow::Error> {
        sqlx::query("INSERT INTO users (phone) VALUES ($1) ON CONFLICT (phone) DO NOTHING")
            .bind(phone)
            .execute(&self.conn)
            .await?;

        match self.get_by_phone(phone).await? {
            Some(user) => Ok(user),
            None => bail!("User missing right after insert: {}", phone),
        }
    }

    pub async fn get_by_phone(&self, phone: &str) -> Result<Option<User>, anyhow::Error> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.conn)
            .await?;

        Ok(user)
    }

    pub async fn update_profile(
        &self,
        phone: &str,
        update: &ProfileUpdate,
    ) -> Result<User, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET full_name = COALESCE($2, full_name),
                cpf_cnpj = COALESCE($3, cpf_cnpj),
                updated_at = CURRENT_TIMESTAMP
            WHERE phone = $1
            RETURNING *
            "#,
        )
        .bind(phone)
        .bind(update.full_name.as_deref())
        .bind(update.cpf_cnpj.as_deref())
        .fetch_optional(&self.conn)
        .await?;

        match user {
            Some(user) => Ok(user),
            None => bail!("User not found"),
        }
    }

    pub async fn update_subscription(
        &self,
        phone: &str,
        plan: &str,
        status: &str,
    ) -> Result<User, anyhow::Error> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET plan = $2, subscription_status = $3, updated_at = CURRENT_TIMESTAMP WHERE phone = $1 RETURNING *",
        )
        .bind(phone)
        .bind(plan)
        .bind(status)
        .fetch_optional(&self.conn)
        .await?;

        match user {
            Some(user) => Ok(user),
            None => bail!("User not found"),
        }
    }

    /// Generation events inside the current local calendar month.
    pub async fn current_month_usage(&self, phone: &str) -> Result<i64, anyhow::Error> {
        let since = crate::quota::month_start(Local::now());
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM usage_events WHERE user_phone = $1 AND created_at >= $2",
        )
        .bind(phone)
        .bind(since)
        .fetch_one(&self.conn)
        .await?;

        Ok(count)
    }

    /// Records one generation event and bumps the lifetime counter. Called
    /// only after the receipt row has been persisted.
    pub async fn record_usage(&self, phone: &str, receipt_id: &str) -> Result<(), anyhow::Error> {
        let event_id = Uuid::new_v4().hyphenated().to_string();
        sqlx::query("INSERT INTO usage_events (id, user_phone, receipt_id) VALUES ($1, $2, $3)")
            .bind(&event_id)
            .bind(phone)
            .bind(receipt_id)
            .execute(&self.conn)
            .await?;

        sqlx::query(
            "UPDATE users SET receipts_used = receipts_used + 1, last_receipt_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE phone = $1",
        )
        .bind(phone)
        .execute(&self.conn)
        .await?;

        Ok(())
    }

    /// Next value of the per-(user, year) sequence. The upsert is a single
    /// statement, so concurrent callers never observe the same value.
    pub async fn next_receipt_seq(&self, phone: &str, year: i32) -> Result<i64, anyhow::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO receipt_counters (user_phone, year, count)
            VALUES ($1, $2, 1)
            ON CONFLICT (user_phone, year)
            DO UPDATE SET count = receipt_counters.count + 1
            RETURNING count
            "#,
        )
        .bind(phone)
        .bind(year)
        .fetch_one(&self.conn)
        .await?;

        Ok(count)
    }
}
