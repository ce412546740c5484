use anyhow::bail;
use chrono::NaiveDateTime;
use sqlx::PgPool;

use crate::models::analytics::Breakdown;
use crate::models::receipts::{NewReceipt, Receipt};

#[derive(Clone)]
pub struct ReceiptRepository {
    conn: PgPool,
}

impl ReceiptRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, receipt: &NewReceipt) -> Result<Receipt, anyhow::Error> {
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts
            (id, user_phone, receipt_number, client_name, client_document,
             service_name, service_description, amount_in_cents, service_date,
             service_category, document_hash, pdf_url, generated_via)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.user_phone)
        .bind(&receipt.receipt_number)
        .bind(&receipt.client_name)
        .bind(&receipt.client_document)
        .bind(&receipt.service_name)
        .bind(&receipt.service_description)
        .bind(receipt.amount_in_cents)
        .bind(&receipt.service_date)
        .bind(&receipt.service_category)
        .bind(&receipt.document_hash)
        .bind(&receipt.pdf_url)
        .bind(&receipt.generated_via)
        .fetch_one(&self.conn)
        .await?;

        Ok(receipt)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Receipt>, anyhow::Error> {
        let receipt = sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(receipt)
    }

    pub async fn recent(&self, phone: &str, limit: i64) -> Result<Vec<Receipt>, anyhow::Error> {
        let receipts = sqlx::query_as::<_, Receipt>(
            "SELECT * FROM receipts WHERE user_phone = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(phone)
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        Ok(receipts)
    }

    pub async fn update_status(&self, id: &str, status: &str) -> Result<Receipt, anyhow::Error> {
        let receipt = sqlx::query_as::<_, Receipt>(
            "UPDATE receipts SET status = $1 WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(id)
        .fetch_optional(&self.conn)
        .await?;

        match receipt {
            Some(receipt) => Ok(receipt),
            None => bail!("Receipt not found"),
        }
    }

    pub async fn totals(&self, phone: &str) -> Result<(i64, i64), anyhow::Error> {
        let totals: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(1), COALESCE(SUM(amount_in_cents), 0)::BIGINT FROM receipts WHERE user_phone = $1",
        )
        .bind(phone)
        .fetch_one(&self.conn)
        .await?;

        Ok(totals)
    }

    pub async fn totals_since(
        &self,
        phone: &str,
        since: NaiveDateTime,
    ) -> Result<(i64, i64), anyhow::Error> {
        let totals: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(1), COALESCE(SUM(amount_in_cents), 0)::BIGINT FROM receipts WHERE user_phone = $1 AND created_at >= $2",
        )
        .bind(phone)
        .bind(since)
        .fetch_one(&self.conn)
        .await?;

        Ok(totals)
    }

    pub async fn by_service(&self, phone: &str, limit: i64) -> Result<Vec<Breakdown>, anyhow::Error> {
        let rows = sqlx::query_as::<_, Breakdown>(
            r#"
            SELECT service_name AS name, COUNT(1) AS count,
                   COALESCE(SUM(amount_in_cents), 0)::BIGINT AS amount_in_cents
            FROM receipts
            WHERE user_phone = $1
            GROUP BY service_name
            ORDER BY count DESC, amount_in_cents DESC
            LIMIT $2
            "#,
        )
        .bind(phone)
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        Ok(rows)
    }

    pub async fn by_client(&self, phone: &str, limit: i64) -> Result<Vec<Breakdown>, anyhow::Error> {
        let rows = sqlx::query_as::<_, Breakdown>(
            r#"
            SELECT client_name AS name, COUNT(1) AS count,
                   COALESCE(SUM(amount_in_cents), 0)::BIGINT AS amount_in_cents
            FROM receipts
            WHERE user_phone = $1
            GROUP BY client_name
            ORDER BY count DESC, amount_in_cents DESC
            LIMIT $2
            "#,
        )
        .bind(phone)
        .bind(limit)
        .fetch_all(&self.conn)
        .await?;

        Ok(rows)
    }
}
