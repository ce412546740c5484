use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::renderer::{RenderRequest, RendererClient};
use super::{analytics, RequestHandler, Service, ServiceError};
use crate::models::receipts::{GeneratedReceipt, NewReceipt, Receipt, ReceiptDraft};
use crate::quota;
use crate::repositories::receipts::ReceiptRepository;
use crate::repositories::users::UserRepository;

pub enum ReceiptRequest {
    Generate {
        phone: String,
        draft: ReceiptDraft,
        via: String,
        response: oneshot::Sender<Result<GeneratedReceipt, ServiceError>>,
    },
    Get {
        id: String,
        response: oneshot::Sender<Result<Option<Receipt>, ServiceError>>,
    },
    History {
        phone: String,
        limit: i64,
        response: oneshot::Sender<Result<Vec<Receipt>, ServiceError>>,
    },
    Void {
        id: String,
        response: oneshot::Sender<Result<Receipt, ServiceError>>,
    },
}

struct ValidatedDraft {
    client_name: String,
    client_document: String,
    service_name: String,
    service_description: String,
    amount: String,
    amount_in_cents: i64,
    date: String,
}

#[derive(Clone)]
pub struct ReceiptRequestHandler {
    users: UserRepository,
    receipts: ReceiptRepository,
    renderer: RendererClient,
    public_url: String,
}

impl ReceiptRequestHandler {
    pub fn new(sql_conn: PgPool, renderer: RendererClient, public_url: String) -> Self {
        ReceiptRequestHandler {
            users: UserRepository::new(sql_conn.clone()),
            receipts: ReceiptRepository::new(sql_conn),
            renderer,
            public_url,
        }
    }

    /// The generation pipeline. Quota is re-checked here even though the
    /// conversation already did, to close the race between confirmation
    /// and generation; everything that can fail cheaply happens before
    /// the renderer is invoked, and usage is recorded only after the
    /// receipt row is persisted.
    async fn generate(
        &self,
        phone: &str,
        draft: &ReceiptDraft,
        via: &str,
    ) -> Result<GeneratedReceipt, ServiceError> {
        let draft = validate_draft(draft)?;

        let user = self
            .users
            .create_or_get(phone)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        let usage = self
            .users
            .current_month_usage(phone)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        let plan = user.plan();
        if !quota::can_generate(plan, usage) {
            return Err(ServiceError::QuotaExceeded {
                usage,
                limit: plan.monthly_limit().unwrap_or(0),
                plan_name: plan.name().to_string(),
            });
        }

        let now = Local::now();
        let receipt_number = match self.users.next_receipt_seq(phone, now.year()).await {
            Ok(seq) => format_receipt_number(seq, now.year()),
            Err(e) => {
                log::warn!("Receipt counter unavailable for {}, using fallback: {}", phone, e);
                fallback_receipt_number(now)
            }
        };

        let service_category = analytics::categorize_service(&draft.service_name);
        let document_hash = document_hash(
            &draft.client_name,
            &draft.client_document,
            &draft.service_name,
            &draft.amount,
            &draft.date,
        );
        let receipt_id = Uuid::new_v4().hyphenated().to_string();

        let pdf_url = self
            .renderer
            .render(&RenderRequest {
                receipt_id: &receipt_id,
                receipt_number: &receipt_number,
                issuer_name: user.full_name.as_deref().unwrap_or(""),
                issuer_document: user.cpf_cnpj.as_deref().unwrap_or(""),
                client_name: &draft.client_name,
                client_document: &draft.client_document,
                service_name: &draft.service_name,
                service_description: &draft.service_description,
                amount: &draft.amount,
                date: &draft.date,
                document_hash: &document_hash,
            })
            .await
            .map_err(|e| ServiceError::Render(e.to_string()))?;

        let receipt = self
            .receipts
            .insert(&NewReceipt {
                id: receipt_id,
                user_phone: phone.to_string(),
                receipt_number,
                client_name: draft.client_name,
                client_document: draft.client_document,
                service_name: draft.service_name,
                service_description: draft.service_description,
                amount_in_cents: draft.amount_in_cents,
                service_date: draft.date,
                service_category: service_category.to_string(),
                document_hash,
                pdf_url,
                generated_via: via.to_string(),
            })
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        if let Err(e) = self.users.record_usage(phone, &receipt.id).await {
            // The receipt exists; losing the usage event only under-counts
            // the quota, so the generation still succeeds.
            log::error!("Receipt {} persisted but usage not recorded: {}", receipt.id, e);
        }

        log::info!("Receipt {} generated for {}.", receipt.receipt_number, phone);

        Ok(GeneratedReceipt {
            download_url: format!("{}/api/receipts/download/{}", self.public_url, receipt.id),
            receipt_id: receipt.id,
            receipt_number: receipt.receipt_number,
        })
    }

    async fn get(&self, id: &str) -> Result<Option<Receipt>, ServiceError> {
        self.receipts
            .get(id)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))
    }

    async fn history(&self, phone: &str, limit: i64) -> Result<Vec<Receipt>, ServiceError> {
        self.receipts
            .recent(phone, limit)
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))
    }

    async fn void(&self, id: &str) -> Result<Receipt, ServiceError> {
        self.receipts
            .update_status(id, "void")
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))
    }
}

fn validate_draft(draft: &ReceiptDraft) -> Result<ValidatedDraft, ServiceError> {
    let required = |field: &Option<String>, name: &str| -> Result<String, ServiceError> {
        match field.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(ServiceError::Validation(format!("Missing field: {name}"))),
        }
    };

    let amount = required(&draft.amount, "amount")?;
    let amount_in_cents = amount_to_cents(&amount)
        .ok_or_else(|| ServiceError::Validation(format!("Invalid amount: {amount}")))?;

    Ok(ValidatedDraft {
        client_name: required(&draft.client_name, "clientName")?,
        client_document: required(&draft.client_document, "clientDocument")?,
        service_name: required(&draft.service_name, "serviceName")?,
        service_description: draft
            .service_description
            .clone()
            .unwrap_or_default()
            .trim()
            .to_string(),
        amount,
        amount_in_cents,
        date: required(&draft.date, "date")?,
    })
}

/// "1500.50" -> 150050. Rejects non-positive values.
pub fn amount_to_cents(amount: &str) -> Option<i64> {
    let value: f64 = amount.replace(',', ".").parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    Some((value * 100.0).round() as i64)
}

/// Zero-padded to three digits, growing past 999.
pub fn format_receipt_number(seq: i64, year: i32) -> String {
    format!("{seq:03}/{year}")
}

/// Timestamp-derived stand-in used when the counter store is down. Less
/// pretty than the sequence, still unique enough for a human-facing label;
/// the receipt UUID is the real key.
pub fn fallback_receipt_number(now: DateTime<Local>) -> String {
    let millis = now.timestamp_millis().to_string();
    let suffix = &millis[millis.len().saturating_sub(6)..];
    format!("{}/{}", suffix, now.year())
}

/// Tamper-evidence fingerprint: first 16 hex chars of the SHA-256 of the
/// concatenated receipt fields, uppercased.
pub fn document_hash(
    client_name: &str,
    client_document: &str,
    service_name: &str,
    amount: &str,
    date: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_name.as_bytes());
    hasher.update(client_document.as_bytes());
    hasher.update(service_name.as_bytes());
    hasher.update(amount.as_bytes());
    hasher.update(date.as_bytes());

    let digest = hex::encode(hasher.finalize());
    digest[..16].to_uppercase()
}

#[async_trait]
impl RequestHandler<ReceiptRequest> for ReceiptRequestHandler {
    async fn handle_request(&self, request: ReceiptRequest) {
        match request {
            ReceiptRequest::Generate {
                phone,
                draft,
                via,
                response,
            } => {
                let receipt = self.generate(&phone, &draft, &via).await;
                let _ = response.send(receipt);
            }
            ReceiptRequest::Get { id, response } => {
                let receipt = self.get(&id).await;
                let _ = response.send(receipt);
            }
            ReceiptRequest::History {
                phone,
                limit,
                response,
            } => {
                let receipts = self.history(&phone, limit).await;
                let _ = response.send(receipts);
            }
            ReceiptRequest::Void { id, response } => {
                let receipt = self.void(&id).await;
                let _ = response.send(receipt);
            }
        }
    }
}

pub struct ReceiptService;

impl ReceiptService {
    pub fn new() -> Self {
        ReceiptService {}
    }
}

#[async_trait]
impl Service<ReceiptRequest, ReceiptRequestHandler> for ReceiptService {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn full_draft() -> ReceiptDraft {
        ReceiptDraft {
            client_name: Some("Empresa X".to_string()),
            client_document: Some("12.345.678/0001-90".to_string()),
            service_name: Some("Consultoria".to_string()),
            service_description: Some("".to_string()),
            amount: Some("1500.50".to_string()),
            date: Some("23/07/2025".to_string()),
        }
    }

    #[test]
    fn complete_draft_validates() {
        let draft = validate_draft(&full_draft()).unwrap();
        assert_eq!(draft.amount_in_cents, 150050);
        assert_eq!(draft.client_name, "Empresa X");
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let mut draft = full_draft();
        draft.client_name = None;
        assert!(matches!(
            validate_draft(&draft),
            Err(ServiceError::Validation(_))
        ));

        let mut draft = full_draft();
        draft.service_name = Some("   ".to_string());
        assert!(matches!(
            validate_draft(&draft),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn non_positive_amount_fails_validation() {
        let mut draft = full_draft();
        draft.amount = Some("0".to_string());
        assert!(validate_draft(&draft).is_err());

        draft.amount = Some("-5".to_string());
        assert!(validate_draft(&draft).is_err());
    }

    #[test]
    fn cents_conversion() {
        assert_eq!(amount_to_cents("1500.50"), Some(150050));
        assert_eq!(amount_to_cents("1500,50"), Some(150050));
        assert_eq!(amount_to_cents("0.01"), Some(1));
        assert_eq!(amount_to_cents("abc"), None);
        assert_eq!(amount_to_cents("0"), None);
    }

    #[test]
    fn numbers_are_padded_and_grow() {
        assert_eq!(format_receipt_number(1, 2025), "001/2025");
        assert_eq!(format_receipt_number(42, 2025), "042/2025");
        assert_eq!(format_receipt_number(1000, 2025), "1000/2025");
    }

    #[test]
    fn fallback_number_keeps_the_year() {
        let now = Local.with_ymd_and_hms(2025, 7, 23, 12, 0, 0).unwrap();
        let number = fallback_receipt_number(now);
        assert!(number.ends_with("/2025"));
        let digits = number.trim_end_matches("/2025");
        assert_eq!(digits.len(), 6);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn hash_is_stable_and_input_sensitive() {
        let a = document_hash("Empresa X", "123", "Consultoria", "1500.50", "23/07/2025");
        let b = document_hash("Empresa X", "123", "Consultoria", "1500.50", "23/07/2025");
        let c = document_hash("Empresa Y", "123", "Consultoria", "1500.50", "23/07/2025");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        assert_eq!(a, a.to_uppercase());
    }
}
