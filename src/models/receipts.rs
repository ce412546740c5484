use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Receipt {
    pub id: String,
    pub user_phone: String,
    pub receipt_number: String,
    pub client_name: String,
    pub client_document: String,
    pub service_name: String,
    pub service_description: String,
    pub amount_in_cents: i64,
    pub service_date: String,
    pub service_category: String,
    pub document_hash: String,
    pub pdf_url: String,
    pub generated_via: String,
    pub currency: String,
    pub status: String,
    pub created_at: chrono::NaiveDateTime,
}

pub struct NewReceipt {
    pub id: String,
    pub user_phone: String,
    pub receipt_number: String,
    pub client_name: String,
    pub client_document: String,
    pub service_name: String,
    pub service_description: String,
    pub amount_in_cents: i64,
    pub service_date: String,
    pub service_category: String,
    pub document_hash: String,
    pub pdf_url: String,
    pub generated_via: String,
}

/// Draft collected by the conversation flow. The amount is a fixed
/// 2-decimal-place string, the date a `DD/MM/YYYY` string.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ReceiptDraft {
    pub client_name: Option<String>,
    pub client_document: Option<String>,
    pub service_name: Option<String>,
    pub service_description: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReceipt {
    pub receipt_id: String,
    pub receipt_number: String,
    pub download_url: String,
}

/// Payload of the direct generation endpoint, field names as the
/// dashboard posts them.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub user_phone: String,
    pub client_name: String,
    pub client_document: String,
    pub service_name: String,
    #[serde(default)]
    pub service_description: String,
    pub amount: String,
    pub date: String,
}

impl GenerateRequest {
    pub fn into_draft(self) -> (String, ReceiptDraft) {
        let draft = ReceiptDraft {
            client_name: Some(self.client_name),
            client_document: Some(self.client_document),
            service_name: Some(self.service_name),
            service_description: Some(self.service_description),
            amount: Some(self.amount),
            date: Some(self.date),
        };
        (self.user_phone, draft)
    }
}
