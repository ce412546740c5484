use serde::{Deserialize, Serialize};

use super::plans::Plan;

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct User {
    pub phone: String,
    pub full_name: Option<String>,
    pub cpf_cnpj: Option<String>,
    pub plan: String,
    pub subscription_status: String,
    pub receipts_used: i32,
    pub last_receipt_at: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl User {
    pub fn plan(&self) -> Plan {
        Plan::from_id(&self.plan)
    }

    /// Derived flag: both provider identity fields present and non-empty.
    pub fn profile_complete(&self) -> bool {
        let filled = |field: &Option<String>| {
            field.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
        };
        filled(&self.full_name) && filled(&self.cpf_cnpj)
    }

    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Usuário")
    }
}

/// Partial profile update; `None` keeps the stored value.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub cpf_cnpj: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub plan: String,
    pub plan_name: String,
    pub current_month_usage: i64,
    /// `None` means unlimited.
    pub monthly_limit: Option<i64>,
    pub remaining_receipts: Option<i64>,
    pub subscription_status: String,
    pub total_receipts: i32,
}
