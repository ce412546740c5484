use serde::Serialize;

use super::receipts::Receipt;

/// GROUP BY row shared by the service and client breakdowns.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub name: String,
    pub count: i64,
    pub amount_in_cents: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_receipts: i64,
    pub total_amount_in_cents: i64,
    pub avg_receipt_in_cents: i64,
    pub this_month_receipts: i64,
    pub this_month_amount_in_cents: i64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub summary: DashboardSummary,
    pub top_services: Vec<Breakdown>,
    pub top_clients: Vec<Breakdown>,
    pub recent_receipts: Vec<Receipt>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub total_receipts: i64,
    pub total_amount_in_cents: i64,
    pub avg_receipt_in_cents: i64,
    pub by_service: Vec<Breakdown>,
    pub by_client: Vec<Breakdown>,
}
