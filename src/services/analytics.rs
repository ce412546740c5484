use async_trait::async_trait;
use chrono::Local;
use sqlx::PgPool;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::analytics::{Dashboard, DashboardSummary, FinancialReport};
use crate::quota;
use crate::repositories::receipts::ReceiptRepository;

/// Keyword dictionary for automatic service categorization. First matching
/// category wins; anything unmatched lands in "outros".
const CATEGORIES: &[(&str, &[&str])] = &[
    ("consultoria", &["consultoria", "consulta", "advisory", "estratégia", "planejamento"]),
    ("desenvolvimento", &["desenvolvimento", "programação", "software", "app", "site", "sistema", "código"]),
    ("design", &["design", "logo", "identidade", "visual", "gráfico", "layout", "arte"]),
    ("marketing", &["marketing", "publicidade", "social media", "ads", "propaganda", "divulgação"]),
    ("educacao", &["curso", "aula", "treinamento", "workshop", "palestra", "ensino", "educação"]),
    ("juridico", &["jurídico", "advocacia", "direito", "legal", "processo"]),
    ("contabilidade", &["contabilidade", "contábil", "fiscal", "imposto", "declaração"]),
    ("saude", &["saúde", "médico", "consulta médica", "exame", "tratamento", "terapia"]),
    ("beleza", &["beleza", "estética", "cabelo", "maquiagem", "manicure", "massagem"]),
    ("construcao", &["construção", "reforma", "engenharia", "arquitetura", "obra", "reparo"]),
    ("transporte", &["transporte", "frete", "mudança", "entrega", "logística"]),
    ("manutencao", &["manutenção", "conserto", "instalação", "assistência técnica"]),
];

pub fn categorize_service(service_name: &str) -> &'static str {
    let service = service_name.to_lowercase();

    CATEGORIES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| service.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or("outros")
}

pub enum AnalyticsRequest {
    Dashboard {
        phone: String,
        response: oneshot::Sender<Result<Dashboard, ServiceError>>,
    },
    FinancialReport {
        phone: String,
        response: oneshot::Sender<Result<FinancialReport, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct AnalyticsRequestHandler {
    repository: ReceiptRepository,
}

impl AnalyticsRequestHandler {
    pub fn new(sql_conn: PgPool) -> Self {
        let repository = ReceiptRepository::new(sql_conn);

        AnalyticsRequestHandler { repository }
    }

    async fn dashboard(&self, phone: &str) -> Result<Dashboard, ServiceError> {
        let month_start = quota::month_start(Local::now());
        let ((total_receipts, total_amount), (month_receipts, month_amount), top_services, top_clients, recent_receipts) =
            futures_util::try_join!(
                self.repository.totals(phone),
                self.repository.totals_since(phone, month_start),
                self.repository.by_service(phone, 5),
                self.repository.by_client(phone, 5),
                self.repository.recent(phone, 5),
            )
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        Ok(Dashboard {
            summary: DashboardSummary {
                total_receipts,
                total_amount_in_cents: total_amount,
                avg_receipt_in_cents: average(total_amount, total_receipts),
                this_month_receipts: month_receipts,
                this_month_amount_in_cents: month_amount,
            },
            top_services,
            top_clients,
            recent_receipts,
        })
    }

    async fn financial_report(&self, phone: &str) -> Result<FinancialReport, ServiceError> {
        let ((total_receipts, total_amount), by_service, by_client) = futures_util::try_join!(
            self.repository.totals(phone),
            self.repository.by_service(phone, 50),
            self.repository.by_client(phone, 50),
        )
        .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        Ok(FinancialReport {
            total_receipts,
            total_amount_in_cents: total_amount,
            avg_receipt_in_cents: average(total_amount, total_receipts),
            by_service,
            by_client,
        })
    }
}

fn average(total_amount: i64, count: i64) -> i64 {
    if count > 0 {
        total_amount / count
    } else {
        0
    }
}

#[async_trait]
impl RequestHandler<AnalyticsRequest> for AnalyticsRequestHandler {
    async fn handle_request(&self, request: AnalyticsRequest) {
        match request {
            AnalyticsRequest::Dashboard { phone, response } => {
                let dashboard = self.dashboard(&phone).await;
                let _ = response.send(dashboard);
            }
            AnalyticsRequest::FinancialReport { phone, response } => {
                let report = self.financial_report(&phone).await;
                let _ = response.send(report);
            }
        }
    }
}

pub struct AnalyticsService;

impl AnalyticsService {
    pub fn new() -> Self {
        AnalyticsService {}
    }
}

#[async_trait]
impl Service<AnalyticsRequest, AnalyticsRequestHandler> for AnalyticsService {}
