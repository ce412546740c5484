use crate::models::analytics::{Dashboard, FinancialReport};
use crate::models::receipts::{GeneratedReceipt, Receipt, ReceiptDraft};
use crate::models::users::{User, UserStats};
use crate::models::whatsapp::{Reply, ReplyOption};

// Interactive selection ids, shared with the engine's token mapping.
pub const BTN_CONFIRM_YES: &str = "confirm_yes";
pub const BTN_CONFIRM_NO: &str = "confirm_no";
pub const BTN_SKIP_DESCRIPTION: &str = "skip_description";
pub const BTN_EDIT_NAME: &str = "edit_name";
pub const BTN_EDIT_DOCUMENT: &str = "edit_document";
pub const BTN_EXIT_PROFILE: &str = "exit_profile";

pub fn first_time_setup() -> Reply {
    Reply::Text(
        "🎉 Olá! Bem-vindo ao *ReciboLegal*!\n\n\
         Como é seu primeiro acesso, vou precisar de algumas informações básicas para personalizar seus recibos.\n\n\
         Por favor, me diga seu *nome completo*:"
            .to_string(),
    )
}

pub fn profile_required() -> Reply {
    Reply::Text(
        "🎉 Olá! Para começar, preciso que você complete seu perfil.\n\n\
         Por favor, me diga seu *nome completo*:"
            .to_string(),
    )
}

pub fn prompt_user_name() -> Reply {
    Reply::Text("Por favor, digite seu nome completo:".to_string())
}

pub fn user_document() -> Reply {
    Reply::Text(
        "Perfeito! Agora preciso do seu *CPF ou CNPJ*:\n\n\
         💡 Exemplo: 123.456.789-00 ou 12.345.678/0001-90\n\n\
         ℹ️ Essas informações aparecerão nos seus recibos como prestador do serviço."
            .to_string(),
    )
}

pub fn prompt_user_document() -> Reply {
    Reply::Text("Por favor, digite seu CPF ou CNPJ:".to_string())
}

pub fn profile_complete(name: &str) -> Reply {
    Reply::Text(format!(
        "✅ *Perfil configurado com sucesso!*\n\n\
         Olá, {name}! Agora você pode criar recibos profissionais.\n\n\
         Para começar seu primeiro recibo, me diga o *nome completo do seu cliente*:"
    ))
}

pub fn profile_save_error() -> Reply {
    Reply::Text("❌ Erro ao salvar perfil. Tente novamente.".to_string())
}

pub fn welcome(name: &str) -> Reply {
    Reply::Text(format!(
        "🎉 Olá novamente, *{name}*!\n\n\
         Vou te ajudar a criar um novo recibo válido juridicamente.\n\n\
         Para começar, me diga o *nome completo do seu cliente*:"
    ))
}

pub fn prompt_client_name() -> Reply {
    Reply::Text("Por favor, digite o nome completo do seu cliente:".to_string())
}

pub fn client_document() -> Reply {
    Reply::Text(
        "Perfeito! Agora preciso do *CPF ou CNPJ* do cliente:\n\n\
         💡 Exemplo: 123.456.789-00 ou 12.345.678/0001-90"
            .to_string(),
    )
}

pub fn prompt_client_document() -> Reply {
    Reply::Text("Por favor, digite o CPF ou CNPJ do cliente:".to_string())
}

pub fn service_name() -> Reply {
    Reply::Text(
        "Ótimo! Agora me conte qual foi o *nome do serviço* prestado:\n\n\
         💡 Exemplo: \"Consultoria em Marketing Digital\" ou \"Desenvolvimento de Website\""
            .to_string(),
    )
}

pub fn prompt_service_name() -> Reply {
    Reply::Text("Por favor, digite o nome do serviço prestado:".to_string())
}

pub fn service_description() -> Reply {
    Reply::Buttons {
        text: "Excelente! Agora você pode me dar uma *descrição mais detalhada* do serviço (opcional):\n\n\
               💡 Você pode enviar \"pular\" se não quiser adicionar descrição."
            .to_string(),
        options: vec![ReplyOption::new(BTN_SKIP_DESCRIPTION, "Pular")],
    }
}

pub fn amount() -> Reply {
    Reply::Text(
        "Perfeito! Agora me diga o *valor* do serviço:\n\n💡 Exemplo: 1500 ou 1500.50".to_string(),
    )
}

pub fn invalid_amount() -> Reply {
    Reply::Text(
        "❌ Valor inválido. Por favor, digite um valor numérico válido (exemplo: 1500 ou 1500.50):"
            .to_string(),
    )
}

pub fn date() -> Reply {
    Reply::Text(
        "Quase terminando! Qual a *data* do serviço?\n\n\
         💡 Formato: DD/MM/AAAA (exemplo: 23/07/2025)\n\
         💡 Ou envie \"hoje\" para usar a data atual"
            .to_string(),
    )
}

pub fn invalid_date() -> Reply {
    Reply::Text(
        "❌ Data inválida. Use o formato DD/MM/AAAA (exemplo: 23/07/2025) ou digite \"hoje\":"
            .to_string(),
    )
}

pub fn confirmation(draft: &ReceiptDraft) -> Reply {
    let description = draft
        .service_description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or("Não informado");

    Reply::Buttons {
        text: format!(
            "🔍 *Conferindo os dados do seu recibo:*\n\n\
             👤 *Cliente:* {}\n\
             📄 *CPF/CNPJ:* {}\n\
             🔧 *Serviço:* {}\n\
             📝 *Descrição:* {}\n\
             💰 *Valor:* R$ {}\n\
             📅 *Data:* {}\n\n\
             Está tudo correto?",
            draft.client_name.as_deref().unwrap_or(""),
            draft.client_document.as_deref().unwrap_or(""),
            draft.service_name.as_deref().unwrap_or(""),
            description,
            draft.amount.as_deref().unwrap_or(""),
            draft.date.as_deref().unwrap_or(""),
        ),
        options: vec![
            ReplyOption::new(BTN_CONFIRM_YES, "✅ Sim, gerar recibo"),
            ReplyOption::new(BTN_CONFIRM_NO, "❌ Não, recomeçar"),
        ],
    }
}

pub fn confirm_reprompt() -> Reply {
    Reply::Text("Por favor, responda com *SIM* ou *NÃO*:".to_string())
}

pub fn success(receipt: &GeneratedReceipt) -> Reply {
    Reply::Text(format!(
        "🎉 *Recibo {} criado com sucesso!*\n\n\
         Seu documento foi gerado e assinado digitalmente.\n\n\
         🔗 Clique no link abaixo para baixar o PDF:\n{}\n\n\
         💚 Obrigado por usar o ReciboLegal!",
        receipt.receipt_number, receipt.download_url
    ))
}

pub fn generic_error() -> Reply {
    Reply::Text("😔 Ops! Algo deu errado.\n\nDigite *RECOMEÇAR* para tentar novamente.".to_string())
}

pub fn restart() -> Reply {
    Reply::Text("🔄 Vamos recomeçar!\n\nMe diga o *nome completo do seu cliente*:".to_string())
}

pub fn profile_options(user: &User) -> Reply {
    Reply::List {
        text: format!(
            "⚙️ *Meu Perfil*\n\n\
             *Dados atuais:*\n\
             👤 Nome: {}\n\
             📄 CPF/CNPJ: {}",
            user.full_name.as_deref().unwrap_or("Não informado"),
            user.cpf_cnpj.as_deref().unwrap_or("Não informado"),
        ),
        button: "Opções".to_string(),
        options: vec![
            ReplyOption::new(BTN_EDIT_NAME, "✏️ Alterar nome"),
            ReplyOption::new(BTN_EDIT_DOCUMENT, "📄 Alterar CPF/CNPJ"),
            ReplyOption::new(BTN_EXIT_PROFILE, "🔙 Voltar ao menu"),
        ],
    }
}

pub fn edit_name() -> Reply {
    Reply::Text("✏️ *Alterar Nome*\n\nDigite seu novo nome completo:".to_string())
}

pub fn edit_document() -> Reply {
    Reply::Text(
        "✏️ *Alterar CPF/CNPJ*\n\n\
         Digite seu novo CPF ou CNPJ:\n\n\
         💡 Exemplo: 123.456.789-00 ou 12.345.678/0001-90"
            .to_string(),
    )
}

pub fn profile_updated(name: &str, document: &str) -> Reply {
    Reply::Text(format!(
        "✅ *Perfil atualizado com sucesso!*\n\n\
         *Novos dados:*\n\
         👤 Nome: {name}\n\
         📄 CPF/CNPJ: {document}\n\n\
         Digite *OI* para criar um recibo ou *PERFIL* para fazer mais alterações."
    ))
}

pub fn back_to_menu() -> Reply {
    Reply::Text("👋 Voltando ao menu principal.\n\nDigite *OI* para criar um recibo.".to_string())
}

pub fn completed_idle() -> Reply {
    Reply::Text("Seu recibo já foi criado! Digite *OI* para criar um novo recibo.".to_string())
}

pub fn help() -> Reply {
    Reply::Text(
        "Olá! Digite *OI* para começar a criar seu recibo! 😊\n\n\
         💡 *Outros comandos:*\n\
         • *STATUS* - Ver informações da conta\n\
         • *DASHBOARD* - Ver estatísticas e resumo\n\
         • *HISTÓRICO* - Ver seus recibos anteriores\n\
         • *RELATÓRIO* - Relatório financeiro\n\
         • *UPGRADE* - Ver planos disponíveis"
            .to_string(),
    )
}

pub fn plans(public_url: &str) -> Reply {
    Reply::Text(format!(
        "🚀 *Planos ReciboLegal:*\n\n\
         🆓 *Gratuito:* 5 recibos/mês\n\
         💰 *Básico (R$ 19,90):* 50 recibos/mês\n\
         🚀 *Pro (R$ 39,90):* 200 recibos/mês\n\
         ⭐ *Ilimitado (R$ 79,90):* Recibos ilimitados\n\n\
         👆 *Assine agora:*\n{public_url}/plans\n\n\
         Digite *OI* para criar um recibo."
    ))
}

pub fn stats_reply(stats: &UserStats, public_url: &str) -> Reply {
    let limit = stats
        .monthly_limit
        .map(|l| l.to_string())
        .unwrap_or_else(|| "∞".to_string());
    let footer = match stats.monthly_limit {
        Some(limit) if stats.current_month_usage >= limit => {
            format!("⚠️ *Limite atingido!* Faça upgrade: {public_url}/plans")
        }
        _ => "✅ Você pode gerar mais recibos!".to_string(),
    };

    Reply::Text(format!(
        "📊 *Status da sua conta:*\n\n\
         📋 *Plano atual:* {}\n\
         📄 *Recibos este mês:* {}/{}\n\
         💳 *Status:* {}\n\n\
         {}\n\n\
         Digite *OI* para criar um recibo.",
        stats.plan_name, stats.current_month_usage, limit, stats.subscription_status, footer
    ))
}

pub fn stats_fallback() -> Reply {
    Reply::Text(
        "📊 *Status da conta:* Plano Gratuito (5 recibos/mês)\n\n\
         ❌ Não foi possível carregar informações detalhadas.\n\n\
         Digite *OI* para criar um recibo."
            .to_string(),
    )
}

pub fn quota_exceeded(usage: i64, limit: i64, plan_name: &str, public_url: &str) -> Reply {
    Reply::Text(format!(
        "⚠️ *Limite atingido!*\n\n\
         Você já usou {usage}/{limit} recibos do plano {plan_name} este mês.\n\n\
         🚀 *Faça upgrade para continuar:*\n{public_url}/plans\n\n\
         Digite *OI* para criar um novo recibo quando fizer o upgrade."
    ))
}

pub fn dashboard_reply(dashboard: &Dashboard, public_url: &str) -> Reply {
    let mut text = format!(
        "📊 *Seu Dashboard ReciboLegal:*\n\n\
         📈 *Resumo Geral:*\n\
         • Total de recibos: {}\n\
         • Valor total: R$ {}\n\
         • Ticket médio: R$ {}\n\n\
         📅 *Este mês:*\n\
         • Recibos: {}\n\
         • Faturado: R$ {}",
        dashboard.summary.total_receipts,
        format_amount(dashboard.summary.total_amount_in_cents),
        format_amount(dashboard.summary.avg_receipt_in_cents),
        dashboard.summary.this_month_receipts,
        format_amount(dashboard.summary.this_month_amount_in_cents),
    );

    if !dashboard.top_services.is_empty() {
        text.push_str("\n\n🏆 *Top serviços:*");
        for (index, service) in dashboard.top_services.iter().take(3).enumerate() {
            text.push_str(&format!(
                "\n{}. {} ({} recibos)",
                index + 1,
                service.name,
                service.count
            ));
        }
    }

    text.push_str(&format!(
        "\n\n🔗 *Dashboard completo:*\n{public_url}/dashboard\n\n\
         Digite *HISTÓRICO* para ver seus recibos ou *OI* para criar novo."
    ));

    Reply::Text(text)
}

pub fn dashboard_fallback() -> Reply {
    Reply::Text("📊 *Dashboard indisponível no momento.*\n\nDigite *OI* para criar um recibo.".to_string())
}

pub fn history_reply(receipts: &[Receipt], public_url: &str) -> Reply {
    if receipts.is_empty() {
        return Reply::Text(
            "📄 *Você ainda não possui recibos.*\n\nDigite *OI* para criar seu primeiro recibo!"
                .to_string(),
        );
    }

    let mut text = "📄 *Seus últimos recibos:*\n".to_string();
    for receipt in receipts {
        text.push_str(&format!(
            "\n• {} - {} - R$ {}",
            receipt.receipt_number,
            receipt.client_name,
            format_amount(receipt.amount_in_cents),
        ));
    }

    text.push_str(&format!(
        "\n\n🔗 *Ver histórico completo:*\n{public_url}/receipts\n\n\
         Digite *DASHBOARD* para ver estatísticas ou *OI* para criar novo recibo."
    ));

    Reply::Text(text)
}

pub fn history_fallback() -> Reply {
    Reply::Text("📄 *Histórico indisponível no momento.*\n\nDigite *OI* para criar um recibo.".to_string())
}

pub fn report_reply(report: &FinancialReport, public_url: &str) -> Reply {
    let mut text = format!(
        "📋 *Relatório Financeiro:*\n\n\
         📊 *Resumo:*\n\
         • Total de recibos: {}\n\
         • Valor total: R$ {}\n\
         • Ticket médio: R$ {}",
        report.total_receipts,
        format_amount(report.total_amount_in_cents),
        format_amount(report.avg_receipt_in_cents),
    );

    if !report.by_service.is_empty() {
        text.push_str("\n\n🔧 *Por serviço:*");
        for service in report.by_service.iter().take(3) {
            text.push_str(&format!(
                "\n• {}: {} recibos (R$ {})",
                service.name,
                service.count,
                format_amount(service.amount_in_cents),
            ));
        }
    }

    text.push_str(&format!("\n\n🔗 *Relatório completo e exportação:*\n{public_url}/reports"));

    Reply::Text(text)
}

pub fn report_fallback() -> Reply {
    Reply::Text("📋 *Relatório indisponível no momento.*\n\nDigite *OI* para criar um recibo.".to_string())
}

/// Cents to a display amount with two decimal places.
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_render_with_two_decimals() {
        assert_eq!(format_amount(150050), "1500.50");
        assert_eq!(format_amount(100), "1.00");
        assert_eq!(format_amount(5), "0.05");
    }

    #[test]
    fn confirmation_shows_the_draft() {
        let draft = ReceiptDraft {
            client_name: Some("Empresa X".to_string()),
            client_document: Some("12.345.678/0001-90".to_string()),
            service_name: Some("Consultoria".to_string()),
            service_description: Some("".to_string()),
            amount: Some("1500.50".to_string()),
            date: Some("23/07/2025".to_string()),
        };

        let reply = confirmation(&draft);
        assert!(reply.text().contains("Empresa X"));
        assert!(reply.text().contains("R$ 1500.50"));
        assert!(reply.text().contains("Não informado"));
    }
}
