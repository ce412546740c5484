/// Natural-language entry points of the START state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Intent {
    Greeting,
    Profile,
    Status,
    Upgrade,
    Dashboard,
    History,
    Report,
}

/// Ordered rule table: substring match, case handled by the caller
/// lowercasing the message, first hit wins. Order matters — "planos"
/// contains "plano" and therefore lands on Status, as the original flow did.
const RULES: &[(Intent, &[&str])] = &[
    (Intent::Greeting, &["oi", "olá", "começar"]),
    (Intent::Profile, &["perfil", "profile", "editar"]),
    (Intent::Status, &["status", "plano", "assinatura"]),
    (Intent::Upgrade, &["upgrade", "planos"]),
    (Intent::Dashboard, &["dashboard", "painel", "resumo"]),
    (Intent::History, &["histórico", "historico", "recibos", "lista"]),
    (Intent::Report, &["relatório", "relatorio", "financeiro"]),
];

pub fn match_intent(message: &str) -> Option<Intent> {
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| message.contains(keyword)))
        .map(|(intent, _)| *intent)
}

/// Whether the message references profile editing; used by the global
/// pre-routing rule to let incomplete-profile users reach the profile menu.
pub fn mentions_profile(message: &str) -> bool {
    ["perfil", "profile", "editar", "edit"]
        .iter()
        .any(|keyword| message.contains(keyword))
}
