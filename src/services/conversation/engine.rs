use chrono::NaiveDate;

use super::intents::{self, Intent};
use super::messages;
use crate::models::receipts::ReceiptDraft;
use crate::models::sessions::{ConversationState, Session, SessionData};
use crate::models::users::{ProfileUpdate, User};
use crate::models::whatsapp::{InboundMessage, Reply};

/// Per-turn inputs the transition function cannot derive by itself.
pub struct Context {
    pub public_url: String,
    pub today: NaiveDate,
}

/// Side effect the driver runs after a transition. The transition itself
/// never touches storage, which keeps it testable without any transport.
#[derive(Debug)]
pub enum Effect {
    None,
    SaveProfile { update: ProfileUpdate },
    FetchStats,
    FetchDashboard,
    FetchHistory,
    FetchReport,
    Generate { draft: ReceiptDraft },
}

pub struct Step {
    pub next: ConversationState,
    pub data: SessionData,
    pub reply: Reply,
    pub effect: Effect,
}

impl Step {
    fn stay(session: &Session, reply: Reply) -> Step {
        Step {
            next: session.state,
            data: session.data.clone(),
            reply,
            effect: Effect::None,
        }
    }

    fn advance(next: ConversationState, data: SessionData, reply: Reply) -> Step {
        Step {
            next,
            data,
            reply,
            effect: Effect::None,
        }
    }
}

/// The conversation transition function: pure in the session, the inbound
/// message, the user record and the turn context.
pub fn transition(session: &Session, inbound: &InboundMessage, user: &User, ctx: &Context) -> Step {
    let trimmed = effective_text(inbound).trim().to_string();
    let message = trimmed.to_lowercase();

    // Global pre-routing: no receipt is ever created without provider
    // identity. Profile-related messages still reach the profile states.
    if !user.profile_complete()
        && !matches!(
            session.state,
            ConversationState::CollectingUserName | ConversationState::CollectingUserDocument
        )
        && !intents::mentions_profile(&message)
    {
        let reply = if session.state == ConversationState::Start
            && intents::match_intent(&message) == Some(Intent::Greeting)
        {
            messages::first_time_setup()
        } else {
            messages::profile_required()
        };
        return Step::advance(ConversationState::CollectingUserName, SessionData::default(), reply);
    }

    match session.state {
        ConversationState::Start => on_start(session, &message, user, ctx),
        ConversationState::CollectingUserName => on_user_name(session, &trimmed),
        ConversationState::CollectingUserDocument => on_user_document(session, user, &trimmed),
        ConversationState::CollectingClientName => on_client_name(session, &trimmed, &message),
        ConversationState::CollectingClientDocument => on_client_document(session, &trimmed),
        ConversationState::CollectingServiceName => on_service_name(session, &trimmed),
        ConversationState::CollectingServiceDescription => {
            on_service_description(session, &trimmed, &message)
        }
        ConversationState::CollectingAmount => on_amount(session, &trimmed),
        ConversationState::CollectingDate => on_date(session, &trimmed, &message, ctx),
        ConversationState::Confirming => on_confirming(session, &message),
        ConversationState::Completed => on_completed(session, &message, user),
        ConversationState::EditingProfile => on_editing_profile(session, &message, user),
        ConversationState::EditingUserName => on_editing_user_name(session, &trimmed, user),
        ConversationState::EditingUserDocument => on_editing_user_document(session, &trimmed, user),
    }
}

/// Interactive selections act exactly like their text-token equivalents.
fn button_token(id: &str) -> Option<&'static str> {
    match id {
        messages::BTN_CONFIRM_YES => Some("sim"),
        messages::BTN_CONFIRM_NO => Some("não"),
        messages::BTN_SKIP_DESCRIPTION => Some("pular"),
        messages::BTN_EDIT_NAME => Some("nome"),
        messages::BTN_EDIT_DOCUMENT => Some("documento"),
        messages::BTN_EXIT_PROFILE => Some("sair"),
        _ => None,
    }
}

fn effective_text(inbound: &InboundMessage) -> &str {
    inbound
        .button_id
        .as_deref()
        .and_then(button_token)
        .unwrap_or(&inbound.text)
}

fn on_start(session: &Session, message: &str, user: &User, ctx: &Context) -> Step {
    match intents::match_intent(message) {
        Some(Intent::Greeting) => Step::advance(
            ConversationState::CollectingClientName,
            SessionData::default(),
            messages::welcome(user.display_name()),
        ),
        Some(Intent::Profile) => Step::advance(
            ConversationState::EditingProfile,
            session.data.clone(),
            messages::profile_options(user),
        ),
        Some(Intent::Status) => Step {
            next: session.state,
            data: session.data.clone(),
            reply: messages::stats_fallback(),
            effect: Effect::FetchStats,
        },
        Some(Intent::Upgrade) => Step::stay(session, messages::plans(&ctx.public_url)),
        Some(Intent::Dashboard) => Step {
            next: session.state,
            data: session.data.clone(),
            reply: messages::dashboard_fallback(),
            effect: Effect::FetchDashboard,
        },
        Some(Intent::History) => Step {
            next: session.state,
            data: session.data.clone(),
            reply: messages::history_fallback(),
            effect: Effect::FetchHistory,
        },
        Some(Intent::Report) => Step {
            next: session.state,
            data: session.data.clone(),
            reply: messages::report_fallback(),
            effect: Effect::FetchReport,
        },
        None => Step::stay(session, messages::help()),
    }
}

fn on_user_name(session: &Session, trimmed: &str) -> Step {
    if trimmed.is_empty() {
        return Step::stay(session, messages::prompt_user_name());
    }

    let data = SessionData {
        user_full_name: Some(trimmed.to_string()),
        draft: ReceiptDraft::default(),
    };
    Step::advance(ConversationState::CollectingUserDocument, data, messages::user_document())
}

fn on_user_document(session: &Session, user: &User, trimmed: &str) -> Step {
    if trimmed.is_empty() {
        return Step::stay(session, messages::prompt_user_document());
    }

    let name = session
        .data
        .user_full_name
        .clone()
        .unwrap_or_else(|| user.display_name().to_string());
    let update = ProfileUpdate {
        full_name: session.data.user_full_name.clone(),
        cpf_cnpj: Some(trimmed.to_string()),
    };

    // Profile fields leave the session here; the receipt flow starts clean.
    Step {
        next: ConversationState::CollectingClientName,
        data: SessionData::default(),
        reply: messages::profile_complete(&name),
        effect: Effect::SaveProfile { update },
    }
}

fn on_client_name(session: &Session, trimmed: &str, message: &str) -> Step {
    if message == "recomeçar" {
        return Step::advance(
            ConversationState::CollectingClientName,
            SessionData::default(),
            messages::restart(),
        );
    }
    if trimmed.is_empty() {
        return Step::stay(session, messages::prompt_client_name());
    }

    let mut data = session.data.clone();
    data.draft.client_name = Some(trimmed.to_string());
    Step::advance(ConversationState::CollectingClientDocument, data, messages::client_document())
}

fn on_client_document(session: &Session, trimmed: &str) -> Step {
    if trimmed.is_empty() {
        return Step::stay(session, messages::prompt_client_document());
    }

    let mut data = session.data.clone();
    data.draft.client_document = Some(trimmed.to_string());
    Step::advance(ConversationState::CollectingServiceName, data, messages::service_name())
}

fn on_service_name(session: &Session, trimmed: &str) -> Step {
    if trimmed.is_empty() {
        return Step::stay(session, messages::prompt_service_name());
    }

    let mut data = session.data.clone();
    data.draft.service_name = Some(trimmed.to_string());
    Step::advance(
        ConversationState::CollectingServiceDescription,
        data,
        messages::service_description(),
    )
}

fn on_service_description(session: &Session, trimmed: &str, message: &str) -> Step {
    let description = if message == "pular" {
        String::new()
    } else if trimmed.is_empty() {
        return Step::stay(session, messages::service_description());
    } else {
        trimmed.to_string()
    };

    let mut data = session.data.clone();
    data.draft.service_description = Some(description);
    Step::advance(ConversationState::CollectingAmount, data, messages::amount())
}

fn on_amount(session: &Session, trimmed: &str) -> Step {
    match parse_amount(trimmed) {
        Some(amount) => {
            let mut data = session.data.clone();
            data.draft.amount = Some(amount);
            Step::advance(ConversationState::CollectingDate, data, messages::date())
        }
        None => Step::stay(session, messages::invalid_amount()),
    }
}

fn on_date(session: &Session, trimmed: &str, message: &str, ctx: &Context) -> Step {
    let date = if message == "hoje" {
        ctx.today.format("%d/%m/%Y").to_string()
    } else if is_valid_date(trimmed) {
        trimmed.to_string()
    } else {
        return Step::stay(session, messages::invalid_date());
    };

    let mut data = session.data.clone();
    data.draft.date = Some(date);
    let reply = messages::confirmation(&data.draft);
    Step::advance(ConversationState::Confirming, data, reply)
}

fn on_confirming(session: &Session, message: &str) -> Step {
    match message {
        "sim" | "s" => Step {
            next: ConversationState::Completed,
            data: SessionData::default(),
            // Replaced by the driver: success copy on Ok, quota or generic
            // error copy on failure.
            reply: messages::generic_error(),
            effect: Effect::Generate {
                draft: session.data.draft.clone(),
            },
        },
        "não" | "nao" | "n" => Step::advance(
            ConversationState::CollectingClientName,
            SessionData::default(),
            messages::restart(),
        ),
        _ => {
            let reply = match messages::confirmation(&session.data.draft) {
                Reply::Buttons { text, options } => Reply::Buttons {
                    text: format!("{}\n\n{}", messages::confirm_reprompt().text(), text),
                    options,
                },
                other => other,
            };
            Step::stay(session, reply)
        }
    }
}

fn on_completed(session: &Session, message: &str, user: &User) -> Step {
    if intents::match_intent(message) == Some(Intent::Greeting) {
        return Step::advance(
            ConversationState::CollectingClientName,
            SessionData::default(),
            messages::welcome(user.display_name()),
        );
    }

    Step::stay(session, messages::completed_idle())
}

fn on_editing_profile(session: &Session, message: &str, user: &User) -> Step {
    if message.contains("nome") || message == "1" {
        Step::advance(ConversationState::EditingUserName, session.data.clone(), messages::edit_name())
    } else if message.contains("documento") || message == "2" {
        Step::advance(
            ConversationState::EditingUserDocument,
            session.data.clone(),
            messages::edit_document(),
        )
    } else if message.contains("sair") || message.contains("voltar") || message == "3" {
        Step::advance(ConversationState::Start, SessionData::default(), messages::back_to_menu())
    } else {
        Step::stay(session, messages::profile_options(user))
    }
}

fn on_editing_user_name(session: &Session, trimmed: &str, user: &User) -> Step {
    if trimmed.is_empty() {
        return Step::stay(session, messages::prompt_user_name());
    }

    let document = user.cpf_cnpj.as_deref().unwrap_or("Não informado").to_string();
    Step {
        next: ConversationState::Start,
        data: SessionData::default(),
        reply: messages::profile_updated(trimmed, &document),
        effect: Effect::SaveProfile {
            update: ProfileUpdate {
                full_name: Some(trimmed.to_string()),
                cpf_cnpj: None,
            },
        },
    }
}

fn on_editing_user_document(session: &Session, trimmed: &str, user: &User) -> Step {
    if trimmed.is_empty() {
        return Step::stay(session, messages::prompt_user_document());
    }

    let name = user.full_name.as_deref().unwrap_or("Não informado").to_string();
    Step {
        next: ConversationState::Start,
        data: SessionData::default(),
        reply: messages::profile_updated(&name, trimmed),
        effect: Effect::SaveProfile {
            update: ProfileUpdate {
                full_name: None,
                cpf_cnpj: Some(trimmed.to_string()),
            },
        },
    }
}

/// Comma or dot as decimal separator, nothing else; the accepted value is
/// normalized to a fixed 2-decimal-place string.
pub fn parse_amount(input: &str) -> Option<String> {
    let value: f64 = input.trim().replace(',', ".").parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    Some(format!("{value:.2}"))
}

/// Shape check only (DD/MM/YYYY). Calendar validity is deliberately not
/// enforced; the date is an opaque string downstream.
pub fn is_valid_date(input: &str) -> bool {
    let bytes = input.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(index, byte)| {
            if index == 2 || index == 5 {
                *byte == b'/'
            } else {
                byte.is_ascii_digit()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(profile_complete: bool) -> User {
        let now = chrono::Local::now().naive_local();
        User {
            phone: "+5511999999999".to_string(),
            full_name: profile_complete.then(|| "Maria Silva".to_string()),
            cpf_cnpj: profile_complete.then(|| "123.456.789-00".to_string()),
            plan: "FREE".to_string(),
            subscription_status: "active".to_string(),
            receipts_used: 0,
            last_receipt_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ctx() -> Context {
        Context {
            public_url: "https://recibolegal.com.br".to_string(),
            today: NaiveDate::from_ymd_opt(2025, 7, 23).unwrap(),
        }
    }

    fn session(state: ConversationState) -> Session {
        Session {
            state,
            data: SessionData::default(),
        }
    }

    fn text(body: &str) -> InboundMessage {
        InboundMessage {
            from: "whatsapp:+5511999999999".to_string(),
            text: body.to_string(),
            button_id: None,
        }
    }

    fn button(id: &str) -> InboundMessage {
        InboundMessage {
            from: "whatsapp:+5511999999999".to_string(),
            text: String::new(),
            button_id: Some(id.to_string()),
        }
    }

    #[test]
    fn first_contact_forces_profile_collection() {
        let step = transition(&session(ConversationState::Start), &text("oi"), &user(false), &ctx());
        assert_eq!(step.next, ConversationState::CollectingUserName);
        assert!(step.reply.text().contains("primeiro acesso"));
    }

    #[test]
    fn incomplete_profile_is_forced_from_any_state() {
        let step = transition(
            &session(ConversationState::Confirming),
            &text("sim"),
            &user(false),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::CollectingUserName);
        assert!(matches!(step.effect, Effect::None));
    }

    #[test]
    fn profile_mention_bypasses_forced_routing() {
        let step = transition(&session(ConversationState::Start), &text("perfil"), &user(false), &ctx());
        assert_eq!(step.next, ConversationState::EditingProfile);
    }

    #[test]
    fn empty_name_reprompts_without_advancing() {
        let step = transition(
            &session(ConversationState::CollectingUserName),
            &text("   "),
            &user(false),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::CollectingUserName);
    }

    #[test]
    fn user_document_persists_profile_and_starts_receipt_flow() {
        let mut current = session(ConversationState::CollectingUserName);
        let step = transition(&current, &text("Maria Silva"), &user(false), &ctx());
        assert_eq!(step.next, ConversationState::CollectingUserDocument);

        current = Session { state: step.next, data: step.data };
        let step = transition(&current, &text("123.456.789-00"), &user(false), &ctx());
        assert_eq!(step.next, ConversationState::CollectingClientName);
        assert_eq!(step.data, SessionData::default());
        match step.effect {
            Effect::SaveProfile { update } => {
                assert_eq!(update.full_name.as_deref(), Some("Maria Silva"));
                assert_eq!(update.cpf_cnpj.as_deref(), Some("123.456.789-00"));
            }
            other => panic!("expected SaveProfile, got {other:?}"),
        }
    }

    #[test]
    fn greeting_starts_receipt_flow_for_complete_profile() {
        let step = transition(&session(ConversationState::Start), &text("Oi!"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::CollectingClientName);
        assert!(step.reply.text().contains("Maria Silva"));
    }

    #[test]
    fn status_intent_fetches_stats_without_leaving_start() {
        let step = transition(&session(ConversationState::Start), &text("status"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::Start);
        assert!(matches!(step.effect, Effect::FetchStats));
    }

    #[test]
    fn unknown_text_shows_help() {
        let step = transition(&session(ConversationState::Start), &text("xyzzy"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::Start);
        assert!(step.reply.text().contains("Outros comandos"));
    }

    #[test]
    fn amount_vectors() {
        assert_eq!(parse_amount("1500").as_deref(), Some("1500.00"));
        assert_eq!(parse_amount("1500.50").as_deref(), Some("1500.50"));
        assert_eq!(parse_amount("1500,50").as_deref(), Some("1500.50"));
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("0"), None);
    }

    #[test]
    fn rejected_amount_keeps_the_state() {
        let step = transition(
            &session(ConversationState::CollectingAmount),
            &text("abc"),
            &user(true),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::CollectingAmount);
        assert!(step.reply.text().contains("Valor inválido"));
    }

    #[test]
    fn accepted_amount_is_stored_normalized() {
        let step = transition(
            &session(ConversationState::CollectingAmount),
            &text("1500,50"),
            &user(true),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::CollectingDate);
        assert_eq!(step.data.draft.amount.as_deref(), Some("1500.50"));
    }

    #[test]
    fn date_vectors() {
        assert!(is_valid_date("23/07/2025"));
        // Calendar validity is not checked on purpose.
        assert!(is_valid_date("31/02/2025"));
        assert!(!is_valid_date("23-07-2025"));
        assert!(!is_valid_date("2025/07/23x"));
        assert!(!is_valid_date("hoje"));
    }

    #[test]
    fn hoje_resolves_to_today() {
        let step = transition(
            &session(ConversationState::CollectingDate),
            &text("hoje"),
            &user(true),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::Confirming);
        assert_eq!(step.data.draft.date.as_deref(), Some("23/07/2025"));
    }

    #[test]
    fn invalid_date_reprompts() {
        let step = transition(
            &session(ConversationState::CollectingDate),
            &text("amanhã"),
            &user(true),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::CollectingDate);
    }

    #[test]
    fn confirming_yes_triggers_generation() {
        let mut confirming = session(ConversationState::Confirming);
        confirming.data.draft.client_name = Some("Empresa X".to_string());

        let step = transition(&confirming, &text("sim"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::Completed);
        match step.effect {
            Effect::Generate { draft } => {
                assert_eq!(draft.client_name.as_deref(), Some("Empresa X"))
            }
            other => panic!("expected Generate, got {other:?}"),
        }
    }

    #[test]
    fn confirm_button_acts_like_sim() {
        let step = transition(
            &session(ConversationState::Confirming),
            &button(messages::BTN_CONFIRM_YES),
            &user(true),
            &ctx(),
        );
        assert!(matches!(step.effect, Effect::Generate { .. }));
    }

    #[test]
    fn confirming_no_restarts_the_draft() {
        let mut confirming = session(ConversationState::Confirming);
        confirming.data.draft.client_name = Some("Empresa X".to_string());

        let step = transition(&confirming, &text("não"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::CollectingClientName);
        assert_eq!(step.data, SessionData::default());
        assert!(matches!(step.effect, Effect::None));
    }

    #[test]
    fn confirming_anything_else_reprompts() {
        let step = transition(
            &session(ConversationState::Confirming),
            &text("talvez"),
            &user(true),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::Confirming);
        assert!(step.reply.text().contains("SIM"));
    }

    #[test]
    fn completed_only_reacts_to_greetings() {
        let step = transition(&session(ConversationState::Completed), &text("obrigado"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::Completed);

        let step = transition(&session(ConversationState::Completed), &text("oi"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::CollectingClientName);
    }

    #[test]
    fn skip_token_stores_empty_description() {
        let step = transition(
            &session(ConversationState::CollectingServiceDescription),
            &text("pular"),
            &user(true),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::CollectingAmount);
        assert_eq!(step.data.draft.service_description.as_deref(), Some(""));
    }

    #[test]
    fn restart_command_resets_the_draft() {
        let mut current = session(ConversationState::CollectingClientName);
        current.data.draft.client_name = Some("Antiga".to_string());

        let step = transition(&current, &text("recomeçar"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::CollectingClientName);
        assert_eq!(step.data, SessionData::default());
    }

    #[test]
    fn profile_menu_dispatch() {
        let step = transition(&session(ConversationState::EditingProfile), &text("nome"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::EditingUserName);

        let step = transition(&session(ConversationState::EditingProfile), &text("2"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::EditingUserDocument);

        let step = transition(&session(ConversationState::EditingProfile), &text("sair"), &user(true), &ctx());
        assert_eq!(step.next, ConversationState::Start);
    }

    #[test]
    fn editing_name_saves_and_returns_to_start() {
        let step = transition(
            &session(ConversationState::EditingUserName),
            &text("Maria S. Santos"),
            &user(true),
            &ctx(),
        );
        assert_eq!(step.next, ConversationState::Start);
        match step.effect {
            Effect::SaveProfile { update } => {
                assert_eq!(update.full_name.as_deref(), Some("Maria S. Santos"));
                assert_eq!(update.cpf_cnpj, None);
            }
            other => panic!("expected SaveProfile, got {other:?}"),
        }
    }
}
