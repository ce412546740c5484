use super::receipts::ReceiptDraft;

/// Where a conversation currently is in the multi-step form flow.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConversationState {
    Start,
    CollectingUserName,
    CollectingUserDocument,
    CollectingClientName,
    CollectingClientDocument,
    CollectingServiceName,
    CollectingServiceDescription,
    CollectingAmount,
    CollectingDate,
    Confirming,
    Completed,
    EditingProfile,
    EditingUserName,
    EditingUserDocument,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SessionData {
    /// Provider name captured during first-time profile setup, held here
    /// until the document arrives and both are persisted together.
    pub user_full_name: Option<String>,
    pub draft: ReceiptDraft,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub state: ConversationState,
    pub data: SessionData,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            state: ConversationState::Start,
            data: SessionData::default(),
        }
    }
}
