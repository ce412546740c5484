use serde::{Deserialize, Serialize};

/// Inbound webhook payload: plain text and/or an interactive selection.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub from: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub button_id: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReplyOption {
    pub id: String,
    pub title: String,
}

impl ReplyOption {
    pub fn new(id: &str, title: &str) -> Self {
        ReplyOption {
            id: id.to_string(),
            title: title.to_string(),
        }
    }
}

/// Outbound message forms. Interactive variants degrade to a numbered
/// plain-text rendering when the channel rejects them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    Text(String),
    Buttons {
        text: String,
        options: Vec<ReplyOption>,
    },
    List {
        text: String,
        button: String,
        options: Vec<ReplyOption>,
    },
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Text(text) => text,
            Reply::Buttons { text, .. } => text,
            Reply::List { text, .. } => text,
        }
    }
}
