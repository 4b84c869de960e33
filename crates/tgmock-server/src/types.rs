//! Bot API records served by the mock.
//!
//! Only the fields a client needs to exercise update polling and message
//! sending are modelled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity reported by `getMe` and used as the sender of sent messages.
pub const BOT_ID: i64 = 123_456_789;
pub const BOT_FIRST_NAME: &str = "TestBot";
pub const BOT_USERNAME: &str = "test_bot";

/// A Telegram user or bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl User {
    /// The mock bot itself.
    pub fn bot() -> Self {
        Self {
            id: BOT_ID,
            is_bot: true,
            first_name: BOT_FIRST_NAME.to_string(),
            username: Some(BOT_USERNAME.to_string()),
        }
    }

    /// A human sender with no username.
    pub fn human(id: i64, first_name: &str) -> Self {
        Self {
            id,
            is_bot: false,
            first_name: first_name.to_string(),
            username: None,
        }
    }
}

/// Chat identifier: numeric id or `@channelusername`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatId {
    Id(i64),
    Username(String),
}

impl Default for ChatId {
    fn default() -> Self {
        ChatId::Id(0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        ChatId::Id(id)
    }
}

/// A chat. All chats served by the mock are private.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Chat {
    pub fn private(id: impl Into<ChatId>) -> Self {
        Self {
            id: id.into(),
            kind: "private".to_string(),
        }
    }
}

/// A text message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: User,
    pub chat: Chat,
    pub text: String,
}

/// One entry of a `getUpdates` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Message,
}

impl Update {
    /// A private text message from user 42, the fixture sender.
    pub fn text_from_fixture_user(update_id: i64, message_id: i64, text: &str) -> Self {
        Self {
            update_id,
            message: Message {
                message_id,
                from: User::human(42, "Test"),
                chat: Chat::private(42),
                text: text.to_string(),
            },
        }
    }
}

/// Parameters accepted by `sendMessage`. Anything else in the body is ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendMessageParams {
    pub chat_id: Option<ChatId>,
    pub text: Option<String>,
}

impl SendMessageParams {
    /// Parse a request body, falling back to defaults when it is empty or malformed.
    ///
    /// Each field is read on its own: a `chat_id` of the wrong shape does not
    /// discard a good `text`, and the reverse.
    pub fn from_body(body: &[u8]) -> Self {
        if body.is_empty() {
            return Self::default();
        }
        let fields = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(fields)) => fields,
            Ok(other) => {
                tracing::debug!(body = %other, "Ignoring non-object sendMessage body");
                return Self::default();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed sendMessage body");
                return Self::default();
            }
        };

        Self {
            chat_id: fields
                .get("chat_id")
                .and_then(|v| ChatId::deserialize(v).ok()),
            text: fields.get("text").and_then(Value::as_str).map(str::to_owned),
        }
    }
}

/// Success envelope: `{"ok": true, "result": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiReply<T> {
    pub ok: bool,
    pub result: T,
}

impl<T> ApiReply<T> {
    pub fn new(result: T) -> Self {
        Self { ok: true, result }
    }
}
