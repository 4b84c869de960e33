//! Bot API method handlers.
//!
//! Handlers are pure: they map a method and request body to a canned reply.
//! Sleeping and the deliberately broken `partial-read` write are left to the
//! dispatcher.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;

use crate::scenario::Scenario;
use crate::types::{Chat, Message, SendMessageParams, Update, User};

/// Methods the mock answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMethod {
    GetMe,
    GetUpdates,
    SendMessage,
    SetWebhook,
    DeleteWebhook,
}

/// What a handler wants sent back.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodReply {
    /// `{"ok": true, "result": <value>}` with status 200.
    Result(Value),
    /// Same as `Result`, after sleeping for `delay`.
    Delayed { delay: Duration, result: Value },
    /// Truncated body followed by a dropped connection.
    Truncated,
}

impl BotMethod {
    pub const ALL: [BotMethod; 5] = [
        BotMethod::GetMe,
        BotMethod::GetUpdates,
        BotMethod::SendMessage,
        BotMethod::SetWebhook,
        BotMethod::DeleteWebhook,
    ];

    /// Look up a method by its Bot API name. Matching is case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "getMe" => Some(BotMethod::GetMe),
            "getUpdates" => Some(BotMethod::GetUpdates),
            "sendMessage" => Some(BotMethod::SendMessage),
            "setWebhook" => Some(BotMethod::SetWebhook),
            "deleteWebhook" => Some(BotMethod::DeleteWebhook),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BotMethod::GetMe => "getMe",
            BotMethod::GetUpdates => "getUpdates",
            BotMethod::SendMessage => "sendMessage",
            BotMethod::SetWebhook => "setWebhook",
            BotMethod::DeleteWebhook => "deleteWebhook",
        }
    }

    /// Produce the reply for this method.
    pub fn handle(
        &self,
        body: &[u8],
        scenario: Option<Scenario>,
        slow_response_delay: Duration,
    ) -> serde_json::Result<MethodReply> {
        let reply = match self {
            BotMethod::GetMe => MethodReply::Result(serde_json::to_value(get_me())?),
            BotMethod::GetUpdates => get_updates(scenario, slow_response_delay)?,
            BotMethod::SendMessage => {
                MethodReply::Result(serde_json::to_value(send_message(body))?)
            }
            BotMethod::SetWebhook | BotMethod::DeleteWebhook => {
                MethodReply::Result(Value::Bool(true))
            }
        };
        Ok(reply)
    }
}

/// `getMe`: the bot's own identity.
pub fn get_me() -> User {
    User::bot()
}

/// `getUpdates`: scripted updates for the active scenario, else an empty list.
pub fn get_updates(
    scenario: Option<Scenario>,
    slow_response_delay: Duration,
) -> serde_json::Result<MethodReply> {
    let Some(scenario) = scenario else {
        return Ok(MethodReply::Result(Value::Array(Vec::new())));
    };

    if let Some(updates) = scenario.scripted_updates() {
        return Ok(MethodReply::Result(serde_json::to_value(updates)?));
    }

    let empty = serde_json::to_value(Vec::<Update>::new())?;
    Ok(match scenario {
        Scenario::PartialRead => MethodReply::Truncated,
        Scenario::SlowResponse => MethodReply::Delayed {
            delay: slow_response_delay,
            result: empty,
        },
        _ => MethodReply::Result(empty),
    })
}

/// `sendMessage`: echo `chat_id` and `text` back as a message from the bot.
///
/// An empty or malformed body behaves like `{}`.
pub fn send_message(body: &[u8]) -> Message {
    let params = SendMessageParams::from_body(body);
    Message {
        message_id: rand::rng().random_range(1..=999_999),
        from: User::bot(),
        chat: Chat::private(params.chat_id.unwrap_or_default()),
        text: params.text.unwrap_or_default(),
    }
}
