// src/services/telegram.rs

//! Telegram Bot API channel.
//!
//! Outbound messages go through `sendMessage` with an inline keyboard;
//! inbound traffic is read by long-polling `getUpdates`.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::models::{Button, NamedAction, TelegramConfig, UserId};
use crate::services::{Inbound, InboundSource, MessagingChannel};
use crate::utils::http::create_long_poll_client;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    from: Option<Sender>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Sender {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: Sender,
    #[serde(default)]
    data: Option<String>,
}

/// Messaging channel backed by a Telegram bot.
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: String,
    poll_timeout_secs: u64,
    offset: AtomicI64,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        if config.token.trim().is_empty() {
            return Err(AppError::config(
                "telegram.token is empty (set TELEGRAM_BOT_TOKEN)",
            ));
        }

        Ok(Self {
            client: create_long_poll_client(config.poll_timeout_secs)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.trim().to_string(),
            poll_timeout_secs: config.poll_timeout_secs,
            offset: AtomicI64::new(0),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call(&self, method: &str, body: &Value) -> Result<Value> {
        // Request errors carry the URL, which embeds the token.
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::channel(e.without_url()))?;

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| AppError::channel(e.without_url()))?;

        if !parsed.ok {
            return Err(AppError::channel(format!(
                "{} failed: {}",
                method,
                parsed.description.as_deref().unwrap_or("no description")
            )));
        }
        Ok(parsed.result)
    }

    /// Wait for the next batch of interactions.
    ///
    /// The update offset is advanced past everything returned, including
    /// updates that carry nothing the bot understands.
    pub async fn poll_updates(&self) -> Result<Vec<Inbound>> {
        let body = json!({
            "offset": self.offset.load(Ordering::SeqCst),
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let result = self.call("getUpdates", &body).await?;
        let updates: Vec<Update> = serde_json::from_value(result)?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::SeqCst);
        }

        Ok(updates.iter().filter_map(inbound_from_update).collect())
    }
}

#[async_trait]
impl MessagingChannel for TelegramChannel {
    async fn send(&self, recipient: UserId, text: &str, buttons: &[Button]) -> Result<()> {
        let mut body = json!({
            "chat_id": recipient,
            "text": text,
            "disable_web_page_preview": false,
        });
        if !buttons.is_empty() {
            body["reply_markup"] = keyboard(buttons);
        }
        self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

#[async_trait]
impl InboundSource for TelegramChannel {
    async fn next_batch(&self) -> Result<Vec<Inbound>> {
        self.poll_updates().await
    }
}

/// Choices presented side by side share a row.
fn is_choice(action: &NamedAction) -> bool {
    matches!(
        action,
        NamedAction::YearFilter(_) | NamedAction::PriceFilter(_) | NamedAction::Subscribe(_)
    )
}

/// Build an `InlineKeyboardMarkup`. Runs of choice buttons form one row;
/// every other button gets a row of its own.
fn keyboard(buttons: &[Button]) -> Value {
    let mut rows: Vec<Vec<Value>> = Vec::new();
    let mut previous_was_choice = false;

    for button in buttons {
        let cell = json!({
            "text": button.label,
            "callback_data": button.action.to_string(),
        });
        let choice = is_choice(&button.action);
        match rows.last_mut() {
            Some(row) if choice && previous_was_choice => row.push(cell),
            _ => rows.push(vec![cell]),
        }
        previous_was_choice = choice;
    }

    json!({ "inline_keyboard": rows })
}

fn inbound_from_update(update: &Update) -> Option<Inbound> {
    if let Some(query) = &update.callback_query {
        let data = query.data.clone().unwrap_or_default();
        return Some(Inbound::action(query.from.id, data, Some(query.id.clone())));
    }

    let message = update.message.as_ref()?;
    let text = message.text.as_deref()?;
    let user_id = message.from.as_ref().map_or(message.chat.id, |s| s.id);
    Some(Inbound::from_text(user_id, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubscriptionTier;
    use crate::services::{Command, InboundKind};

    fn channel() -> TelegramChannel {
        let config = TelegramConfig {
            api_base: "https://api.telegram.org/".into(),
            token: "123:abc".into(),
            poll_timeout_secs: 30,
        };
        TelegramChannel::new(&config).unwrap()
    }

    fn update(value: Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        let config = TelegramConfig {
            token: "  ".into(),
            ..TelegramConfig::default()
        };
        assert!(matches!(
            TelegramChannel::new(&config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_method_url() {
        assert_eq!(
            channel().method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_keyboard_layout() {
        let buttons = [
            Button::new("Yes", NamedAction::YearFilter(true)),
            Button::new("No", NamedAction::YearFilter(false)),
            Button::new("Delete", NamedAction::DeleteSearch(7)),
            Button::new("New search", NamedAction::StartNewSearch),
        ];
        let markup = keyboard(&buttons);
        let rows = markup["inline_keyboard"].as_array().unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].as_array().unwrap().len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "year_yes");
        assert_eq!(rows[0][1]["text"], "No");
        assert_eq!(rows[1][0]["callback_data"], "delete_search_7");
        assert_eq!(rows[2][0]["callback_data"], "start_new_search");
    }

    #[test]
    fn test_tier_buttons_share_a_row() {
        let buttons = [
            Button::new("Premium", NamedAction::Subscribe(SubscriptionTier::Premium)),
            Button::new("VIP", NamedAction::Subscribe(SubscriptionTier::Vip)),
        ];
        let rows = keyboard(&buttons)["inline_keyboard"].clone();
        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert_eq!(rows[0][1]["callback_data"], "subscribe_vip");
    }

    #[test]
    fn test_message_update_becomes_inbound() {
        let u = update(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "chat": { "id": 555, "type": "private" },
                "from": { "id": 555, "is_bot": false, "first_name": "A" },
                "text": "/mysearches"
            }
        }));
        let inbound = inbound_from_update(&u).unwrap();
        assert_eq!(inbound.user_id, 555);
        assert_eq!(inbound.kind, InboundKind::Command(Command::MySearches));
    }

    #[test]
    fn test_callback_update_becomes_action() {
        let u = update(json!({
            "update_id": 11,
            "callback_query": {
                "id": "cb-1",
                "from": { "id": 77, "is_bot": false, "first_name": "B" },
                "data": "price_no"
            }
        }));
        let inbound = inbound_from_update(&u).unwrap();
        assert_eq!(inbound, Inbound::action(77, "price_no", Some("cb-1".into())));
    }

    #[test]
    fn test_non_text_updates_ignored() {
        let photo = update(json!({
            "update_id": 12,
            "message": { "message_id": 2, "chat": { "id": 1 }, "photo": [] }
        }));
        assert!(inbound_from_update(&photo).is_none());

        let edited = update(json!({ "update_id": 13, "edited_message": {} }));
        assert!(inbound_from_update(&edited).is_none());
    }

    #[test]
    fn test_api_error_response() {
        let parsed: ApiResponse = serde_json::from_value(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        }))
        .unwrap();
        assert!(!parsed.ok);
        assert_eq!(
            parsed.description.as_deref(),
            Some("Forbidden: bot was blocked by the user")
        );
    }
}
