//! Telegram channel — long-polls the Bot API for messages and button presses.
//!
//! Choices are rendered as a one-column inline keyboard whose callback data
//! is the choice token. A response to a button press edits the message that
//! carried the button, like a menu changing in place.

use async_trait::async_trait;
use serde_json::Value;

use crate::channels::{
    Channel, ChoiceButton, IncomingMessage, MessagePayload, MessageStream, OutgoingResponse,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Pause before polling again after a failed getUpdates.
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: String,
    allowed_users: Vec<String>,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    async fn post(&self, method: &str, body: &Value) -> Result<reqwest::Response, ChannelError> {
        self.client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })
    }

    /// Send a response as a new message. Long texts are split; the keyboard
    /// goes on the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        response: &OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(&response.content, TELEGRAM_MAX_MESSAGE_LENGTH);
        let keyboard = inline_keyboard(&response.choices);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let markup = if i == last { keyboard.as_ref() } else { None };
            self.send_message_chunk(chat_id, chunk, markup).await?;
        }
        Ok(())
    }

    /// Send a single message chunk (≤4096 chars).
    async fn send_message_chunk(
        &self,
        chat_id: &str,
        text: &str,
        reply_markup: Option<&Value>,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(markup) = reply_markup {
            body["reply_markup"] = markup.clone();
        }

        let resp = self.post("sendMessage", &body).await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage returned {status}: {err}"),
            });
        }
        Ok(())
    }

    /// Replace the text and keyboard of an earlier bot message.
    async fn edit_message(
        &self,
        chat_id: &str,
        message_id: i64,
        response: &OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": response.content,
        });
        if let Some(markup) = inline_keyboard(&response.choices) {
            body["reply_markup"] = markup;
        }

        let resp = self.post("editMessageText", &body).await?;
        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        let err = resp.text().await.unwrap_or_default();
        // Pressing the same button twice yields identical content.
        if err.contains("message is not modified") {
            return Ok(());
        }
        Err(ChannelError::SendFailed {
            name: "telegram".into(),
            reason: format!("editMessageText returned {status}: {err}"),
        })
    }

    /// Stop the client's loading spinner on a pressed button.
    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({ "callback_query_id": callback_query_id });
        let resp = self.post("answerCallbackQuery", &body).await?;
        if !resp.status().is_success() {
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("answerCallbackQuery returned {}", resp.status()),
            });
        }
        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let bot_token = self.bot_token.clone();
        let allowed_users = self.allowed_users.clone();
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let url = format!("https://api.telegram.org/bot{}/getUpdates", bot_token);
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let status = resp.status();
                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error ({status}): {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let results = match poll_results(status.is_success(), &data) {
                    Ok(results) => results,
                    Err(reason) => {
                        tracing::warn!("Telegram getUpdates failed ({status}): {reason}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    let username = incoming
                        .metadata
                        .get("username")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown");
                    if !check_user_allowed(&allowed_users, [username, incoming.user_id.as_str()]) {
                        tracing::warn!(
                            "Telegram: ignoring update from unauthorized user: \
                             username={username}, user_id={}",
                            incoming.user_id
                        );
                        continue;
                    }

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        if let Some(callback_id) = msg.metadata.get("callback_query_id").and_then(Value::as_str) {
            if let Err(e) = self.answer_callback_query(callback_id).await {
                tracing::debug!("Telegram answerCallbackQuery failed: {e}");
            }
        }

        let editable = msg.metadata.get("message_id").and_then(Value::as_i64);
        if let Some(message_id) = editable {
            if response.content.len() <= TELEGRAM_MAX_MESSAGE_LENGTH {
                match self.edit_message(chat_id, message_id, &response).await {
                    Ok(()) => return Ok(()),
                    Err(e) => {
                        tracing::warn!("Telegram edit failed, sending a new message: {e}");
                    }
                }
            }
        }

        self.send_message(chat_id, &response).await
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Check if any identity in the iterator matches the allowed users list.
fn check_user_allowed<'a>(
    allowed_users: &[String],
    identities: impl IntoIterator<Item = &'a str>,
) -> bool {
    let ids: Vec<&str> = identities.into_iter().collect();
    allowed_users
        .iter()
        .any(|u| u == "*" || ids.contains(&u.as_str()))
}

/// Extract the update list from a getUpdates reply.
///
/// Fails with the API's `description` on a non-success status, `"ok": false`,
/// or a missing `result` array (bad token, a second poller's 409 Conflict).
fn poll_results(success: bool, data: &Value) -> Result<&Vec<Value>, String> {
    let ok = data.get("ok").and_then(Value::as_bool).unwrap_or(success);
    let results = data.get("result").and_then(Value::as_array);
    match results {
        Some(results) if success && ok => Ok(results),
        _ => Err(data
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("no result in response")
            .to_string()),
    }
}

/// Turn a Bot API update into an incoming message.
///
/// Handles text messages (slash commands included) and callback queries.
/// Everything else yields `None`.
fn parse_update(update: &Value) -> Option<IncomingMessage> {
    if let Some(query) = update.get("callback_query") {
        let data = query.get("data").and_then(Value::as_str)?;
        let from = query.get("from")?;
        let user_id = from.get("id").and_then(Value::as_i64)?.to_string();
        let message = query.get("message");
        let chat_id = message
            .and_then(|m| m.get("chat"))
            .and_then(|c| c.get("id"))
            .and_then(Value::as_i64)
            .map(|id| id.to_string())
            .unwrap_or_else(|| user_id.clone());
        let message_id = message
            .and_then(|m| m.get("message_id"))
            .and_then(Value::as_i64);

        let incoming = IncomingMessage::new(
            "telegram",
            &user_id,
            MessagePayload::Choice(data.to_string()),
        )
        .with_metadata(serde_json::json!({
            "chat_id": chat_id,
            "username": from.get("username").and_then(Value::as_str),
            "message_id": message_id,
            "callback_query_id": query.get("id").and_then(Value::as_str),
        }));
        return Some(with_display_name(incoming, from));
    }

    let message = update.get("message")?;
    let text = message.get("text").and_then(Value::as_str)?;
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?.to_string();
    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_else(|| user_id.clone());

    let payload = match text.strip_prefix('/') {
        Some(command) => {
            // "/start@my_bot args" → "start"
            let name = command.split_whitespace().next().unwrap_or_default();
            let name = name.split('@').next().unwrap_or_default();
            MessagePayload::Command(name.to_string())
        }
        None => MessagePayload::Text(text.to_string()),
    };

    let incoming = IncomingMessage::new("telegram", &user_id, payload).with_metadata(
        serde_json::json!({
            "chat_id": chat_id,
            "username": from.get("username").and_then(Value::as_str),
        }),
    );
    Some(with_display_name(incoming, from))
}

fn with_display_name(incoming: IncomingMessage, from: &Value) -> IncomingMessage {
    let name = from
        .get("first_name")
        .or_else(|| from.get("username"))
        .and_then(Value::as_str);
    match name {
        Some(name) => incoming.with_user_name(name),
        None => incoming,
    }
}

/// Build an inline keyboard with one button per row, or `None` without choices.
fn inline_keyboard(choices: &[ChoiceButton]) -> Option<Value> {
    if choices.is_empty() {
        return None;
    }
    let rows: Vec<Value> = choices
        .iter()
        .map(|c| serde_json::json!([{ "text": c.label, "callback_data": c.token }]))
        .collect();
    Some(serde_json::json!({ "inline_keyboard": rows }))
}

/// Largest char boundary of `s` that is ≤ `index`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        // Find a good split point
        let limit = match floor_char_boundary(remaining, max_len) {
            0 => remaining.chars().next().map_or(remaining.len(), char::len_utf8),
            n => n,
        };
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(limit);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { limit } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
