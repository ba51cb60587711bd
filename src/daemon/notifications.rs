//! Notification dispatch: one outbound Telegram message per status change.
//!
//! The transport is fire-and-confirm: a send either succeeds or returns an
//! error; there is no queueing or retry here. Deduplication happens upstream
//! via the watch loop's change detection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::config::TelegramConfig;
use crate::core::errors::{AtwError, Result};
use crate::upstream::classify::TestResult;

/// Capability seam for delivering a text message to a chat.
pub trait Notifier {
    /// Deliver `text` to the given chat. Errors are fatal to the watch loop.
    fn send(&self, chat_id: i64, text: &str) -> Result<()>;
}

/// Render the outbound message for a newly observed status.
#[must_use]
pub fn update_message(status: TestResult) -> String {
    format!("Test status has been updated: {status}")
}

// ──────────────────── Telegram transport ────────────────────

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

/// The subset of the Bot API response we care about.
#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// [`Notifier`] backed by the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    api_base: String,
    token: String,
    http: reqwest::blocking::Client,
}

impl TelegramNotifier {
    /// Build a notifier from Telegram configuration.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AtwError::Notify {
                details: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http,
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        // Error details never include the URL: it embeds the bot token.
        let response = self
            .http
            .post(self.send_message_url())
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .map_err(|e| AtwError::Notify {
                details: format!("sendMessage to chat {chat_id}: {}", e.without_url()),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AtwError::Notify {
                details: format!("sendMessage to chat {chat_id}: unexpected status {status}"),
            });
        }

        let body: SendMessageResponse = response.json().map_err(|e| AtwError::Notify {
            details: format!(
                "sendMessage to chat {chat_id}: malformed response: {}",
                e.without_url()
            ),
        })?;

        if !body.ok {
            return Err(AtwError::Notify {
                details: format!(
                    "sendMessage to chat {chat_id}: rejected: {}",
                    body.description.unwrap_or_else(|| "no description".to_string())
                ),
            });
        }

        Ok(())
    }
}
