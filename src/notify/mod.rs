use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

const TELEGRAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort alert sink. Implementations log their own failures; callers
/// never see them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}

/// Discards everything. Used by backtests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _text: &str) {}
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

pub struct TelegramNotifier {
    client: Client,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(bot_token: Option<String>, chat_id: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(TELEGRAM_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            bot_token,
            chat_id,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        let (Some(token), Some(chat_id)) = (&self.bot_token, &self.chat_id) else {
            warn!("Telegram not configured");
            return;
        };

        let url = format!("https://api.telegram.org/bot{}/sendMessage", token);
        let payload = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
        };

        match self.client.post(&url).json(&payload).send().await {
            Ok(resp) if !resp.status().is_success() => {
                error!("Telegram failed: HTTP {}", resp.status());
            }
            Ok(_) => {}
            Err(e) => error!("Telegram failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_only_with_token_and_chat() {
        assert!(!TelegramNotifier::new(None, None).is_configured());
        assert!(!TelegramNotifier::new(Some("t".into()), None).is_configured());
        assert!(TelegramNotifier::new(Some("t".into()), Some("1".into())).is_configured());
    }

    #[tokio::test]
    async fn unconfigured_send_returns_quietly() {
        TelegramNotifier::new(None, None).send("hello").await;
        NoopNotifier.send("hello").await;
    }
}
