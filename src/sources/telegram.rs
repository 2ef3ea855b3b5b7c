//! Telegram Bot API client.
//!
//! Delivery is best-effort: callers log and swallow failures so a flaky
//! notification channel never stalls signal tracking.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use reqwest::multipart;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::error::{AppError, Result};

use super::body_snippet;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Outbound notification channel.
pub trait Notifier: Send + Sync {
    /// Deliver an HTML-formatted text message.
    fn send_text<'a>(
        &'a self,
        html: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Deliver a photo with an HTML caption.
    fn send_image<'a>(
        &'a self,
        path: &'a Path,
        caption: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Deliver a sticker by file_id.
    fn send_sticker<'a>(
        &'a self,
        sticker: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Telegram Bot API client bound to one destination chat.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramClient {
    /// Create a new client for the given bot token and chat.
    pub fn new(token: String, chat_id: String) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("Augury/1.0")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            token,
            chat_id,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", TELEGRAM_API_URL, self.token, method)
    }

    async fn check(&self, method: &str, response: reqwest::Response) -> Result<()> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Notify(format!(
                "{} returned {}: {}",
                method,
                status,
                body_snippet(&text)
            )));
        }
        debug!("Telegram {} delivered", method);
        Ok(())
    }
}

impl Notifier for TelegramClient {
    fn send_text<'a>(
        &'a self,
        html: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint("sendMessage"))
                .json(&json!({
                    "chat_id": self.chat_id,
                    "text": html,
                    "parse_mode": "HTML",
                }))
                .send()
                .await?;
            self.check("sendMessage", response).await
        })
    }

    fn send_image<'a>(
        &'a self,
        path: &'a Path,
        caption: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let bytes = tokio::fs::read(path).await?;
            let photo = multipart::Part::bytes(bytes)
                .file_name("chart.png")
                .mime_str("image/png")?;
            let form = multipart::Form::new()
                .text("chat_id", self.chat_id.clone())
                .text("caption", caption.to_string())
                .text("parse_mode", "HTML")
                .part("photo", photo);

            let response = self
                .client
                .post(self.endpoint("sendPhoto"))
                .multipart(form)
                .send()
                .await?;
            self.check("sendPhoto", response).await
        })
    }

    fn send_sticker<'a>(
        &'a self,
        sticker: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint("sendSticker"))
                .json(&json!({
                    "chat_id": self.chat_id,
                    "sticker": sticker,
                }))
                .send()
                .await?;
            self.check("sendSticker", response).await
        })
    }
}
