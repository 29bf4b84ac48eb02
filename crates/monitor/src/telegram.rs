//! Alert delivery over the Telegram Bot HTTP API.

use sentinel_common::error::AppError;
use sentinel_engine::traits::Messenger;

pub struct TelegramMessenger {
    http: reqwest::Client,
    api_base: String,
}

impl TelegramMessenger {
    pub fn new(bot_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: format!("https://api.telegram.org/bot{bot_token}"),
        }
    }
}

impl Messenger for TelegramMessenger {
    async fn send(&self, target: &str, text: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/sendMessage", self.api_base))
            .json(&serde_json::json!({
                "chat_id": target,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| AppError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Delivery(format!(
                "Telegram API returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
