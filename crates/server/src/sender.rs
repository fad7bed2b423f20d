//! Outbound delivery adapter: posts reply text to the messaging platform's
//! HTTP gateway. The decision core only ever sees the `MessageSender` port.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use cartly_core::domain::conversation::ConversationId;
use cartly_core::ports::{DeliveryFailure, MessageSender};

pub struct HttpMessageSender {
    http: reqwest::Client,
    api_url: String,
    api_token: SecretString,
    sender_id: String,
}

impl HttpMessageSender {
    pub fn new(
        api_url: impl Into<String>,
        api_token: SecretString,
        sender_id: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_token,
            sender_id: sender_id.into(),
        }
    }
}

#[derive(Serialize)]
struct OutboundText<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

#[async_trait]
impl MessageSender for HttpMessageSender {
    async fn send_text(&self, id: &ConversationId, text: &str) -> Result<(), DeliveryFailure> {
        let payload = OutboundText { from: &self.sender_id, to: &id.0, text };

        let response = self
            .http
            .post(format!("{}/messages", self.api_url))
            .bearer_auth(self.api_token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| DeliveryFailure(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryFailure(format!("messaging gateway returned {status}")));
        }

        Ok(())
    }
}
