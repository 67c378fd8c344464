use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Shown in the transcript whenever the exchange with the backend fails:
/// connection error, non-success status, or a body that doesn't parse.
pub const CONNECT_ERROR_REPLY: &str =
    "Sorry, I'm having trouble connecting to the server. Please try again later.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    response: String,
}

#[derive(Deserialize)]
struct StatusReply {
    status: String,
}

/// Client for the customer-care bot backend.
///
/// Cheap to clone; clones share the underlying connection pool, so one
/// instance can be handed to a background send task while the app keeps its
/// own copy.
#[derive(Clone)]
pub struct CareClient {
    client: Client,
    base_url: String,
}

impl CareClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one user message and return the bot's reply text.
    ///
    /// Exactly one attempt: no retry, no timeout. Every failure mode comes
    /// back as `Err`, and the session controller folds it into an
    /// error-flagged transcript entry, so callers never need a separate
    /// error path.
    pub async fn send(&self, text: &str) -> Result<String> {
        let url = format!("{}/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest { message: text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "care-bot request failed with status: {}",
                response.status()
            ));
        }

        let reply: ChatReply = response.json().await?;
        Ok(reply.response)
    }

    /// Probe the backend's health endpoint, returning its reported status.
    pub async fn health(&self) -> Result<String> {
        let url = format!("{}/health", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("health check failed: {}", response.status()));
        }

        let reply: StatusReply = response.json().await?;
        Ok(reply.status)
    }

    /// Ask the backend to drop its rolling conversation context. Paired with
    /// clearing the local transcript so both sides restart from nothing.
    pub async fn clear_history(&self) -> Result<()> {
        let url = format!("{}/clear", self.base_url);

        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("clear request failed: {}", response.status()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_request_carries_single_message_field() {
        let value = serde_json::to_value(ChatRequest { message: "Hello" }).unwrap();
        assert_eq!(value, json!({ "message": "Hello" }));
    }

    #[test]
    fn chat_reply_parses_backend_body() {
        // The backend also sends its own timestamp; we only read the reply.
        let body = r#"{"response": "Hi there!", "timestamp": "2024-01-01T00:00:00"}"#;
        let reply: ChatReply = serde_json::from_str(body).unwrap();
        assert_eq!(reply.response, "Hi there!");
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let result = serde_json::from_str::<ChatReply>(r#"{"detail": "boom"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = CareClient::new("http://127.0.0.1:8000/");
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
    }

    #[tokio::test]
    async fn send_to_unreachable_endpoint_fails() {
        // Port 9 (discard) should refuse the connection immediately.
        let client = CareClient::new("http://127.0.0.1:9");
        assert!(client.send("Hello").await.is_err());
    }
}
