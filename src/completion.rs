//! Completion collaborator used by `/gpt`
//!
//! The relay only sees `query(text) -> Result<reply, error>`. Errors are
//! shown to the asking client and never retried.

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CompletionError;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Request/response completion backend
pub trait CompletionQuery: Send + Sync {
    fn query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, CompletionError>>;
}

/// Backend used when no API key is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledCompletion;

impl CompletionQuery for DisabledCompletion {
    fn query<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(async { Err(CompletionError::Unavailable) })
    }
}

/// OpenAI chat-completions backend
#[derive(Debug, Clone)]
pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
    url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: String,
}

impl OpenAiCompletion {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            url: OPENAI_CHAT_URL.to_string(),
        }
    }

    /// Point the backend at another chat-completions compatible URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn request(&self, text: &str) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: text,
            }],
        };

        debug!("Sending completion request to {}", self.url);

        let response: ChatResponse = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

impl CompletionQuery for OpenAiCompletion {
    fn query<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<String, CompletionError>> {
        Box::pin(self.request(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_completion_fails() {
        let err = DisabledCompletion.query("hello").await.unwrap_err();
        assert!(matches!(err, CompletionError::Unavailable));
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gpt-3.5-turbo");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Hello!"}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content, "Hello!");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let backend = OpenAiCompletion::new("key".to_string(), "model".to_string())
            .with_url("http://127.0.0.1:1/v1/chat/completions");
        let err = backend.query("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::Http(_)));
    }
}
