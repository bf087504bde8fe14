//! OpenAI-compatible chat completions client.
//!
//! Only the pieces the step generator needs are modelled: plain text messages,
//! temperature and the JSON response format.

use std::time::Duration;

use async_trait::async_trait;
use clipmaker_core::ChatConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{AgentError, Result};

/// Anything that can answer a chat completion request.
///
/// Implemented by [`ChatClient`]; tests supply canned responses.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send one request and return the parsed response.
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// HTTP client for `POST {base_url}/chat/completions`.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ChatClient {
    /// Create a client for the given endpoint.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the chat configuration.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::new(&config.api_key, &config.base_url, config.timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatCompletion for ChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        trace!("Sending chat request: {:?}", request);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Request(format!("failed to read response: {}", e)))?;

        debug!(
            model = %request.model,
            tokens = response.usage.as_ref().map_or(0, |u| u.total_tokens),
            "Chat response received"
        );

        Ok(response)
    }
}

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,

    /// Conversation messages.
    pub messages: Vec<ChatMessage>,

    /// Temperature for generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Requested output format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// A message in the chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: String,

    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// `response_format` parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    /// Ask the model for a single JSON object.
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

/// Chat completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Completion choices.
    #[serde(default)]
    pub choices: Vec<ChatChoice>,

    /// Token usage information.
    pub usage: Option<ChatUsage>,
}

impl ChatResponse {
    /// Text content of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// A choice in the completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    /// The message for this choice.
    pub message: ResponseMessage,

    /// Finish reason (stop, length, etc.).
    pub finish_reason: Option<String>,
}

/// Message in a completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    /// Text content of the response.
    pub content: Option<String>,
}

/// Token usage information.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: Some(0.7),
            response_format: Some(ResponseFormat::json_object()),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["response_format"], json!({"type": "json_object"}));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let request = ChatRequest {
            model: "gpt-4o".into(),
            messages: vec![],
            temperature: None,
            response_format: None,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("temperature").is_none());
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn test_response_content() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"activities\": []}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap();

        assert_eq!(response.content(), Some("{\"activities\": []}"));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_response_without_content() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        }))
        .unwrap();
        assert_eq!(response.content(), None);

        let response: ChatResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.content(), None);
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let client = ChatClient::new("key", "https://api.example.com/v1/", Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
    }
}
