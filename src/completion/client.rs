//! HTTP client for the chat completion endpoint

use crate::settings::Credential;
use crate::{EmtyError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// Configuration for the completion client
#[derive(Clone, Debug)]
pub struct CompletionConfig {
    /// Chat completions URL
    pub endpoint: String,
    /// Model identifier
    pub model: String,
    /// Instruction sent with every prompt
    pub system_prompt: String,
    /// Maximum tokens in the reply
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Reply used when the service answers without usable content
    pub placeholder_reply: String,
    /// Request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            system_prompt:
                "Sen yardımsever bir AI asistanısın. Türkçe olarak kısa ve net cevaplar ver."
                    .to_string(),
            max_tokens: 150,
            temperature: 0.7,
            placeholder_reply: "Cevap alınamadı.".to_string(),
            timeout: None,
        }
    }
}

impl CompletionConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the reply text from a response body
///
/// A body that parses but carries no usable content yields `placeholder`; a
/// body that does not parse at all is a transport error.
pub fn parse_reply(body: &str, placeholder: &str) -> Result<String> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| EmtyError::Transport(format!("Failed to parse response: {}", e)))?;

    let reply = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.trim().is_empty())
        .unwrap_or_else(|| placeholder.to_string());

    Ok(reply)
}

/// Single-shot completion client, no retries
#[derive(Clone, Debug)]
pub struct CompletionClient {
    client: Client,
    config: CompletionConfig,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| EmtyError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Send `prompt` and return the reply text
    pub async fn complete(&self, prompt: &str, credential: Option<&Credential>) -> Result<String> {
        let credential = credential
            .ok_or_else(|| EmtyError::Config("API key is not configured".into()))?;

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending completion request to {}", self.config.endpoint);

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(credential.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                EmtyError::Transport(format!("Request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            error!("Completion service returned {}", status);
            return Err(EmtyError::Transport(format!("API request failed: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| EmtyError::Transport(format!("Failed to read response: {}", e)))?;

        parse_reply(&body, &self.config.placeholder_reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLACEHOLDER: &str = "Cevap alınamadı.";

    #[test]
    fn test_config_defaults() {
        let config = CompletionConfig::default();
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.max_tokens, 150);
        assert_eq!(config.temperature, 0.7);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = CompletionConfig::default()
            .with_model("gpt-4o-mini")
            .with_max_tokens(64)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 64);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_request_shape() {
        let request = ChatCompletionRequest {
            model: "gpt-4",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "be brief",
                },
                ChatMessage {
                    role: "user",
                    content: "merhaba",
                },
            ],
            max_tokens: 150,
            temperature: 0.5,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "merhaba");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["temperature"], 0.5);
    }

    #[test]
    fn test_parse_reply_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Selam!"}}]}"#;
        assert_eq!(parse_reply(body, PLACEHOLDER).unwrap(), "Selam!");
    }

    #[test]
    fn test_parse_reply_without_content_uses_placeholder() {
        for body in [
            r#"{}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{"message":{"content":""}}]}"#,
            r#"{"choices":[{}]}"#,
        ] {
            assert_eq!(parse_reply(body, PLACEHOLDER).unwrap(), PLACEHOLDER, "{}", body);
        }
    }

    #[test]
    fn test_parse_reply_garbage_is_transport_error() {
        assert!(matches!(
            parse_reply("<html>bad gateway</html>", PLACEHOLDER),
            Err(EmtyError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_credential_is_config_error() {
        let client = CompletionClient::new(CompletionConfig::default()).unwrap();
        let result = client.complete("test", None).await;
        assert!(matches!(result, Err(EmtyError::Config(_))));
    }
}
