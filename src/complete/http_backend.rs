use super::Completer;
use crate::config::{parse_base_url, CompletionConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Completer for OpenAI-compatible `/v1/chat/completions` endpoints
pub struct HttpCompleter {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.url).map_err(|e| {
            Error::Config(format!("Invalid completion URL '{}': {}", config.url, e))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let api_key = config.api_key();
        if api_key.is_none() {
            warn!(
                "No completion API key found in ${}; sending unauthenticated requests",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            base_url,
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Completer for HttpCompleter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = self
            .base_url
            .join("v1/chat/completions")
            .map_err(|e| Error::Config(format!("Invalid completion backend URL: {}", e)))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Requesting completion from {} ({})", url, self.model);

        let mut builder = self.client.post(url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::CompletionProvider(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::CompletionProvider(format!(
                "Request failed with status {}: {}",
                status, body
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::CompletionProvider(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::CompletionProvider("Response contained no choices".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> CompletionConfig {
        CompletionConfig {
            url: server.uri(),
            model: "test-chat".to_string(),
            api_key_env: String::new(),
            max_tokens: 64,
            temperature: 0.0,
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "test-chat",
                "max_tokens": 64,
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "hi there"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .mount(&server)
            .await;

        let completer = HttpCompleter::new(&config_for(&server)).unwrap();
        assert_eq!(completer.complete("hello").await.unwrap(), "hi there");
    }

    #[tokio::test]
    async fn test_complete_keeps_base_url_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/proxy/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "proxied"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.url = format!("{}/proxy/", server.uri());
        let completer = HttpCompleter::new(&config).unwrap();
        assert_eq!(completer.complete("hello").await.unwrap(), "proxied");
    }

    #[tokio::test]
    async fn test_complete_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"messages": [{"content": "boom"}]})))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"messages": [{"content": "empty"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let completer = HttpCompleter::new(&config_for(&server)).unwrap();
        for prompt in ["boom", "empty"] {
            assert!(matches!(
                completer.complete(prompt).await,
                Err(Error::CompletionProvider(_))
            ));
        }
    }
}
