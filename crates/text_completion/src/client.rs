//! OpenAI-compatible chat-completion client

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::config::CompletionConfig;
use crate::error::CompletionError;
use crate::ports::CompletionPort;
use crate::retry::retry_fixed;
use crate::types::{CompletionRequest, CompletionResponse, ResolvedRequest};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Client for the chat-completion API
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    config: CompletionConfig,
}

impl CompletionClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                CompletionError::Configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &CompletionConfig {
        &self.config
    }

    async fn send_once(&self, request: &ResolvedRequest) -> Result<CompletionResponse, CompletionError> {
        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.text,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(self.config.api_key())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if status != reqwest::StatusCode::OK {
            let body = if text.is_empty() {
                "no details".to_string()
            } else {
                text
            };
            error!(status = status.as_u16(), body = %body, "Completion API returned an error");
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::InvalidResponse("no choices returned".to_string()))?;

        Ok(CompletionResponse {
            text: choice.message.content,
            model: request.model.clone(),
            prompt_tokens: parsed.usage.prompt_tokens,
            completion_tokens: parsed.usage.completion_tokens,
            elapsed_secs: 0.0,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> CompletionError {
        if err.is_timeout() {
            CompletionError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            CompletionError::from(err)
        }
    }
}

#[async_trait]
impl CompletionPort for CompletionClient {
    fn default_model(&self) -> String {
        self.config.model.clone()
    }

    #[instrument(skip(self, request), fields(prompt_len = request.text.len()))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, CompletionError> {
        request.validate()?;
        let resolved = request.resolve(&self.config);

        info!(
            model = %resolved.model,
            temperature = resolved.temperature,
            "Processing completion request"
        );

        let start = Instant::now();
        let mut response = retry_fixed(&self.config.retry_policy(), || self.send_once(&resolved)).await?;
        response.elapsed_secs = start.elapsed().as_secs_f64();

        info!(
            elapsed_secs = response.elapsed_secs,
            prompt_tokens = response.prompt_tokens,
            completion_tokens = response.completion_tokens,
            "Completion succeeded"
        );

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config(base_url: &str) -> CompletionConfig {
        CompletionConfig {
            api_key: Some(SecretString::from("sk-test")),
            api_url: base_url.to_string(),
            retry_delay_secs: 0,
            ..Default::default()
        }
    }

    fn success_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19 }
        })
    }

    #[tokio::test]
    async fn posts_chat_request_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "deepseek-chat",
                "messages": [{ "role": "user", "content": "Resume esto" }],
                "temperature": 0.5,
                "max_tokens": 1000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("Resumen")))
            .expect(1)
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let response = client
            .complete(&CompletionRequest::new("Resume esto").with_temperature(0.5))
            .await
            .unwrap();

        assert_eq!(response.text, "Resumen");
        assert_eq!(response.model, "deepseek-chat");
        assert_eq!(response.prompt_tokens, 12);
        assert_eq!(response.completion_tokens, 7);
        assert!(response.elapsed_secs >= 0.0);
    }

    #[tokio::test]
    async fn api_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"bad key\"}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let err = client
            .complete(&CompletionRequest::new("hola"))
            .await
            .unwrap_err();

        match err {
            CompletionError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeouts_are_retried_then_reraised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_body("late"))
                    .set_delay(Duration::from_millis(1500)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let config = CompletionConfig {
            timeout_secs: 1,
            max_retries: 2,
            ..test_config(&server.uri())
        };
        let client = CompletionClient::new(config).unwrap();
        let err = client
            .complete(&CompletionRequest::new("hola"))
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::Timeout { secs: 1 }));
    }

    #[tokio::test]
    async fn connection_refused_is_retryable() {
        let config = CompletionConfig {
            max_retries: 2,
            ..test_config("http://127.0.0.1:1")
        };
        let client = CompletionClient::new(config).unwrap();
        let err = client
            .complete(&CompletionRequest::new("hola"))
            .await
            .unwrap_err();

        assert!(matches!(err, CompletionError::ConnectionFailed(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [],
                "usage": { "prompt_tokens": 1, "completion_tokens": 0 }
            })))
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let err = client
            .complete(&CompletionRequest::new("hola"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("x")))
            .expect(0)
            .mount(&server)
            .await;

        let client = CompletionClient::new(test_config(&server.uri())).unwrap();
        let err = client
            .complete(&CompletionRequest::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::InvalidRequest(_)));
    }

    #[test]
    fn default_model_comes_from_config() {
        let client = CompletionClient::new(CompletionConfig::default()).unwrap();
        assert_eq!(client.default_model(), "deepseek-chat");
    }
}
