//! OpenAI-compatible chat-completions extractor

use crate::config::ExtractionConfig;
use crate::crawler::{RetryPolicy, TransientKind};
use crate::extraction::parse::parse_model_output;
use crate::extraction::prompt::{build_user_prompt, truncate_chars, SYSTEM_PROMPT};
use crate::extraction::{ExtractionError, Extractor};
use crate::model::ProgramRecord;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model replies can take a while on long pages
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Extractor backed by a chat-completions endpoint
#[derive(Debug, Clone)]
pub struct LlmExtractor {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_input_chars: usize,
    retry: RetryPolicy,
}

impl LlmExtractor {
    /// Builds a new extractor
    ///
    /// # Arguments
    ///
    /// * `config` - The `[extraction]` configuration section
    /// * `api_key` - Bearer token for the endpoint
    pub fn new(config: &ExtractionConfig, api_key: &str) -> Result<Self, ExtractionError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ExtractionError::Client("invalid API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| ExtractionError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_input_chars: config.max_input_chars,
            retry: RetryPolicy::from_extraction_config(config),
        })
    }

    /// Sends one completion request and returns the reply text
    ///
    /// `Ok(None)` means a non-retryable HTTP error, an unreadable response
    /// or a reply without content.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<Option<String>, Attempt> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| Attempt::Failed(TransientKind::from_reqwest(&e), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return match TransientKind::from_status(status) {
                Some(kind) => Err(Attempt::Status(kind, status)),
                None => {
                    tracing::warn!("Extraction request rejected ({}): {}", status, body);
                    Ok(None)
                }
            };
        }

        let parsed: ChatResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) if e.is_decode() => {
                tracing::warn!("Invalid completion response: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(Attempt::Failed(TransientKind::from_reqwest(&e), e.to_string())),
        };

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content))
    }
}

/// Outcome of a failed completion attempt
enum Attempt {
    Failed(Option<TransientKind>, String),
    Status(TransientKind, StatusCode),
}

impl Attempt {
    fn kind(&self) -> Option<TransientKind> {
        match self {
            Self::Failed(kind, _) => *kind,
            Self::Status(kind, _) => Some(*kind),
        }
    }

    fn into_error(self) -> ExtractionError {
        match self {
            Self::Failed(_, message) => ExtractionError::Transport(message),
            Self::Status(TransientKind::RateLimited, _) => ExtractionError::RateLimited,
            Self::Status(_, status) => ExtractionError::Server(status.as_u16()),
        }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, text: &str, url: &str) -> Result<Vec<ProgramRecord>, ExtractionError> {
        if text.trim().is_empty() {
            tracing::debug!("Empty input for {}, nothing to extract", url);
            return Ok(Vec::new());
        }

        let user_prompt = build_user_prompt(url, truncate_chars(text, self.max_input_chars));
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut attempt = 1;
        let reply = loop {
            match self.complete(&request).await {
                Ok(reply) => break reply,
                Err(failure) => {
                    if !self.retry.should_retry(failure.kind(), attempt) {
                        return Err(failure.into_error());
                    }
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(
                        "Extraction attempt {}/{} for {} failed, retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        url,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        let Some(reply) = reply.filter(|r| !r.trim().is_empty()) else {
            tracing::warn!("Empty completion for {}", url);
            return Ok(Vec::new());
        };

        let records = parse_model_output(&reply, url);
        tracing::info!("Extracted {} program(s) from {}", records.len(), url);
        Ok(records)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgramCategory;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(endpoint: &str) -> ExtractionConfig {
        ExtractionConfig {
            endpoint: endpoint.to_string(),
            model: "llama3-8b-8192".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            max_input_chars: 6000,
            max_attempts: 3,
            backoff_base_ms: 1,
            backoff_cap_ms: 5,
        }
    }

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    #[tokio::test]
    async fn test_extracts_programs_from_completion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(completion(
                "```json\n[{\"program_name\": \"BS Nursing\", \"category\": \"undergraduate\", \"admission_open\": true}]\n```",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&create_test_config(&server.uri()), "test-key").unwrap();
        let records = extractor
            .extract("BS Nursing admissions open", "https://zu.edu.pk/nursing")
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].category, ProgramCategory::Undergraduate);
        assert_eq!(records[0].source_url, "https://zu.edu.pk/nursing");
    }

    #[tokio::test]
    async fn test_empty_text_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion("[]"))
            .expect(0)
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&create_test_config(&server.uri()), "k").unwrap();
        let records = extractor.extract("   ", "https://zu.edu.pk/").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&create_test_config(&server.uri()), "k").unwrap();
        let result = extractor.extract("BS Physics", "https://zu.edu.pk/").await;
        assert!(matches!(result, Err(ExtractionError::RateLimited)));
    }

    #[tokio::test]
    async fn test_server_error_recovers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(completion(r#"[{"program_name": "MBA"}]"#))
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&create_test_config(&server.uri()), "k").unwrap();
        let records = extractor.extract("MBA", "https://zu.edu.pk/").await.unwrap();
        assert_eq!(records[0].category, ProgramCategory::Masters);
    }

    #[tokio::test]
    async fn test_client_error_yields_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&create_test_config(&server.uri()), "k").unwrap();
        let records = extractor.extract("BS Physics", "https://zu.edu.pk/").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_completion_yields_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion("Sorry, I cannot help with that."))
            .mount(&server)
            .await;

        let extractor = LlmExtractor::new(&create_test_config(&server.uri()), "k").unwrap();
        let records = extractor.extract("BS Physics", "https://zu.edu.pk/").await.unwrap();
        assert!(records.is_empty());
    }
}
