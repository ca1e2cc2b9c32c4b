//! OpenAI-compatible chat completion client.
//!
//! Every evaluation prompt is sent as a single user message with the
//! configured `max_tokens`, `temperature` and `seed`, so a local Ollama
//! server (`http://localhost:11434`) at temperature 0 gives repeatable answers.

use super::generator::TextGenerator;
use crate::config::LlmConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Text of one completion plus why the model stopped.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub finish_reason: Option<String>,
}

impl Completion {
    /// Whether generation stopped at the `max_tokens` cap.
    pub fn truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

/// Turn a raw HTTP status and body into a completion.
///
/// Non-success statuses become [`EvalError::LlmApi`], using the API's own
/// error message when the body carries one. A success body without choices
/// is a [`EvalError::Generation`] failure. A `null` content is an empty answer.
pub fn parse_completion(status: StatusCode, body: &str) -> Result<Completion> {
    if !status.is_success() {
        let detail = serde_json::from_str::<ApiErrorBody>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.trim().to_string());
        return Err(EvalError::LlmApi(format!("{} from model server: {}", status, detail)));
    }

    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| EvalError::Generation(format!("unreadable completion: {}", e)))?;

    if let Some(usage) = &response.usage {
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion usage"
        );
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| EvalError::Generation("completion has no choices".to_string()))?;

    Ok(Completion {
        text: choice.message.content.unwrap_or_default(),
        finish_reason: choice.finish_reason,
    })
}

/// Chat completion client for the answer model.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    fn request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            seed: self.config.seed,
        }
    }

    /// Send `prompt` as a single user message.
    pub async fn generate(&self, prompt: &str) -> Result<Completion> {
        let mut builder = self.http.post(self.endpoint()).json(&self.request(prompt));
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let completion = parse_completion(status, &body)?;
        if completion.truncated() {
            debug!(model = %self.config.model, "answer hit the max_tokens cap");
        }
        Ok(completion)
    }

    /// Check that the model server answers a trivial prompt.
    pub async fn test_connection(&self) -> Result<()> {
        let completion = self.generate("Say 'hello' and nothing else.").await?;

        if completion.text.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(EvalError::LlmApi(format!(
                "unexpected probe answer: {}",
                completion.text
            )))
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(self.generate(prompt).await?.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_base: &str) -> LlmClient {
        LlmClient::new(LlmConfig {
            api_base: api_base.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_endpoint_ignores_trailing_slash() {
        assert_eq!(
            client("http://localhost:11434/").endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            client("https://api.example.com").endpoint(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_carries_determinism_settings() {
        let client = LlmClient::new(LlmConfig {
            model: "llama3.2:latest".to_string(),
            max_tokens: 300,
            temperature: 0.0,
            seed: 42,
            ..Default::default()
        });
        let body = serde_json::to_value(client.request("Where is Paris?")).unwrap();

        assert_eq!(body["model"], "llama3.2:latest");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["seed"], 42);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Where is Paris?");
    }

    #[test]
    fn test_parse_success() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Paris "},"finish_reason":"stop"}],
                       "usage":{"prompt_tokens":12,"completion_tokens":2,"total_tokens":14}}"#;
        let completion = parse_completion(StatusCode::OK, body).unwrap();
        assert_eq!(completion.text, " Paris ");
        assert!(!completion.truncated());
    }

    #[test]
    fn test_parse_null_content_and_length_stop() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"length"}]}"#;
        let completion = parse_completion(StatusCode::OK, body).unwrap();
        assert_eq!(completion.text, "");
        assert!(completion.truncated());
    }

    #[test]
    fn test_parse_no_choices() {
        let err = parse_completion(StatusCode::OK, r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, EvalError::Generation(_)));
    }

    #[test]
    fn test_parse_api_error_message() {
        let body = r#"{"error":{"message":"model 'llama9' not found","type":"not_found"}}"#;
        let err = parse_completion(StatusCode::NOT_FOUND, body).unwrap_err();
        assert!(matches!(err, EvalError::LlmApi(_)));
        assert!(err.to_string().contains("model 'llama9' not found"));
        assert!(err.is_generation());
    }

    #[test]
    fn test_parse_plain_text_error() {
        let err = parse_completion(StatusCode::BAD_GATEWAY, "upstream down\n").unwrap_err();
        assert!(err.to_string().contains("upstream down"));
    }
}
