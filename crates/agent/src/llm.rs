use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

use adpilot_core::config::{LlmConfig, LlmProvider};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

/// One generation request: a system instruction plus the turns so far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm credential `{0}` is not configured")]
    MissingCredential(&'static str),
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm endpoint returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("llm response had no text candidate")]
    EmptyResponse,
    #[error("llm script exhausted")]
    ScriptExhausted,
}

impl From<reqwest::Error> for LlmError {
    fn from(error: reqwest::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

enum Auth {
    ApiKey(SecretString),
    Bearer(SecretString),
}

/// Gemini `generateContent` over either the Generative Language API (API
/// key) or Vertex AI (bearer token).
pub struct GeminiClient {
    client: Client,
    url: String,
    auth: Auth,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Transport(error.to_string()))?;

        let (url, auth) = match config.provider {
            LlmProvider::Gemini => {
                let key = config.api_key.clone().ok_or(LlmError::MissingCredential("llm.api_key"))?;
                let base = config
                    .base_url
                    .as_deref()
                    .unwrap_or("https://generativelanguage.googleapis.com")
                    .trim_end_matches('/');
                let url = format!("{base}/v1beta/models/{}:generateContent", config.model);
                (url, Auth::ApiKey(key))
            }
            LlmProvider::VertexAi => {
                let token = config
                    .access_token
                    .clone()
                    .ok_or(LlmError::MissingCredential("llm.access_token"))?;
                let project =
                    config.project.as_deref().ok_or(LlmError::MissingCredential("llm.project"))?;
                let location = &config.location;
                (
                    format!(
                        "https://{location}-aiplatform.googleapis.com/v1/projects/{project}\
                         /locations/{location}/publishers/google/models/{}:generateContent",
                        config.model
                    ),
                    Auth::Bearer(token),
                )
            }
        };

        Ok(Self { client, url, auth })
    }
}

fn request_body(prompt: &Prompt) -> Value {
    let contents: Vec<Value> = prompt
        .messages
        .iter()
        .map(|message| {
            json!({ "role": message.role.as_str(), "parts": [{ "text": message.text }] })
        })
        .collect();

    let mut body = json!({ "contents": contents });
    if !prompt.system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": prompt.system }] });
    }
    body
}

fn candidate_text(body: &Value) -> Option<String> {
    let parts = body.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts.iter().filter_map(|part| part.get("text")?.as_str()).collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let request = self.client.post(&self.url).json(&request_body(prompt));
        let request = match &self.auth {
            Auth::ApiKey(key) => request.header("x-goog-api-key", key.expose_secret()),
            Auth::Bearer(token) => request.bearer_auth(token.expose_secret()),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Http { status: status.as_u16(), message });
        }

        let body: Value = response.json().await?;
        candidate_text(&body).ok_or(LlmError::EmptyResponse)
    }
}

/// Replays canned replies in order and records every prompt it was given.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        lock(&self.prompts).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        lock(&self.prompts).push(prompt.clone());
        lock(&self.replies).pop_front().ok_or(LlmError::ScriptExhausted)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{candidate_text, request_body, Message, Prompt};

    #[test]
    fn request_body_carries_system_instruction_and_roles() {
        let prompt = Prompt {
            system: "You manage campaigns.".to_string(),
            messages: vec![Message::user("go"), Message::model("{\"final\": \"done\"}")],
        };

        let body = request_body(&prompt);

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You manage campaigns.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "{\"final\": \"done\"}");
    }

    #[test]
    fn candidate_text_joins_parts_and_rejects_blank() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "hello " }, { "text": "world" }] } }]
        });
        assert_eq!(candidate_text(&body).as_deref(), Some("hello world"));

        let blank = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] });
        assert_eq!(candidate_text(&blank), None);
        assert_eq!(candidate_text(&json!({})), None);
    }
}
