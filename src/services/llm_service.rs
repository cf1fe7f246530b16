use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use crate::config::LlmSettings;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Request(err.to_string())
    }
}

/// Opaque text generation: prompt in, free-form text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(
        &self,
        user_answers: &JsonValue,
        correct_answers: &JsonValue,
        questions: &JsonValue,
    ) -> Result<JsonValue, BackendError>;
}

/// The capabilities currently wired into the dispatcher. Either may be absent.
#[derive(Clone, Default)]
pub struct Backends {
    pub completion: Option<Arc<dyn CompletionBackend>>,
    pub analysis: Option<Arc<dyn AnalysisBackend>>,
}

impl Backends {
    pub fn new(
        completion: Option<Arc<dyn CompletionBackend>>,
        analysis: Option<Arc<dyn AnalysisBackend>>,
    ) -> Self {
        Self {
            completion,
            analysis,
        }
    }

    /// Builds the HTTP-backed capabilities. Without an API key nothing is wired
    /// and every quiz request is served from the fallback bank.
    pub fn from_settings(settings: &LlmSettings, client: Client) -> Self {
        if settings.api_key.trim().is_empty() {
            tracing::warn!("LLM_API_KEY not set, generation and analysis backends are unavailable");
            return Self::default();
        }
        let chat = OpenAiChat::new(settings.clone(), client);
        tracing::info!(
            "Generation backend bound: model={} base_url={}",
            settings.model,
            settings.base_url
        );
        Self {
            completion: Some(Arc::new(OpenAiCompletion { chat: chat.clone() })),
            analysis: Some(Arc::new(OpenAiAnalysis { chat })),
        }
    }
}

#[derive(Clone)]
struct OpenAiChat {
    client: Client,
    settings: LlmSettings,
}

impl OpenAiChat {
    fn new(settings: LlmSettings, client: Client) -> Self {
        Self { client, settings }
    }

    async fn chat(&self, payload: JsonValue) -> Result<String, BackendError> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let res = self
            .client
            .post(url)
            .bearer_auth(&self.settings.api_key)
            .json(&payload)
            .timeout(self.settings.http_timeout)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let body: JsonValue = res.json().await?;

        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| BackendError::InvalidResponse("missing choices[0].message.content".into()))
    }
}

pub struct OpenAiCompletion {
    chat: OpenAiChat,
}

#[async_trait]
impl CompletionBackend for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let payload = serde_json::json!({
            "model": self.chat.settings.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": self.chat.settings.max_tokens,
            "temperature": self.chat.settings.temperature,
            "top_p": 0.92
        });
        self.chat.chat(payload).await
    }
}

pub struct OpenAiAnalysis {
    chat: OpenAiChat,
}

#[async_trait]
impl AnalysisBackend for OpenAiAnalysis {
    async fn analyze(
        &self,
        user_answers: &JsonValue,
        correct_answers: &JsonValue,
        questions: &JsonValue,
    ) -> Result<JsonValue, BackendError> {
        let system_prompt = r#"You are a GATE CSE tutor reviewing a submitted quiz.
For every question the student got wrong, explain the misconception behind the chosen answer
and what to revise. Summarise weak topics at the end.
Return a JSON object: { "mistakes": [{"id": "...", "explanation": "..."}], "weak_topics": ["..."], "summary": "..." }"#;

        let user_content = serde_json::json!({
            "questions": questions,
            "user_answers": user_answers,
            "correct_answers": correct_answers,
        });

        let payload = serde_json::json!({
            "model": self.chat.settings.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content.to_string()}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.2
        });

        let content = self.chat.chat(payload).await?;
        serde_json::from_str(&content).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}
