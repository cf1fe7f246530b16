use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::question::Difficulty;
use crate::models::quiz::QuizRequest;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateQuizPayload {
    #[serde(default, deserialize_with = "trim_optional_string")]
    #[validate(required(message = "Subject and topic required"))]
    pub subject: Option<String>,

    #[serde(default, deserialize_with = "trim_optional_string")]
    #[validate(required(message = "Subject and topic required"))]
    pub topic: Option<String>,

    #[serde(default, deserialize_with = "trim_optional_string")]
    pub difficulty: Option<String>,
}

impl GenerateQuizPayload {
    pub fn into_request(self) -> Result<QuizRequest> {
        let (Some(subject), Some(topic)) = (self.subject, self.topic) else {
            return Err(Error::BadRequest("Subject and topic required".to_string()));
        };
        let difficulty = match self.difficulty {
            Some(raw) => raw.parse::<Difficulty>().map_err(Error::BadRequest)?,
            None => Difficulty::default(),
        };
        Ok(QuizRequest {
            subject,
            topic,
            difficulty,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnalyzePayload {
    #[validate(required(message = "Missing analysis fields"))]
    pub user_answers: Option<JsonValue>,
    #[validate(required(message = "Missing analysis fields"))]
    pub correct_answers: Option<JsonValue>,
    #[validate(required(message = "Missing analysis fields"))]
    pub questions: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub status: String,
    pub analysis: JsonValue,
}

/// Read-only snapshot served by `/health` and the admin endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: String,
    pub demo_mode: bool,
    pub quiz_ready: bool,
    pub analysis_ready: bool,
    pub locked: bool,
    pub cancelled: bool,
    pub last_reload: chrono::DateTime<chrono::Utc>,
}

fn trim_optional_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}
