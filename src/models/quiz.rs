use serde::{Deserialize, Serialize};

use crate::models::question::{Difficulty, QuizQuestion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub subject: String,
    pub topic: String,
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Authoritative,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Success,
    Error,
}

/// Response body of `/generate_quiz`. Exactly one of `demo`, `fallback` or
/// `duration` is present, next to the always-present `origin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub status: QuizStatus,
    pub origin: Origin,
    pub quiz: Vec<QuizQuestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl QuizResult {
    pub fn authoritative(quiz: Vec<QuizQuestion>, duration_secs: f64) -> Self {
        Self {
            status: QuizStatus::Success,
            origin: Origin::Authoritative,
            quiz,
            demo: None,
            fallback: None,
            duration: Some((duration_secs * 100.0).round() / 100.0),
        }
    }

    pub fn demo(quiz: Vec<QuizQuestion>) -> Self {
        Self {
            status: QuizStatus::Success,
            origin: Origin::Fallback,
            quiz,
            demo: Some(true),
            fallback: None,
            duration: None,
        }
    }

    pub fn fallback(quiz: Vec<QuizQuestion>) -> Self {
        Self {
            status: QuizStatus::Success,
            origin: Origin::Fallback,
            quiz,
            demo: None,
            fallback: Some(true),
            duration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fallback_result_serializes_flag_and_origin() {
        let body = serde_json::to_value(QuizResult::fallback(vec![])).unwrap();
        assert_eq!(
            body,
            json!({"status": "success", "origin": "fallback", "quiz": [], "fallback": true})
        );
    }

    #[test]
    fn authoritative_duration_is_rounded() {
        let result = QuizResult::authoritative(vec![], 3.14159);
        assert_eq!(result.duration, Some(3.14));
        assert_eq!(result.origin, Origin::Authoritative);
        assert!(result.demo.is_none() && result.fallback.is_none());
    }
}
