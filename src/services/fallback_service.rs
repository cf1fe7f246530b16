use serde_json::Value as JsonValue;
use std::path::Path;
use tokio::fs;

use crate::config::FallbackSettings;
use crate::models::question::{options_from_value, Answer, Difficulty, QuestionType, QuizQuestion};

/// Precomputed quizzes stored as `<root>/<partition>/<Subject>_<Topic>_<Difficulty>[_setN].json`.
#[derive(Clone, Debug)]
pub struct FallbackBank {
    settings: FallbackSettings,
}

impl FallbackBank {
    pub fn new(settings: FallbackSettings) -> Self {
        Self { settings }
    }

    /// Never fails: missing or unreadable data yields an empty quiz.
    pub async fn lookup(&self, subject: &str, topic: &str, difficulty: Difficulty) -> Vec<QuizQuestion> {
        let names = Self::candidate_names(subject, topic, difficulty);

        for partition in &self.settings.partitions {
            let dir = self.settings.root.join(partition);
            for name in &names {
                let path = dir.join(name);
                let Some(raw) = Self::load_file(&path).await else {
                    continue;
                };
                let questions = Self::normalize(&raw, topic, difficulty);
                if questions.is_empty() {
                    tracing::warn!("Fallback file {} has no questions, skipping", path.display());
                    continue;
                }
                tracing::info!(
                    "Serving {} fallback questions from {}",
                    questions.len(),
                    path.display()
                );
                return questions;
            }
        }

        tracing::warn!(
            "No fallback quiz found for {} / {} / {}",
            subject,
            topic,
            difficulty
        );
        Vec::new()
    }

    pub fn sanitize(name: &str) -> String {
        name.trim()
            .replace(' ', "_")
            .replace('&', "and")
            .replace(['(', ')'], "")
    }

    /// File names tried within each partition, most specific first.
    pub fn candidate_names(subject: &str, topic: &str, difficulty: Difficulty) -> Vec<String> {
        let base = format!(
            "{}_{}_{}",
            Self::sanitize(subject),
            Self::sanitize(topic),
            difficulty
        );
        vec![
            format!("{}_set1.json", base),
            format!("{}_set2.json", base),
            format!("{}.json", base),
        ]
    }

    async fn load_file(path: &Path) -> Option<JsonValue> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::error!("Cannot read fallback file {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Bad JSON file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Accepts `{"questions": [...]}` or `{"quiz": [...]}`; assigns `q1..qN` in
    /// file order and stamps the requested topic and difficulty.
    pub fn normalize(raw: &JsonValue, topic: &str, difficulty: Difficulty) -> Vec<QuizQuestion> {
        let entries = raw
            .get("questions")
            .or_else(|| raw.get("quiz"))
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default();

        entries
            .iter()
            .filter(|q| q.is_object())
            .enumerate()
            .map(|(idx, q)| {
                let question_type = q
                    .get("type")
                    .and_then(|t| t.as_str())
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(QuestionType::Mcq);
                let answer = q
                    .get("answer")
                    .and_then(Answer::from_value)
                    .or_else(|| q.get("answers").and_then(Answer::from_value));

                QuizQuestion {
                    id: format!("q{}", idx + 1),
                    question_type,
                    question: q
                        .get("question")
                        .and_then(|s| s.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    options: q.get("options").map(options_from_value).unwrap_or_default(),
                    answer,
                    topic: topic.to_string(),
                    difficulty,
                }
            })
            .collect()
    }
}
