use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::GenerationSettings;
use crate::models::question::{QuestionType, QuizQuestion};
use crate::models::quiz::QuizRequest;
use crate::services::llm_service::CompletionBackend;
use crate::services::parser_service::OutputParser;
use crate::services::validation_service::{QuestionValidator, SeenQuestions, ValidatedQuestion};

/// Why a generation run did not produce an authoritative quiz. None of these
/// reach the caller; the dispatcher logs them and serves the fallback bank.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("{phase} quota not met: {collected}/{required}")]
    QuotaShortfall {
        phase: QuestionType,
        collected: usize,
        required: usize,
    },

    #[error("quiz has {collected} questions, {required} required")]
    TotalMismatch { collected: usize, required: usize },

    #[error("generation cancelled")]
    Cancelled,
}

const PROMPT: &str = r#"
Generate GATE CSE {difficulty} level {qtype} questions.

Subject: {subject}
Topic: {topic}

Rules:
- Analytical, numerical, algorithmic, or conceptual only
- No definitions or theoretical memorization
- No "What is", no trivial statements
- Each question must strictly match GATE style
- Output ONLY JSON objects, one per question
- No arrays, no markdown, no lists, no commentary

JSON format:
{shape}

Generate EXACTLY {count} questions.
"#;

fn answer_shape(qtype: QuestionType) -> &'static str {
    match qtype {
        QuestionType::Mcq => {
            r#"{"question": "....", "options": ["...", "...", "...", "..."], "answer": "A"}
(answer is exactly one letter A-D)"#
        }
        QuestionType::Msq => {
            r#"{"question": "....", "options": ["...", "...", "...", "..."], "answer": ["A", "C"]}
(answer lists every correct letter, at least two)"#
        }
        QuestionType::Nat => {
            r#"{"question": "....", "options": [], "answer": "42.5"}
(answer is a single number)"#
        }
    }
}

pub fn build_prompt(request: &QuizRequest, qtype: QuestionType, count: usize) -> String {
    PROMPT
        .replace("{difficulty}", request.difficulty.as_str())
        .replace("{qtype}", qtype.as_str())
        .replace("{subject}", &request.subject)
        .replace("{topic}", &request.topic)
        .replace("{shape}", answer_shape(qtype))
        .replace("{count}", &count.to_string())
}

pub struct GenerationOrchestrator {
    backend: Arc<dyn CompletionBackend>,
    validator: QuestionValidator,
    settings: GenerationSettings,
}

impl GenerationOrchestrator {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: GenerationSettings) -> Self {
        Self {
            backend,
            validator: QuestionValidator::new(&settings),
            settings,
        }
    }

    fn quota(&self, qtype: QuestionType) -> usize {
        match qtype {
            QuestionType::Mcq => self.settings.target_mcq,
            QuestionType::Msq => self.settings.target_msq,
            QuestionType::Nat => self.settings.target_nat,
        }
    }

    /// Runs the MCQ, MSQ and NAT phases under one shared time budget. Succeeds
    /// only with the full quota; an MCQ shortfall aborts before the other phases.
    pub async fn generate_quiz(
        &self,
        request: &QuizRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<QuizQuestion>, GenerationError> {
        let started = Instant::now();
        let mut seen = SeenQuestions::default();
        let mut quiz: Vec<ValidatedQuestion> = Vec::with_capacity(self.settings.total);

        for qtype in QuestionType::ORDER {
            let required = self.quota(qtype);
            let block = self.run_phase(request, qtype, started, &mut seen, cancel).await?;

            if block.len() < required {
                if qtype == QuestionType::Mcq {
                    tracing::warn!("MCQ quota failed: {}/{}", block.len(), required);
                    return Err(GenerationError::QuotaShortfall {
                        phase: qtype,
                        collected: block.len(),
                        required,
                    });
                }
                tracing::warn!("{} phase short: {}/{}", qtype, block.len(), required);
            }
            quiz.extend(block);
        }

        if quiz.len() != self.settings.total {
            tracing::warn!("Final quota mismatch: {}/{}", quiz.len(), self.settings.total);
            return Err(GenerationError::TotalMismatch {
                collected: quiz.len(),
                required: self.settings.total,
            });
        }

        let questions = quiz
            .into_iter()
            .enumerate()
            .map(|(i, q)| QuizQuestion {
                id: format!("q{}", i + 1),
                question_type: q.question_type,
                question: q.question,
                options: q.options,
                answer: Some(q.answer),
                topic: request.topic.clone(),
                difficulty: request.difficulty,
            })
            .collect();

        tracing::info!(
            "Quiz generated in {:.2} seconds",
            started.elapsed().as_secs_f64()
        );
        Ok(questions)
    }

    async fn run_phase(
        &self,
        request: &QuizRequest,
        qtype: QuestionType,
        started: Instant,
        seen: &mut SeenQuestions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ValidatedQuestion>, GenerationError> {
        let required = self.quota(qtype);
        let mut collected: Vec<ValidatedQuestion> = Vec::with_capacity(required);

        for attempt in 1..=self.settings.attempts_per_phase {
            if cancel.is_cancelled() {
                tracing::info!("{} generation cancelled before attempt {}", qtype, attempt);
                return Err(GenerationError::Cancelled);
            }
            if started.elapsed() > self.settings.time_budget {
                tracing::warn!("Time budget exhausted generating {}", qtype);
                break;
            }

            tracing::info!("{} generation attempt {}", qtype, attempt);
            let prompt = build_prompt(request, qtype, required - collected.len());
            let raw = match self.backend.complete(&prompt).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("{} attempt {} backend error: {}", qtype, attempt, e);
                    continue;
                }
            };

            let records = OutputParser::extract(&raw);
            let found = records.len();
            for record in &records {
                if collected.len() >= required {
                    break;
                }
                match self.validator.validate(record, qtype) {
                    Ok(question) => {
                        if seen.insert(&question.question) {
                            collected.push(question);
                        }
                    }
                    Err(reason) => tracing::debug!("{} record rejected: {:?}", qtype, reason),
                }
            }
            tracing::debug!(
                "{} attempt {}: {} records parsed, {}/{} collected",
                qtype,
                attempt,
                found,
                collected.len(),
                required
            );

            if collected.len() >= required {
                break;
            }
        }

        Ok(collected)
    }
}
