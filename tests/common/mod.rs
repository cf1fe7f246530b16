#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use quiz_backend::config::Config;
use quiz_backend::services::llm_service::{AnalysisBackend, BackendError, CompletionBackend};

/// Config pointing the fallback bank at `root`, with generation enabled.
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.server_address = "127.0.0.1:0".to_string();
    config.demo_mode = false;
    config.fallback.root = root.to_path_buf();
    config
}

pub fn write_bank_file(root: &Path, partition: &str, name: &str, body: &JsonValue) {
    let dir = root.join(partition);
    std::fs::create_dir_all(&dir).expect("create partition");
    std::fs::write(dir.join(name), body.to_string()).expect("write bank file");
}

pub fn deadlock_bank() -> JsonValue {
    json!({
        "questions": [
            {"type": "MCQ", "question": "Banker's algorithm state with 3 processes and 12 tape drives", "options": ["Safe", "Unsafe", "Deadlocked", "Starved"], "answer": "A"},
            {"type": "MSQ", "question": "Conditions that must hold simultaneously for deadlock", "options": ["Mutual exclusion", "Hold and wait", "Preemption", "Circular wait"], "answer": ["A", "B", "D"]},
            {"type": "NAT", "question": "Minimum instances of a resource to avoid deadlock for 4 processes needing 3 each", "answer": "9"}
        ]
    })
}

fn phase_of(prompt: &str) -> &'static str {
    ["MCQ", "MSQ", "NAT"]
        .into_iter()
        .find(|t| prompt.contains(&format!("level {} questions", t)))
        .unwrap_or("MCQ")
}

fn requested_count(prompt: &str) -> usize {
    prompt
        .split("Generate EXACTLY ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Emits exactly what each prompt asks for, as concatenated JSON objects.
pub fn well_formed_batch(prompt: &str, offset: usize) -> String {
    let qtype = phase_of(prompt);
    (0..requested_count(prompt))
        .map(|i| {
            let n = offset + i;
            let question = format!(
                "Compute the page faults for reference string number {} in the {} round",
                n, qtype
            );
            let record = match qtype {
                "MSQ" => json!({"question": question, "options": ["1", "2", "3", "4"], "answer": ["C", "A"]}),
                "NAT" => json!({"question": question, "options": [], "answer": "42.5"}),
                _ => json!({"question": question, "options": ["1", "2", "3", "4"], "answer": "B"}),
            };
            record.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Completion backend answering every prompt in full after an optional delay,
/// while recording how many calls overlapped.
pub struct ScriptedCompletion {
    pub delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(well_formed_batch(prompt, call * 100))
    }
}

pub struct FailingCompletion {
    pub calls: AtomicUsize,
}

#[async_trait]
impl CompletionBackend for FailingCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Unavailable("model crashed".to_string()))
    }
}

pub struct EchoAnalysis;

#[async_trait]
impl AnalysisBackend for EchoAnalysis {
    async fn analyze(
        &self,
        user_answers: &JsonValue,
        correct_answers: &JsonValue,
        _questions: &JsonValue,
    ) -> Result<JsonValue, BackendError> {
        Ok(json!({
            "score": if user_answers == correct_answers { 100 } else { 0 },
            "summary": "Review scheduling fundamentals"
        }))
    }
}

pub struct BrokenAnalysis;

#[async_trait]
impl AnalysisBackend for BrokenAnalysis {
    async fn analyze(
        &self,
        _user_answers: &JsonValue,
        _correct_answers: &JsonValue,
        _questions: &JsonValue,
    ) -> Result<JsonValue, BackendError> {
        Err(BackendError::InvalidResponse("not json".to_string()))
    }
}
