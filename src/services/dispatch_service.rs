//! Single-slot dispatch of generation and analysis work.
//!
//! All backend access goes through one semaphore permit. Two independent
//! timeouts apply: how long a caller may queue for the permit, and how long it
//! waits for a result once the permit is held. A caller that stops waiting does
//! not stop the work; the spawned task keeps the permit until it finishes, so
//! backend calls stay serialized even when callers give up.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, DispatchSettings, GenerationSettings};
use crate::dto::quiz_dto::HealthSnapshot;
use crate::error::{Error, Result};
use crate::models::question::QuizQuestion;
use crate::models::quiz::{QuizRequest, QuizResult};
use crate::services::fallback_service::FallbackBank;
use crate::services::generation_service::{GenerationError, GenerationOrchestrator};
use crate::services::llm_service::Backends;

#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    slot: Arc<Semaphore>,
    binding: RwLock<Binding>,
    cancel: Mutex<CancellationToken>,
    demo_mode: bool,
    dispatch: DispatchSettings,
    generation: GenerationSettings,
    fallback: FallbackBank,
}

struct Binding {
    backends: Backends,
    loaded_at: DateTime<Utc>,
}

impl Dispatcher {
    pub fn new(config: &Config, backends: Backends) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Arc::new(Semaphore::new(1)),
                binding: RwLock::new(Binding {
                    backends,
                    loaded_at: Utc::now(),
                }),
                cancel: Mutex::new(CancellationToken::new()),
                demo_mode: config.demo_mode,
                dispatch: config.dispatch.clone(),
                generation: config.generation.clone(),
                fallback: FallbackBank::new(config.fallback.clone()),
            }),
        }
    }

    /// Swaps in new capabilities and clears the cancellation flag. Requests
    /// already past their snapshot keep the capabilities they started with.
    pub fn rebind(&self, backends: Backends) {
        let loaded_at = Utc::now();
        {
            let mut binding = self
                .inner
                .binding
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            binding.backends = backends;
            binding.loaded_at = loaded_at;
        }
        *self
            .inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
        tracing::info!("Backends rebound @ {}", loaded_at.to_rfc3339());
    }

    /// Fails every pending and future slot acquisition until the next `rebind`.
    /// Running generations stop at their next attempt boundary; a backend call
    /// already in flight is not interrupted.
    pub fn cancel(&self) {
        self.cancel_token().cancel();
        tracing::warn!("Cancellation requested, slot acquisitions will fail until reload");
    }

    pub fn health(&self) -> HealthSnapshot {
        let binding = self
            .inner
            .binding
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        HealthSnapshot {
            status: "ok".to_string(),
            demo_mode: self.inner.demo_mode,
            quiz_ready: binding.backends.completion.is_some(),
            analysis_ready: binding.backends.analysis.is_some(),
            locked: self.inner.slot.available_permits() == 0,
            cancelled: self.cancel_token().is_cancelled(),
            last_reload: binding.loaded_at,
        }
    }

    fn backends(&self) -> Backends {
        self.inner
            .binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .backends
            .clone()
    }

    fn cancel_token(&self) -> CancellationToken {
        self.inner
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        let token = self.cancel_token();
        if token.is_cancelled() {
            return Err(Error::Busy("cancelled by administrator".to_string()));
        }

        let wait = self.inner.dispatch.slot_wait_timeout;
        let acquire = tokio::time::timeout(wait, self.inner.slot.clone().acquire_owned());
        let permit = tokio::select! {
            biased;
            _ = token.cancelled() => {
                return Err(Error::Busy("acquisition cancelled by administrator".to_string()));
            }
            res = acquire => match res {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(Error::Internal("worker slot closed".to_string())),
                Err(_) => return Err(Error::Busy(format!("worker slot not free within {:?}", wait))),
            },
        };

        if token.is_cancelled() {
            return Err(Error::Busy("cancelled by administrator".to_string()));
        }
        Ok(permit)
    }

    /// Always yields quiz content unless the slot cannot be acquired.
    pub async fn dispatch(&self, request: QuizRequest) -> Result<QuizResult> {
        let span = tracing::info_span!(
            "dispatch",
            request_id = %Uuid::new_v4(),
            subject = %request.subject,
            topic = %request.topic,
            difficulty = %request.difficulty,
        );
        self.dispatch_inner(request).instrument(span).await
    }

    async fn dispatch_inner(&self, request: QuizRequest) -> Result<QuizResult> {
        let started = Instant::now();

        let completion = match self.backends().completion {
            Some(completion) if !self.inner.demo_mode => completion,
            _ => {
                tracing::info!(
                    "Demo mode or generation backend unavailable, serving fallback bank"
                );
                return Ok(QuizResult::demo(self.lookup(&request).await));
            }
        };

        let permit = self.acquire_slot().await?;
        let run_token = self.cancel_token().child_token();
        let orchestrator = GenerationOrchestrator::new(completion, self.inner.generation.clone());

        let task_request = request.clone();
        let task_token = run_token.clone();
        let handle = tokio::spawn(
            async move {
                let _permit = permit;
                orchestrator.generate_quiz(&task_request, &task_token).await
            }
            .in_current_span(),
        );

        let limit = self.inner.dispatch.generation_timeout;
        let outcome = match tokio::time::timeout(limit, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(GenerationError::Backend(format!("generation task failed: {}", e))),
            Err(_) => {
                if self.inner.dispatch.cancel_abandoned_runs {
                    run_token.cancel();
                }
                Err(GenerationError::Timeout(limit))
            }
        };

        let total = self.inner.generation.total;
        match outcome {
            Ok(quiz) if quiz.len() == total => {
                let elapsed = started.elapsed().as_secs_f64();
                tracing::info!("Authoritative quiz served in {:.2}s", elapsed);
                Ok(QuizResult::authoritative(quiz, elapsed))
            }
            Ok(quiz) => {
                let reason = GenerationError::TotalMismatch {
                    collected: quiz.len(),
                    required: total,
                };
                Ok(self.fall_back(&request, reason).await)
            }
            Err(reason) => Ok(self.fall_back(&request, reason).await),
        }
    }

    async fn fall_back(&self, request: &QuizRequest, reason: GenerationError) -> QuizResult {
        tracing::warn!("AI timeout/failure, fallback used: {}", reason);
        QuizResult::fallback(self.lookup(request).await)
    }

    async fn lookup(&self, request: &QuizRequest) -> Vec<QuizQuestion> {
        self.inner
            .fallback
            .lookup(&request.subject, &request.topic, request.difficulty)
            .await
    }

    /// Runs the analysis capability under the same slot and generation timeout.
    pub async fn analyze(
        &self,
        user_answers: JsonValue,
        correct_answers: JsonValue,
        questions: JsonValue,
    ) -> Result<JsonValue> {
        let analysis = self
            .backends()
            .analysis
            .ok_or_else(|| Error::Unavailable("Analysis unavailable".to_string()))?;

        let permit = self.acquire_slot().await?;
        let handle = tokio::spawn(
            async move {
                let _permit = permit;
                analysis
                    .analyze(&user_answers, &correct_answers, &questions)
                    .await
            }
            .in_current_span(),
        );

        let limit = self.inner.dispatch.generation_timeout;
        match tokio::time::timeout(limit, handle).await {
            Ok(Ok(Ok(analysis))) => Ok(analysis),
            Ok(Ok(Err(e))) => {
                tracing::error!("Analysis backend error: {}", e);
                Err(Error::Internal("Analysis failed".to_string()))
            }
            Ok(Err(e)) => {
                tracing::error!("Analysis task failed: {}", e);
                Err(Error::Internal("Analysis failed".to_string()))
            }
            Err(_) => {
                tracing::warn!("Analysis timed out after {:?}", limit);
                Err(Error::Internal("Analysis failed".to_string()))
            }
        }
    }
}
