use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::dto::quiz_dto::{AnalyzePayload, AnalyzeResponse, GenerateQuizPayload};
use crate::error::{Error, Result};
use crate::AppState;

#[axum::debug_handler]
pub async fn generate_quiz(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateQuizPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.map_err(|e| {
        tracing::debug!("Rejected quiz payload: {}", e);
        Error::BadRequest("Invalid JSON".to_string())
    })?;
    payload.validate()?;
    let request = payload.into_request()?;

    tracing::info!(
        "Quiz requested: subject='{}' topic='{}' difficulty={}",
        request.subject,
        request.topic,
        request.difficulty
    );
    let result = state.dispatcher.dispatch(request).await?;
    Ok((StatusCode::OK, Json(result)))
}

#[axum::debug_handler]
pub async fn analyze(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AnalyzePayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(payload) = payload.map_err(|_| Error::BadRequest("Invalid JSON".to_string()))?;
    payload.validate()?;
    let (Some(user_answers), Some(correct_answers), Some(questions)) =
        (payload.user_answers, payload.correct_answers, payload.questions)
    else {
        return Err(Error::BadRequest("Missing analysis fields".to_string()));
    };

    let analysis = state
        .dispatcher
        .analyze(user_answers, correct_answers, questions)
        .await?;
    Ok((
        StatusCode::OK,
        Json(AnalyzeResponse {
            status: "success".to_string(),
            analysis,
        }),
    ))
}
