//! Pass-through routes for submissions. Each one makes exactly one vendor call with the session's
//! token and relays the normalized result.

use axum::{
    Extension, Json,
    extract::{Path, RawQuery, State},
};

use crate::endpoints::AppJson;
use crate::error::AppError;
use crate::model::{FeedbackUpdate, Submission, SubmissionList, UpdateOutcome};
use crate::security::AccessToken;
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    RawQuery(filters): RawQuery,
) -> Result<Json<SubmissionList>, AppError> {
    let list = state
        .remote
        .list_submissions(token.as_str(), filters.as_deref())
        .await?;
    Ok(Json(list))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    Path(id): Path<String>,
) -> Result<Json<Submission>, AppError> {
    let submission = state.remote.get_submission(token.as_str(), &id).await?;
    Ok(Json(submission))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(token): Extension<AccessToken>,
    Path(id): Path<String>,
    AppJson(update): AppJson<FeedbackUpdate>,
) -> Result<Json<UpdateOutcome>, AppError> {
    let outcome = state
        .remote
        .update_submission(token.as_str(), &id, &update)
        .await?;
    tracing::info!(%id, status = %update.status, "Submission updated");
    Ok(Json(outcome))
}
