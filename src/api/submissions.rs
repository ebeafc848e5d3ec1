use super::{AppError, AppState};
use crate::upload::{FormDefinition, Submission};
use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Body of `POST /api/submissions`.
#[derive(Debug, Deserialize, Serialize)]
pub struct SubmissionRequest {
    pub submission: Submission,
    pub form: FormDefinition,
    /// Login of the submitting user, if any
    #[serde(default)]
    pub user: Option<String>,
}

pub fn create_submission_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/submissions", post(submit))
        .with_state(state)
}

/// POST /api/submissions
///
/// Runs the upload pipeline and returns the submission, rewritten where files
/// were replaced by share links. Upload problems never fail the request.
async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmissionRequest>,
) -> Result<Json<Submission>, AppError> {
    state.authorize(&headers)?;

    debug!(
        submission_id = %request.submission.id,
        form_id = ?request.form.id,
        "Submission received"
    );

    let submission = state
        .dispatcher
        .on_submission(request.submission, &request.form, request.user.as_deref())
        .await;

    Ok(Json(submission))
}
