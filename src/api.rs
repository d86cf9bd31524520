use crate::auth::AuthConfig;
use crate::extraction::Extractor;
use crate::similarity::cosine_similarity;
use crate::store::{SubmissionError, SubmissionStore, SubmitOutcome, SubmitRequest};
use crate::structures::{Submission, SubmissionSummary, SubmissionView};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct SubmitAssignmentRequest {
    #[serde(default)]
    assignment_id: String,
    #[serde(default)]
    student_id: String,
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    file_type: Option<String>,
    #[serde(default)]
    deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    grade: f64,
    #[serde(default)]
    feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarityRequest {
    #[serde(default)]
    text_a: String,
    #[serde(default)]
    text_b: String,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SubmissionStore>,
    pub extractor: Extractor,
    pub read_only: bool,
}

type ApiResponse = (StatusCode, Json<serde_json::Value>);

pub fn routes(state: AppState, auth_config: AuthConfig) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/submissions", post(submit_assignment))
        .route("/submissions/:id", get(get_submission))
        .route("/submissions/:id/grade", post(grade_submission))
        .route("/assignments/:assignment_id/submissions", get(list_submissions))
        .route(
            "/assignments/:assignment_id/submissions/:student_id",
            get(get_student_submission),
        )
        .route("/similarity", post(similarity))
        .route("/stats", get(get_stats))
        .with_state(state);

    if auth_config.is_enabled() {
        router = router.layer(middleware::from_fn_with_state(auth_config, crate::auth::auth_middleware));
    }

    router
}

fn error_json(status: StatusCode, msg: impl Into<String>) -> ApiResponse {
    (status, Json(serde_json::json!({ "error": msg.into() })))
}

fn submission_json(status: StatusCode, s: &Submission) -> ApiResponse {
    (status, Json(serde_json::json!(SubmissionView::from(s))))
}

fn read_only_response() -> ApiResponse {
    error_json(StatusCode::FORBIDDEN, "Read-only mode: modifications are not allowed")
}

impl From<SubmissionError> for (StatusCode, Json<serde_json::Value>) {
    fn from(err: SubmissionError) -> Self {
        let status = match err {
            SubmissionError::NotFound => StatusCode::NOT_FOUND,
            SubmissionError::InvalidInput(_)
            | SubmissionError::AlreadyGraded
            | SubmissionError::Blocked(_) => StatusCode::BAD_REQUEST,
        };
        error_json(status, err.to_string())
    }
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Plagiarism Engine",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Submission similarity scoring and grading gate"
    }))
}

async fn submit_assignment(
    State(state): State<AppState>,
    Json(req): Json<SubmitAssignmentRequest>,
) -> ApiResponse {
    if state.read_only {
        return read_only_response();
    }

    let file = req.file_url.clone().unwrap_or_default();
    if req.assignment_id.trim().is_empty() || file.trim().is_empty() {
        return error_json(
            StatusCode::BAD_REQUEST,
            "Assignment ID and submission content required",
        );
    }

    let extracted_text = state
        .extractor
        .extract(req.file_url.as_deref(), req.file_type.as_deref())
        .await;
    info!(
        "Extracted {} chars from {} for assignment {}",
        extracted_text.len(),
        file,
        req.assignment_id
    );

    let outcome = state.store.submit(SubmitRequest {
        assignment_id: req.assignment_id,
        student_id: req.student_id,
        file,
        file_type: req.file_type,
        extracted_text,
        deadline: req.deadline,
    });

    match outcome {
        Ok(SubmitOutcome::Created(s)) => {
            info!("New submission {} by {}", s.id, s.student_id);
            submission_json(StatusCode::CREATED, &s)
        }
        Ok(SubmitOutcome::Resubmitted(s)) => {
            info!("Resubmission {} by {}", s.id, s.student_id);
            submission_json(StatusCode::OK, &s)
        }
        Err(e) => {
            warn!("Submission rejected: {}", e);
            e.into()
        }
    }
}

async fn grade_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
    Json(req): Json<GradeRequest>,
) -> ApiResponse {
    if state.read_only {
        return read_only_response();
    }

    match state.store.grade(&submission_id, req.grade, req.feedback) {
        Ok(s) => submission_json(StatusCode::OK, &s),
        Err(e) => {
            warn!("Grading {} rejected: {}", submission_id, e);
            e.into()
        }
    }
}

async fn get_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<String>,
) -> ApiResponse {
    match state.store.get(&submission_id) {
        Some(s) => submission_json(StatusCode::OK, &s),
        None => SubmissionError::NotFound.into(),
    }
}

async fn list_submissions(
    State(state): State<AppState>,
    Path(assignment_id): Path<String>,
) -> ApiResponse {
    let summaries: Vec<SubmissionSummary> = state
        .store
        .list_for_assignment(&assignment_id)
        .iter()
        .map(SubmissionSummary::from)
        .collect();

    (StatusCode::OK, Json(serde_json::json!(summaries)))
}

async fn get_student_submission(
    State(state): State<AppState>,
    Path((assignment_id, student_id)): Path<(String, String)>,
) -> ApiResponse {
    // Absent submission is not an error for the student view
    let submission = state
        .store
        .find_for_student(&assignment_id, &student_id)
        .map(|s| SubmissionView::from(&s));
    (StatusCode::OK, Json(serde_json::json!(submission)))
}

async fn similarity(Json(req): Json<SimilarityRequest>) -> ApiResponse {
    let score = cosine_similarity(&req.text_a, &req.text_b);
    (StatusCode::OK, Json(serde_json::json!({ "score": score })))
}

async fn get_stats(State(state): State<AppState>) -> ApiResponse {
    (StatusCode::OK, Json(serde_json::json!(state.store.get_stats())))
}
