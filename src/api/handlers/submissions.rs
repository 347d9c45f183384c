use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::{created, deleted, ApiResult, Created};
use crate::api::error::{AppError, SuccessBody};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::db::Database;
use crate::models::*;

const DEFAULT_LEADERBOARD_SIZE: usize = 10;
const MAX_LEADERBOARD_SIZE: usize = 100;

pub async fn list_submissions(
    State(db): State<Database>,
    ApiQuery(filter): ApiQuery<SubmissionFilter>,
) -> ApiResult<Json<Vec<Submission>>> {
    Ok(Json(db.list_submissions(&filter)?))
}

pub async fn get_submission(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Submission>> {
    db.get_submission(id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Submission"))
}

pub async fn create_submission(
    State(db): State<Database>,
    ApiJson(input): ApiJson<CreateSubmissionInput>,
) -> ApiResult<Created<Submission>> {
    input.validate()?;
    let submission = db.create_submission(input)?;
    tracing::info!(
        "Student {} submitted '{}' ({})",
        submission.student_id,
        submission.title,
        submission.id
    );
    Ok(created(submission))
}

/// Records a score and feedback. Grading again overwrites the previous grade.
pub async fn grade_submission(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<GradeSubmissionInput>,
) -> ApiResult<Json<Submission>> {
    input.validate()?;
    let submission = db
        .grade_submission(id, input)?
        .ok_or_else(|| AppError::not_found("Submission"))?;
    tracing::info!(
        "Graded submission {}: {:?}/{:?}",
        submission.id,
        submission.score,
        submission.max_score
    );
    Ok(Json(submission))
}

pub async fn delete_submission(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SuccessBody>> {
    deleted(db.delete_submission(id)?, "Submission")
}

// ============================================================
// Leaderboard
// ============================================================

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub class_level: Option<String>,
    pub limit: Option<usize>,
}

pub async fn leaderboard(
    State(db): State<Database>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_SIZE);
    if limit == 0 || limit > MAX_LEADERBOARD_SIZE {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LEADERBOARD_SIZE
        )));
    }

    Ok(Json(db.leaderboard(query.class_level.as_deref(), limit)?))
}
