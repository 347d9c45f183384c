use axum::{extract::State, Json};
use uuid::Uuid;

use super::ApiResult;
use crate::api::error::AppError;
use crate::api::extract::{ApiJson, ApiPath};
use crate::db::Database;
use crate::flows::*;

pub async fn generate_quiz(
    State(flows): State<Flows>,
    ApiJson(input): ApiJson<QuizInput>,
) -> ApiResult<Json<Quiz>> {
    Ok(Json(flows.generate_quiz(&input).await?))
}

pub async fn tutor(
    State(flows): State<Flows>,
    ApiJson(input): ApiJson<TutorInput>,
) -> ApiResult<Json<TutorResponse>> {
    Ok(Json(flows.tutor(&input).await?))
}

/// Quiz grounded in a stored chapter.
pub async fn chapter_quiz(
    State(db): State<Database>,
    State(flows): State<Flows>,
    ApiPath(chapter_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ChapterQuizRequest>,
) -> ApiResult<Json<Quiz>> {
    let input = QuizInput {
        lesson: chapter_lesson(&db, chapter_id)?,
        question_count: request.question_count,
    };
    Ok(Json(flows.generate_quiz(&input).await?))
}

/// Tutor answer grounded in a stored chapter.
pub async fn chapter_tutor(
    State(db): State<Database>,
    State(flows): State<Flows>,
    ApiPath(chapter_id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<ChapterTutorRequest>,
) -> ApiResult<Json<TutorResponse>> {
    let input = TutorInput {
        lesson: chapter_lesson(&db, chapter_id)?,
        question: request.question,
    };
    Ok(Json(flows.tutor(&input).await?))
}

/// Lesson context built from a chapter's title, summary, topics and outcomes.
fn chapter_lesson(db: &Database, chapter_id: Uuid) -> ApiResult<LessonContext> {
    let detail = db
        .get_chapter_detail(chapter_id)?
        .ok_or_else(|| AppError::not_found("Chapter"))?;
    Ok(LessonContext::from(&detail))
}
