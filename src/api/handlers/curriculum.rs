use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use super::{created, deleted, ApiResult, Created};
use crate::api::error::{AppError, SuccessBody};
use crate::api::extract::{parse_optional_body, ApiJson, ApiPath, ApiQuery};
use crate::db::{seed_curriculum, Database};
use crate::models::*;

// ============================================================
// Subjects
// ============================================================

pub async fn list_subjects(
    State(db): State<Database>,
    ApiQuery(filter): ApiQuery<SubjectFilter>,
) -> ApiResult<Json<Vec<Subject>>> {
    Ok(Json(db.list_subjects(&filter)?))
}

pub async fn get_subject(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Subject>> {
    db.get_subject(id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Subject"))
}

pub async fn create_subject(
    State(db): State<Database>,
    ApiJson(input): ApiJson<CreateSubjectInput>,
) -> ApiResult<Created<Subject>> {
    input.validate()?;
    let subject = db.create_subject(input)?;
    tracing::info!("Created subject {} ({})", subject.name, subject.id);
    Ok(created(subject))
}

pub async fn update_subject(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateSubjectInput>,
) -> ApiResult<Json<Subject>> {
    input.validate()?;
    db.update_subject(id, input)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Subject"))
}

pub async fn delete_subject(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SuccessBody>> {
    deleted(db.delete_subject(id)?, "Subject")
}

// ============================================================
// Chapters
// ============================================================

pub async fn list_chapters(
    State(db): State<Database>,
    ApiPath(subject_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Chapter>>> {
    if db.get_subject(subject_id)?.is_none() {
        return Err(AppError::not_found("Subject"));
    }
    Ok(Json(db.list_chapters(subject_id)?))
}

pub async fn create_chapter(
    State(db): State<Database>,
    ApiPath(subject_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CreateChapterInput>,
) -> ApiResult<Created<Chapter>> {
    input.validate()?;
    let chapter = db.create_chapter(subject_id, input)?;
    tracing::info!(
        "Created chapter {} '{}' in subject {}",
        chapter.number,
        chapter.title,
        subject_id
    );
    Ok(created(chapter))
}

/// A chapter with its topics, outcomes and videos.
pub async fn get_chapter(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ChapterDetail>> {
    db.get_chapter_detail(id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Chapter"))
}

pub async fn update_chapter(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateChapterInput>,
) -> ApiResult<Json<Chapter>> {
    input.validate()?;
    db.update_chapter(id, input)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Chapter"))
}

pub async fn delete_chapter(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SuccessBody>> {
    deleted(db.delete_chapter(id)?, "Chapter")
}

fn require_chapter(db: &Database, id: Uuid) -> ApiResult<()> {
    match db.get_chapter(id)? {
        Some(_) => Ok(()),
        None => Err(AppError::not_found("Chapter")),
    }
}

// ============================================================
// Topics
// ============================================================

pub async fn list_topics(
    State(db): State<Database>,
    ApiPath(chapter_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Topic>>> {
    require_chapter(&db, chapter_id)?;
    Ok(Json(db.list_topics(chapter_id)?))
}

pub async fn create_topic(
    State(db): State<Database>,
    ApiPath(chapter_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CreateTopicInput>,
) -> ApiResult<Created<Topic>> {
    input.validate()?;
    Ok(created(db.create_topic(chapter_id, input)?))
}

pub async fn update_topic(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateTopicInput>,
) -> ApiResult<Json<Topic>> {
    input.validate()?;
    db.update_topic(id, input)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Topic"))
}

pub async fn delete_topic(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SuccessBody>> {
    deleted(db.delete_topic(id)?, "Topic")
}

// ============================================================
// Learning Outcomes
// ============================================================

pub async fn list_outcomes(
    State(db): State<Database>,
    ApiPath(chapter_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<LearningOutcome>>> {
    require_chapter(&db, chapter_id)?;
    Ok(Json(db.list_outcomes(chapter_id)?))
}

pub async fn create_outcome(
    State(db): State<Database>,
    ApiPath(chapter_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CreateOutcomeInput>,
) -> ApiResult<Created<LearningOutcome>> {
    input.validate()?;
    Ok(created(db.create_outcome(chapter_id, input)?))
}

pub async fn update_outcome(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateOutcomeInput>,
) -> ApiResult<Json<LearningOutcome>> {
    input.validate()?;
    db.update_outcome(id, input)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Learning outcome"))
}

pub async fn delete_outcome(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SuccessBody>> {
    deleted(db.delete_outcome(id)?, "Learning outcome")
}

// ============================================================
// Videos
// ============================================================

pub async fn list_videos(
    State(db): State<Database>,
    ApiPath(chapter_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Video>>> {
    require_chapter(&db, chapter_id)?;
    Ok(Json(db.list_videos(chapter_id)?))
}

pub async fn create_video(
    State(db): State<Database>,
    ApiPath(chapter_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CreateVideoInput>,
) -> ApiResult<Created<Video>> {
    input.validate()?;
    Ok(created(db.create_video(chapter_id, input)?))
}

pub async fn update_video(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateVideoInput>,
) -> ApiResult<Json<Video>> {
    input.validate()?;
    db.update_video(id, input)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Video"))
}

pub async fn delete_video(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SuccessBody>> {
    deleted(db.delete_video(id)?, "Video")
}

// ============================================================
// Curriculum import
// ============================================================

#[derive(Debug, Serialize)]
pub struct MigrateResponse {
    pub success: bool,
    pub report: ImportReport,
}

/// Imports the posted curriculum document, or the bundled seed when the
/// body is empty.
pub async fn migrate_curriculum(
    State(db): State<Database>,
    body: Bytes,
) -> ApiResult<Json<MigrateResponse>> {
    let document = match parse_optional_body::<CurriculumDocument>(&body)? {
        Some(document) => document,
        None => {
            tracing::info!("No curriculum posted; importing bundled seed");
            seed_curriculum()?
        }
    };
    document.validate()?;

    let report = db.import_curriculum(&document)?;
    tracing::info!(
        "Curriculum import: {} subjects created, {} chapters created, {} chapters skipped",
        report.subjects_created,
        report.chapters_created,
        report.chapters_skipped
    );

    Ok(Json(MigrateResponse {
        success: true,
        report,
    }))
}
