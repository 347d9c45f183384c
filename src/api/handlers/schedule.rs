use axum::{extract::State, Json};
use uuid::Uuid;

use super::{created, deleted, ApiResult, Created};
use crate::api::error::{AppError, SuccessBody};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::db::Database;
use crate::models::*;

/// Events overlapping the optional `[from, to)` window, earliest first.
pub async fn list_events(
    State(db): State<Database>,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> ApiResult<Json<Vec<ScheduleEvent>>> {
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if to <= from {
            return Err(AppError::BadRequest("to must be after from".to_string()));
        }
    }
    Ok(Json(db.list_events(&filter)?))
}

pub async fn get_event(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ScheduleEvent>> {
    db.get_event(id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Event"))
}

pub async fn create_event(
    State(db): State<Database>,
    ApiJson(input): ApiJson<CreateEventInput>,
) -> ApiResult<Created<ScheduleEvent>> {
    input.validate()?;
    let event = db.create_event(input)?;
    tracing::info!("Scheduled '{}' at {}", event.title, event.starts_at);
    Ok(created(event))
}

pub async fn update_event(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateEventInput>,
) -> ApiResult<Json<ScheduleEvent>> {
    input.validate()?;
    db.update_event(id, input)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Event"))
}

pub async fn delete_event(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SuccessBody>> {
    deleted(db.delete_event(id)?, "Event")
}
