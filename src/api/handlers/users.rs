use axum::{extract::State, Json};
use uuid::Uuid;

use super::{created, deleted, ApiResult, Created};
use crate::api::error::{AppError, SuccessBody};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::db::Database;
use crate::models::*;

pub async fn list_users(
    State(db): State<Database>,
    ApiQuery(filter): ApiQuery<UserFilter>,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(db.list_users(&filter)?))
}

pub async fn get_user(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<User>> {
    db.get_user(id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn create_user(
    State(db): State<Database>,
    ApiJson(input): ApiJson<CreateUserInput>,
) -> ApiResult<Created<User>> {
    input.validate()?;
    let user = db.create_user(input)?;
    tracing::info!("Created {} {} ({})", user.role.as_str(), user.name, user.id);
    Ok(created(user))
}

pub async fn update_user(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateUserInput>,
) -> ApiResult<Json<User>> {
    input.validate()?;
    db.update_user(id, input)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User"))
}

pub async fn delete_user(
    State(db): State<Database>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<SuccessBody>> {
    deleted(db.delete_user(id)?, "User")
}
