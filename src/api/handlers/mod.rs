mod curriculum;
mod flows;
mod schedule;
mod submissions;
mod users;

pub use curriculum::*;
pub use flows::*;
pub use schedule::*;
pub use submissions::*;
pub use users::*;

use axum::{http::StatusCode, response::IntoResponse, Json};

use super::error::{AppError, SuccessBody};

/// Result type shared by every handler.
pub type ApiResult<T> = Result<T, AppError>;

/// A freshly created record.
pub type Created<T> = (StatusCode, Json<T>);

fn created<T>(record: T) -> Created<T> {
    (StatusCode::CREATED, Json(record))
}

/// Maps a delete outcome to the success envelope or a 404.
fn deleted(removed: bool, kind: &str) -> ApiResult<Json<SuccessBody>> {
    if removed {
        tracing::info!("{} deleted", kind);
        Ok(Json(SuccessBody::new(format!("{} deleted", kind))))
    } else {
        Err(AppError::not_found(kind))
    }
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
