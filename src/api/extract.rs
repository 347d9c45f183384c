//! Extractors that report rejections in the `{ "error" }` envelope.
//!
//! axum's own `Json`, `Path` and `Query` reject with plain-text bodies (and
//! 422 for JSON that does not fit the target type). These wrappers turn
//! every rejection into a 400 [`AppError`], with serde's "missing field"
//! errors reworded to match the required-field message used elsewhere.

use axum::{
    extract::{
        rejection::JsonRejection, FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use super::error::AppError;

pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        Ok(Self(value))
    }
}

pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Parses an optional JSON body; an empty body yields `None`.
pub fn parse_optional_body<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, AppError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| bad_json(&e.to_string()))
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::JsonDataError(e) => bad_json(&e.body_text()),
        other => AppError::BadRequest(other.body_text()),
    }
}

fn bad_json(text: &str) -> AppError {
    match missing_field(text) {
        Some(field) => AppError::BadRequest(format!("Missing required fields: {}", field)),
        None => AppError::BadRequest(text.to_string()),
    }
}

fn missing_field(text: &str) -> Option<&str> {
    const MARKER: &str = "missing field `";
    let start = text.find(MARKER)? + MARKER.len();
    let len = text[start..].find('`')?;
    Some(&text[start..start + len])
}
