//! # Request Extraction
//!
//! JSON and query rejections become [`AppError::BadRequest`] so every error
//! response uses the same body shape.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;

use crate::error::AppError;

/// Business-rule checks beyond what serde enforces.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to `BadRequest`.
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and run its [`Validate`] rules.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Extract a JSON body that may be omitted entirely. A request with no JSON
/// content type yields the default.
pub fn extract_optional_json<T: Default>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    match result {
        Ok(Json(v)) => Ok(v),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(err) => Err(AppError::BadRequest(err.body_text())),
    }
}

/// Extract query parameters, mapping failures to `BadRequest`.
pub fn extract_query<T>(result: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    result
        .map(|Query(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}
