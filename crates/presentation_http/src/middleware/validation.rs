//! Request validation
//!
//! `ValidatedJson` deserializes a JSON body and runs its `validator` rules.
//! Both kinds of failure are answered with 400 and a `detail` message.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::error::ErrorResponse;

/// Validation error type
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] JsonRejection),
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Render field errors as `field: message` pairs joined with `; `
///
/// Fields are sorted so the message is stable.
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                format!(
                    "{}: {}",
                    field,
                    error
                        .message
                        .as_ref()
                        .map_or_else(|| error.code.to_string(), ToString::to_string)
                )
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A JSON extractor that also validates the request body
///
/// ```ignore
/// async fn handler(ValidatedJson(req): ValidatedJson<ProcesamientoRequest>) {
///     // req passed its validator rules
/// }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ValidationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;

        value
            .validate()
            .map_err(|e| ValidationError::ValidationFailed(format_validation_errors(&e)))?;

        Ok(Self(value))
    }
}
