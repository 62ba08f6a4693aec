use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use crate::response::Envelope;
use crate::validation::FieldError;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    BadRequest(String),
    Validation(Vec<FieldError>),
    Conflict(String),
    PayloadTooLarge,
    RateLimited(String),
    Unavailable(String),
    Internal(String),
    Database(sqlx::Error),
}

impl AppError {
    /// `Not Found: <entity>`
    pub fn not_found(entity: &str) -> Self {
        AppError::NotFound(format!("Not Found: {entity}"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "{msg}"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {msg}"),
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Validation(errors) => write!(f, "Validation failed: {} field(s)", errors.len()),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::PayloadTooLarge => write!(f, "Payload Too Large"),
            AppError::RateLimited(msg) => write!(f, "Rate Limited: {msg}"),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {msg}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            AppError::Database(err) => write!(f, "Database Error: {err}"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::RateLimited(msg)
            | AppError::Unavailable(msg) => Value::String(msg),
            AppError::Validation(errors) => json!(errors),
            AppError::PayloadTooLarge => Value::String("Payload Too Large".to_string()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                Value::String("Internal Server Error".to_string())
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {err}");
                Value::String("Internal Server Error".to_string())
            }
        };

        Envelope::failure(status, message).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

/// Map a unique-violation to `Conflict`, everything else to `Database`.
pub fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_renders_field_list() {
        let response = AppError::Validation(vec![FieldError::new("email", "Email is required")])
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let envelope = response.extensions().get::<Envelope>().unwrap();
        assert!(!envelope.success);
        assert_eq!(envelope.message[0]["key"], "email");
        assert_eq!(envelope.trace, Some(Value::Null));
    }

    #[test]
    fn internal_error_hides_cause() {
        let response = AppError::Internal("smtp password rejected".into()).into_response();
        let envelope = response.extensions().get::<Envelope>().unwrap();
        assert_eq!(envelope.status_code, 500);
        assert_eq!(envelope.message, "Internal Server Error");
    }

    #[test]
    fn payload_too_large_renders_failure_envelope() {
        let response = AppError::PayloadTooLarge.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let envelope = response.extensions().get::<Envelope>().unwrap();
        assert_eq!(envelope.status_code, 413);
        assert_eq!(envelope.message, "Payload Too Large");
    }

    #[test]
    fn not_found_uses_entity_prefix() {
        let err = AppError::not_found("User");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        match err {
            AppError::NotFound(msg) => assert_eq!(msg, "Not Found: User"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
