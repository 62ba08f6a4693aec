//! Uniform JSON envelope wrapped around every API response.
//!
//! Handlers return [`ApiResponse`] on success and [`crate::error::AppError`]
//! on failure. Both render an [`Envelope`] and stash a copy of it in the
//! response extensions so `middleware::envelope::stamp_request` can fill in
//! the request line and log the outcome.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    pub status_code: u16,
    pub request: RequestInfo,
    pub message: Value,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Value>,
}

impl Envelope {
    /// Error envelope with an empty `docs` payload and a null `trace`.
    pub fn failure(status: StatusCode, message: Value) -> Self {
        Self {
            success: false,
            status_code: status.as_u16(),
            request: RequestInfo::default(),
            message,
            data: docs(Value::Null),
            trace: Some(Value::Null),
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(&self)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Wrap a value as `{ "docs": value }`.
pub fn docs<T: Serialize>(value: T) -> Value {
    json!({ "docs": serde_json::to_value(value).unwrap_or(Value::Null) })
}

#[derive(Debug)]
pub struct ApiResponse {
    success: bool,
    status: StatusCode,
    message: String,
    data: Value,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            status: StatusCode::OK,
            message: message.into(),
            data: docs(Value::Null),
        }
    }

    pub fn created(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message)
        }
    }

    pub fn with_docs<T: Serialize>(mut self, value: T) -> Self {
        self.data = docs(value);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Report partial failure while keeping the status code.
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        Envelope {
            success: self.success,
            status_code: self.status.as_u16(),
            request: RequestInfo::default(),
            message: Value::String(self.message),
            data: self.data,
            trace: None,
        }
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_response_carries_envelope_extension() {
        let response = ApiResponse::created("Role created")
            .with_docs(json!({ "id": 1 }))
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let envelope = response.extensions().get::<Envelope>().unwrap();
        assert!(envelope.success);
        assert_eq!(envelope.status_code, 201);
        assert_eq!(envelope.data["docs"]["id"], 1);
        assert!(envelope.trace.is_none());
    }

    #[test]
    fn success_envelope_omits_trace() {
        let envelope = Envelope {
            success: true,
            status_code: 200,
            request: RequestInfo::default(),
            message: Value::String("ok".into()),
            data: docs(Value::Null),
            trace: None,
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value.get("trace").is_none());
        assert_eq!(value["statusCode"], 200);
        assert!(value["data"]["docs"].is_null());
    }

    #[test]
    fn failure_envelope_carries_null_trace() {
        let value = serde_json::to_value(Envelope::failure(
            StatusCode::METHOD_NOT_ALLOWED,
            Value::String("Method Not Allowed".into()),
        ))
        .unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["statusCode"], 405);
        assert!(value["trace"].is_null());
        assert!(value.get("trace").is_some());
    }
}
