use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use crate::response::{Envelope, RequestInfo};

/// Fill in the `request` block of enveloped responses and log the outcome.
///
/// Error responses that carry no envelope, such as the body-limit 413, get
/// a failure envelope built from their status.
pub async fn stamp_request(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    let status = response.status();
    let mut envelope = match response.extensions().get::<Envelope>().cloned() {
        Some(envelope) => envelope,
        None if status.is_client_error() || status.is_server_error() => {
            let reason = status.canonical_reason().unwrap_or("Error");
            Envelope::failure(status, serde_json::Value::String(reason.to_string()))
        }
        None => return response,
    };

    envelope.request = RequestInfo { method, url };

    let status = envelope.status_code;
    let message = match &envelope.message {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let (method, url) = (&envelope.request.method, &envelope.request.url);
    match status {
        500.. => tracing::error!(%method, %url, status, "{message}"),
        400..=499 => tracing::warn!(%method, %url, status, "{message}"),
        _ => tracing::info!(%method, %url, status, "{message}"),
    }

    let body = match serde_json::to_vec(&envelope) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!("Failed to serialize response envelope: {e}");
            return response;
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    parts.extensions.insert(envelope);
    Response::from_parts(parts, Body::from(body))
}
