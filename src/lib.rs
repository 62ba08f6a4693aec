pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod maintenance;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod state;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use reqwest::Url;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::middleware::envelope::stamp_request;
use crate::state::{AppState, SharedState};
use crate::storage::s3::S3Store;
use crate::storage::ObjectStore;

/// Build the shared state with the providers named in the configuration.
pub async fn build_state(pool: PgPool, config: Config) -> Result<SharedState, String> {
    let mailer = email::from_config(&config.mail)?;

    let storage = match &config.s3 {
        Some(s3) => {
            tracing::info!("S3 storage configured for bucket {}", s3.bucket);
            Some(Arc::new(S3Store::new(s3).await) as Arc<dyn ObjectStore>)
        }
        None => {
            tracing::warn!("S3 not configured. Storage routes will return 503.");
            None
        }
    };

    Ok(Arc::new(AppState::new(pool, config, mailer, storage)))
}

/// Browsers send `scheme://host[:port]` as `Origin`, never a path.
fn allowed_origin(client_url: &str) -> Option<HeaderValue> {
    let origin = Url::parse(client_url.trim()).ok()?.origin();
    if !origin.is_tuple() {
        return None;
    }
    HeaderValue::from_str(&origin.ascii_serialization()).ok()
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = config.client_url.as_deref().and_then(allowed_origin);

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
            Method::HEAD,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    match origin {
        Some(origin) => layer
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true),
        None => layer,
    }
}

pub fn build_app(state: SharedState) -> Router {
    let max_body_size = state.config.max_body_size;
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(routes::api_routes())
        .route("/health", axum::routing::get(health))
        .fallback(routes::not_found)
        .method_not_allowed_fallback(routes::not_found)
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(axum::middleware::from_fn(stamp_request))
        .layer(cors)
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                )),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_url_is_reduced_to_its_origin() {
        assert_eq!(
            allowed_origin("https://app.example.com/portal/").unwrap(),
            "https://app.example.com"
        );
        assert_eq!(
            allowed_origin("http://localhost:3000").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            allowed_origin("https://app.example.com:443/").unwrap(),
            "https://app.example.com"
        );
        assert!(allowed_origin("not a url").is_none());
        assert!(allowed_origin("data:text/plain,hi").is_none());
    }
}
