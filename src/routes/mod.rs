pub mod application;
pub mod auth;
pub mod email;
pub mod password;
pub mod role;
pub mod storage;
pub mod user;

use axum::routing::{delete, get, patch, post, put};
use axum::Router;

use crate::error::AppError;
use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/", get(application::welcome))
        // Auth
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/auth/logout", put(auth::logout))
        .route(
            "/api/v1/auth/refresh-token",
            get(auth::refresh).post(auth::refresh),
        )
        .route(
            "/api/v1/auth/self-identification",
            get(auth::self_identification),
        )
        // Password
        .route("/api/v1/password/forgot", post(password::forgot_password))
        .route("/api/v1/password/verify-otp", patch(password::verify_otp))
        .route("/api/v1/password/reset", post(password::reset_password))
        .route(
            "/api/v1/password/change/{userId}",
            post(password::change_password),
        )
        // Roles
        .route(
            "/api/v1/role",
            get(role::list).post(role::create).delete(role::delete),
        )
        // Users
        .route("/api/v1/user/register/user", post(user::register_user))
        .route("/api/v1/user/register/admin", post(user::register_admin))
        .route("/api/v1/user", get(user::list).delete(user::delete))
        .route("/api/v1/user/email", patch(user::update_email))
        .route("/api/v1/user/role", delete(user::delete_by_role))
        .route("/api/v1/user/role/transfer", patch(user::transfer_role))
        .route("/api/v1/user/{userId}", get(user::get))
        .route(
            "/api/v1/user/{userId}/toggle-activity",
            patch(user::toggle_activity),
        )
        // Email
        .route("/api/v1/email/send-single", post(email::send_single))
        .route("/api/v1/email/send-multiple", post(email::send_multiple))
        .route(
            "/api/v1/email/send-bulk-groups",
            post(email::send_bulk_groups),
        )
        // Object storage
        .route("/api/v1/aws/S3/upload-url", get(storage::upload_url))
        .route("/api/v1/aws/S3/signed-url", get(storage::signed_url))
        .route("/api/v1/aws/S3/delete-file", delete(storage::delete_file))
}

pub async fn not_found() -> AppError {
    AppError::not_found("Route")
}
