use axum::extract::State;
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::cookies::REFRESH_COOKIE;
use crate::auth::extractor::AuthUser;
use crate::auth::jwt::{encode_token, Claims};
use crate::auth::password;
use crate::auth::tokens::{generate_refresh_token, hash_token};
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::models::UserWithRole;
use crate::response::ApiResponse;
use crate::state::{AppState, SharedState};
use crate::validation::{normalize_email, not_blank, ValidJson};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(custom(function = "not_blank"), email)]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

/// A freshly issued access/refresh token pair.
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

impl Session {
    pub fn cookies(&self, state: &AppState) -> CookieJar {
        CookieJar::new()
            .add(
                state
                    .cookies
                    .access_cookie(&self.access_token, state.config.access_token.expiry_secs),
            )
            .add(
                state
                    .cookies
                    .refresh_cookie(&self.refresh_token, state.config.refresh_token_expiry_secs),
            )
    }
}

/// Sign an access token and persist a new refresh token for the user.
pub async fn start_session(
    state: &AppState,
    user_id: Uuid,
    name: &str,
    role: &str,
) -> Result<Session, AppError> {
    let claims = Claims::new(
        user_id,
        name.to_string(),
        role.to_string(),
        state.config.access_token.expiry_secs,
    );
    let access_token =
        encode_token(&claims, &state.config.access_token.secret).map_err(AppError::Internal)?;

    let refresh_token = generate_refresh_token();
    db::refresh_tokens::create(
        &state.pool,
        user_id,
        &hash_token(&refresh_token),
        Utc::now() + Duration::seconds(state.config.refresh_token_expiry_secs),
    )
    .await?;

    Ok(Session {
        access_token,
        refresh_token,
    })
}

fn user_json(user: &UserWithRole) -> Value {
    json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "roleDetails": { "roleId": user.role_id, "role": user.role },
    })
}

pub async fn login(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<(CookieJar, ApiResponse), AppError> {
    let email = normalize_email(&req.email);

    if state.login_limiter.check(&email).is_err() {
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let Some(user) = db::users::find_with_role_by_email(&state.pool, &email).await? else {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    };

    let valid = password::verify_blocking(req.password, user.password_hash.clone())
        .await
        .map_err(AppError::Internal)?;

    if !valid {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    if !user.is_active {
        return Err(AppError::Forbidden("User is not active".to_string()));
    }

    state.login_limiter.reset(&email);
    db::users::touch_last_login(&state.pool, user.id).await?;

    let session = start_session(&state, user.id, &user.name, &user.role).await?;

    audit::log_event(&state.pool, Some(user.id), "user.login", "user", Some(user.id), None).await;

    let response = ApiResponse::ok("Login successful").with_docs(json!({
        "user": user_json(&user),
        "accessToken": session.access_token,
        "refreshToken": session.refresh_token,
    }));
    Ok((session.cookies(&state), response))
}

pub async fn refresh(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse), AppError> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let stored = db::refresh_tokens::find_by_hash(&state.pool, &hash_token(&presented))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    if stored.used {
        tracing::warn!(
            "Refresh token reuse detected for user {}. Revoking all sessions.",
            stored.user_id
        );
        db::refresh_tokens::delete_all_for_user(&state.pool, stored.user_id).await?;
        return Err(AppError::Unauthorized(
            "Refresh token reuse detected. All sessions revoked.".to_string(),
        ));
    }

    if stored.expires_at < Utc::now() {
        return Err(AppError::Unauthorized("Refresh token expired".to_string()));
    }

    if !db::refresh_tokens::mark_used(&state.pool, stored.id).await? {
        return Err(AppError::Unauthorized("Refresh token already used".to_string()));
    }

    let user = db::users::find_with_role(&state.pool, stored.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    if !user.is_active {
        return Err(AppError::Unauthorized("User is not active".to_string()));
    }

    let session = start_session(&state, user.id, &user.name, &user.role).await?;

    let response = ApiResponse::ok("Token refreshed").with_docs(json!({
        "user": user_json(&user),
        "accessToken": session.access_token,
    }));
    Ok((session.cookies(&state), response))
}

pub async fn logout(
    auth: AuthUser,
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse), AppError> {
    if let Some(cookie) = jar.get(REFRESH_COOKIE) {
        db::refresh_tokens::delete_by_hash(&state.pool, &hash_token(cookie.value())).await?;
    }

    audit::log_event(&state.pool, Some(auth.user_id), "user.logout", "user", Some(auth.user_id), None)
        .await;

    Ok((state.cookies.clear_session(), ApiResponse::ok("Logout successful")))
}

pub async fn self_identification(auth: AuthUser) -> ApiResponse {
    ApiResponse::ok("User identified").with_docs(json!({
        "user": {
            "name": auth.name,
            "email": auth.email,
            "roleDetails": { "roleId": auth.role_id, "role": auth.role },
        }
    }))
}
