use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use uuid::Uuid;

use crate::auth::cookies::ACCESS_COOKIE;
use crate::auth::jwt;
use crate::db;
use crate::error::AppError;
use crate::state::SharedState;

pub const ADMIN_ROLE: &str = "admin";
pub const USER_ROLE: &str = "user";

/// The caller behind a valid access token, re-read from the database so
/// deactivated or deleted users lose access before their token expires.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role_id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
    }

    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.user_id == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You can only manage your own account".to_string(),
            ))
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        // Bearer header first, then the session cookie
        let token = match bearer_token(parts) {
            Some(token) => token,
            None => CookieJar::from_headers(&parts.headers)
                .get(ACCESS_COOKIE)
                .map(|c| c.value().to_string())
                .ok_or_else(|| {
                    AppError::Unauthorized("Missing authentication token".to_string())
                })?,
        };

        let claims = jwt::decode_token(&token, &state.config.access_token.secret)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

        let user = db::users::find_with_role(&state.pool, claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

        if !user.is_active {
            return Err(AppError::Unauthorized("User is not active".to_string()));
        }

        Ok(AuthUser {
            user_id: user.id,
            name: user.name,
            email: user.email,
            role_id: user.role_id,
            role: user.role,
        })
    }
}
