use axum::extract::{Path, State};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::auth::extractor::AuthUser;
use crate::auth::password;
use crate::auth::tokens::{generate_otp, hash_token};
use crate::db;
use crate::email::{deliver, templates};
use crate::error::AppError;
use crate::middleware::audit;
use crate::response::ApiResponse;
use crate::routes::auth::start_session;
use crate::state::{AppState, SharedState};
use crate::validation::{
    mismatch, normalize_email, not_blank, parse_uuid, strong_password, ValidJson, OTP_RE,
};

pub const OTP_LENGTH: u32 = 6;
pub const OTP_VALID_MINUTES: i64 = 15;

const CONFIRM_MISMATCH: &str = "Confirm password does not match new password";
const SAME_AS_OLD: &str = "New password must be different from the old password";

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(custom(function = "not_blank"), email)]
    pub email_address: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct VerifyOtpRequest {
    #[validate(custom(function = "not_blank"), email)]
    pub email: String,
    #[validate(custom(function = "not_blank"), regex(path = *OTP_RE, code = "otp"))]
    pub otp: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
#[validate(schema(function = "reset_confirmation"))]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "not_blank"), email)]
    pub email: String,
    #[validate(custom(function = "strong_password"))]
    pub new_password: String,
    #[validate(custom(function = "not_blank"))]
    pub confirm_password: String,
}

fn reset_confirmation(req: &ResetPasswordRequest) -> Result<(), ValidationError> {
    if req.confirm_password != req.new_password {
        return Err(mismatch("confirmPassword", CONFIRM_MISMATCH));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
#[validate(schema(function = "change_confirmation"))]
pub struct ChangePasswordRequest {
    #[validate(custom(function = "not_blank"))]
    pub old_password: String,
    #[validate(custom(function = "strong_password"))]
    pub new_password: String,
    #[validate(custom(function = "not_blank"))]
    pub confirm_password: String,
}

fn change_confirmation(req: &ChangePasswordRequest) -> Result<(), ValidationError> {
    if req.new_password == req.old_password {
        return Err(mismatch("newPassword", SAME_AS_OLD));
    }
    if req.confirm_password != req.new_password {
        return Err(mismatch("confirmPassword", CONFIRM_MISMATCH));
    }
    Ok(())
}

/// Tell the user their password changed. Delivery problems are only logged.
async fn notify_password_changed(state: &AppState, email: &str) {
    let html = templates::render_password_changed(Utc::now());
    let _ = deliver(
        state.mailer.as_ref(),
        &[email.to_string()],
        templates::PASSWORD_CHANGED_SUBJECT,
        &html,
    )
    .await;
}

/// Supersede the user's open OTPs and mail a new one.
async fn issue_reset_otp(state: &AppState, email: &str) -> Result<(), AppError> {
    let Some(user) = db::users::find_by_email(&state.pool, email).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };

    let otp = generate_otp(OTP_LENGTH);

    let mut tx = state.pool.begin().await?;
    db::password_resets::supersede_open(&mut *tx, user.id).await?;
    db::password_resets::create(
        &mut *tx,
        user.id,
        &hash_token(&otp),
        Utc::now() + Duration::minutes(OTP_VALID_MINUTES),
    )
    .await?;
    tx.commit().await?;

    let html = templates::render_otp(&otp, OTP_VALID_MINUTES);
    deliver(state.mailer.as_ref(), &[user.email.clone()], templates::OTP_SUBJECT, &html)
        .await
        .map_err(AppError::Internal)?;

    audit::log_event(&state.pool, Some(user.id), "password.reset_requested", "user", Some(user.id), None)
        .await;

    Ok(())
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> ApiResponse {
    let email = normalize_email(&req.email_address);

    // Same answer whether or not the address is registered
    if let Err(e) = issue_reset_otp(&state, &email).await {
        tracing::error!("Failed to issue password reset OTP: {e}");
    }

    ApiResponse::ok("If that email is registered, an OTP has been sent.")
}

pub async fn verify_otp(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<VerifyOtpRequest>,
) -> Result<ApiResponse, AppError> {
    let email = normalize_email(&req.email);

    if state.otp_limiter.check(&email).is_err() {
        return Err(AppError::RateLimited(
            "Too many OTP attempts. Please try again later.".to_string(),
        ));
    }

    let user = db::users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let Some(record) =
        db::password_resets::find_latest_by_otp(&state.pool, user.id, &hash_token(req.otp.trim()))
            .await?
    else {
        state.otp_limiter.record_failure(&email);
        return Err(AppError::BadRequest("Invalid OTP".to_string()));
    };

    if record.is_verified {
        return Err(AppError::BadRequest("OTP already verified".to_string()));
    }

    if record.is_expired() {
        return Err(AppError::BadRequest("OTP expired".to_string()));
    }

    let mut tx = state.pool.begin().await?;
    db::password_resets::mark_verified(&mut *tx, record.id).await?;
    db::users::mark_verified(&mut *tx, user.id).await?;
    tx.commit().await?;

    state.otp_limiter.reset(&email);

    Ok(ApiResponse::ok("OTP verified"))
}

pub async fn reset_password(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> Result<ApiResponse, AppError> {
    let email = normalize_email(&req.email);

    let user = db::users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let record = db::password_resets::find_latest_verified_unused(&state.pool, user.id)
        .await?
        .ok_or_else(|| AppError::BadRequest("OTP not verified".to_string()))?;

    if record.is_expired() {
        return Err(AppError::BadRequest("OTP expired".to_string()));
    }

    let unchanged = password::verify_blocking(req.new_password.clone(), user.password_hash.clone())
        .await
        .map_err(AppError::Internal)?;
    if unchanged {
        return Err(AppError::BadRequest(SAME_AS_OLD.to_string()));
    }

    let pw_hash = password::hash_blocking(req.new_password)
        .await
        .map_err(AppError::Internal)?;

    let mut tx = state.pool.begin().await?;
    // Claim the OTP first; a concurrent reset that lost the race rolls back
    if !db::password_resets::mark_used(&mut *tx, record.id).await? {
        return Err(AppError::BadRequest("OTP already used".to_string()));
    }
    db::users::update_password(&mut *tx, user.id, &pw_hash).await?;
    db::refresh_tokens::delete_all_for_user(&mut *tx, user.id).await?;
    tx.commit().await?;

    audit::log_event(&state.pool, Some(user.id), "password.reset", "user", Some(user.id), None).await;
    notify_password_changed(&state, &user.email).await;

    Ok(ApiResponse::ok("Password reset successfully"))
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> Result<(CookieJar, ApiResponse), AppError> {
    let user_id = parse_uuid("userId", &user_id)?;
    auth.require_self_or_admin(user_id)?;

    let user = db::users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let matches = password::verify_blocking(req.old_password, user.password_hash.clone())
        .await
        .map_err(AppError::Internal)?;
    if !matches {
        return Err(AppError::BadRequest("Old password is incorrect".to_string()));
    }

    let pw_hash = password::hash_blocking(req.new_password)
        .await
        .map_err(AppError::Internal)?;

    let mut tx = state.pool.begin().await?;
    db::users::update_password(&mut *tx, user.id, &pw_hash).await?;
    db::refresh_tokens::delete_all_for_user(&mut *tx, user.id).await?;
    tx.commit().await?;

    audit::log_event(&state.pool, Some(auth.user_id), "password.changed", "user", Some(user.id), None)
        .await;
    notify_password_changed(&state, &user.email).await;

    // Every session was revoked; keep the caller signed in
    let jar = if auth.user_id == user.id {
        start_session(&state, auth.user_id, &auth.name, &auth.role)
            .await?
            .cookies(&state)
    } else {
        CookieJar::new()
    };

    Ok((jar, ApiResponse::ok("Password updated successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{field_errors, FieldError};

    fn change(old: &str, new: &str, confirm: &str) -> ChangePasswordRequest {
        ChangePasswordRequest {
            old_password: old.into(),
            new_password: new.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn change_rejects_reusing_the_old_password() {
        let errors = field_errors(&change("Sup3r$ecret", "Sup3r$ecret", "Sup3r$ecret").validate().unwrap_err());
        assert_eq!(errors, vec![FieldError::new("newPassword", SAME_AS_OLD)]);
    }

    #[test]
    fn change_rejects_mismatched_confirmation() {
        let errors = field_errors(&change("0ld$ecret", "N3w$ecret", "N3w$ecreT").validate().unwrap_err());
        assert_eq!(errors, vec![FieldError::new("confirmPassword", CONFIRM_MISMATCH)]);
        assert!(change("0ld$ecret", "N3w$ecret", "N3w$ecret").validate().is_ok());
    }

    #[test]
    fn otp_must_be_six_digits() {
        let req = VerifyOtpRequest {
            email: "a@example.com".into(),
            otp: "12345".into(),
        };
        let errors = field_errors(&req.validate().unwrap_err());
        assert_eq!(errors, vec![FieldError::new("otp", "otp must be a 6-digit number")]);
    }
}
