use axum::extract::{Path, State};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use validator::{Validate, ValidationError};

use crate::auth::extractor::{AuthUser, ADMIN_ROLE, USER_ROLE};
use crate::auth::password;
use crate::auth::tokens::{generate_otp, generate_strong_password, hash_token};
use crate::db;
use crate::db::users::{NewUser, UserFilter};
use crate::email::{deliver, templates};
use crate::error::{conflict_on_unique, AppError};
use crate::middleware::audit;
use crate::models::User;
use crate::response::ApiResponse;
use crate::routes::password::OTP_LENGTH;
use crate::routes::role::normalize_role;
use crate::state::{AppState, SharedState};
use crate::validation::{
    normalize_email, not_blank, parse_uuid, strong_password, valid_uuid, ValidJson, ValidQuery,
};

/// Onboarding OTPs stay valid longer than reset OTPs.
const ONBOARDING_OTP_HOURS: i64 = 24;
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterUserRequest {
    #[validate(custom(function = "not_blank"), email)]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[validate(custom(function = "strong_password"))]
    pub password: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterAdminRequest {
    #[validate(custom(function = "not_blank"), email)]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ListUsersQuery {
    #[validate(custom(function = "positive_page"))]
    pub page: Option<String>,
    #[validate(custom(function = "page_size"))]
    pub limit: Option<String>,
    pub is_active: Option<String>,
    pub roles: Option<String>,
    pub search: Option<String>,
}

fn parse_bounded(value: Option<&str>, default: i64, max: i64) -> Option<i64> {
    match value.map(str::trim) {
        None | Some("") => Some(default),
        Some(raw) => raw.parse::<i64>().ok().filter(|n| (1..=max).contains(n)),
    }
}

fn positive_page(value: &str) -> Result<(), ValidationError> {
    match parse_bounded(Some(value), 1, i64::MAX) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("page").with_message("page must be a positive integer".into())),
    }
}

fn page_size(value: &str) -> Result<(), ValidationError> {
    match parse_bounded(Some(value), DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("limit")
            .with_message("limit must be an integer between 1 and 100".into())),
    }
}

impl ListUsersQuery {
    fn page(&self) -> Option<i64> {
        parse_bounded(self.page.as_deref(), 1, i64::MAX)
    }

    fn limit(&self) -> Option<i64> {
        parse_bounded(self.limit.as_deref(), DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// `true` filters active users, any other value inactive ones.
    fn is_active(&self) -> Option<bool> {
        self.is_active.as_deref().map(|v| v.trim() == "true")
    }

    fn role_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .roles
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(normalize_role)
            .filter(|r| !r.is_empty())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateEmailRequest {
    #[validate(custom(function = "not_blank"), email)]
    pub email_address: String,
    #[validate(custom(function = "not_blank"), email)]
    pub new_email_address: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferRoleRequest {
    #[validate(custom(function = "valid_uuid"))]
    pub from_role_id: String,
    #[validate(custom(function = "valid_uuid"))]
    pub to_role_id: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteUserRequest {
    #[validate(custom(function = "valid_uuid"))]
    pub user_id: String,
    pub permanent: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteUsersByRoleRequest {
    #[validate(custom(function = "valid_uuid"))]
    pub role_id: String,
    pub permanent: bool,
}

struct Registration<'a> {
    email: &'a str,
    name: &'a str,
    password: &'a str,
    is_active: bool,
    role: &'a str,
    /// Put the password in the welcome email (it was generated for the user).
    reveal_password: bool,
}

/// Create (or revive a soft-deleted) account, store its onboarding OTP and
/// send the welcome email. Nothing is committed unless the email went out.
async fn register(state: &AppState, reg: Registration<'_>) -> Result<User, AppError> {
    let role = db::roles::find_by_name(&state.pool, reg.role)
        .await?
        .ok_or_else(|| AppError::not_found("Role"))?;

    let pw_hash = password::hash_blocking(reg.password.to_string())
        .await
        .map_err(AppError::Internal)?;

    let new = NewUser {
        name: reg.name.trim(),
        email: reg.email,
        password_hash: &pw_hash,
        role_id: role.id,
        is_active: reg.is_active,
    };

    let mut tx = state.pool.begin().await?;

    let user = match db::users::find_any_by_email(&mut *tx, reg.email).await? {
        Some(existing) if !existing.is_deleted() => {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        Some(deleted) => {
            db::password_resets::supersede_open(&mut *tx, deleted.id).await?;
            db::users::restore(&mut *tx, deleted.id, &new).await?
        }
        None => db::users::create(&mut *tx, &new)
            .await
            .map_err(conflict_on_unique("User already exists"))?,
    };

    let otp = generate_otp(OTP_LENGTH);
    db::password_resets::create(
        &mut *tx,
        user.id,
        &hash_token(&otp),
        Utc::now() + Duration::hours(ONBOARDING_OTP_HOURS),
    )
    .await?;

    let link = templates::reset_link(state.client_url(), &otp, &user.email);
    let html = templates::render_welcome(
        &user.name,
        &link,
        &otp,
        reg.reveal_password.then_some(reg.password),
    );
    deliver(
        state.mailer.as_ref(),
        &[user.email.clone()],
        templates::WELCOME_SUBJECT,
        &html,
    )
    .await
    .map_err(AppError::Internal)?;

    tx.commit().await?;
    Ok(user)
}

pub async fn register_user(
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<RegisterUserRequest>,
) -> Result<ApiResponse, AppError> {
    let email = normalize_email(&req.email);

    let user = register(
        &state,
        Registration {
            email: &email,
            name: &req.name,
            password: &req.password,
            is_active: req.is_active.unwrap_or(true),
            role: USER_ROLE,
            reveal_password: false,
        },
    )
    .await?;

    audit::log_event(&state.pool, None, "user.registered", "user", Some(user.id), None).await;

    Ok(ApiResponse::created("User created successfully"))
}

pub async fn register_admin(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<RegisterAdminRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let email = normalize_email(&req.email);
    let generated = generate_strong_password();

    let user = register(
        &state,
        Registration {
            email: &email,
            name: &req.name,
            password: &generated,
            is_active: req.is_active.unwrap_or(true),
            role: ADMIN_ROLE,
            reveal_password: true,
        },
    )
    .await?;

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "user.registered",
        "user",
        Some(user.id),
        Some(json!({ "role": ADMIN_ROLE })),
    )
    .await;

    Ok(ApiResponse::created("User created successfully"))
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidQuery(query): ValidQuery<ListUsersQuery>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let page = query.page().unwrap_or(1);
    let limit = query.limit().unwrap_or(DEFAULT_PAGE_SIZE);

    let names = query.role_names();
    let role_ids = if names.is_empty() {
        None
    } else {
        let roles = db::roles::find_by_names(&state.pool, &names).await?;
        if roles.len() != names.len() {
            return Err(AppError::NotFound("One or more roles not found".to_string()));
        }
        Some(roles.into_iter().map(|r| r.id).collect())
    };

    let filter = UserFilter {
        is_active: query.is_active(),
        role_ids,
        search: query.search(),
    };

    let offset = (page - 1).saturating_mul(limit);
    let (rows, total) = db::users::list_page(&state.pool, &filter, limit, offset).await?;

    let mut grouped = Map::new();
    for row in rows {
        let entry = json!({
            "id": row.id,
            "name": row.name,
            "email": row.email,
            "isActive": row.is_active,
        });
        if let Value::Array(users) = grouped
            .entry(row.role)
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            users.push(entry);
        }
    }

    Ok(ApiResponse::ok("Users fetched successfully").with_data(json!({
        "docs": grouped,
        "total": total,
        "page": page,
        "limit": limit,
    })))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let user_id = parse_uuid("userId", &user_id)?;
    let user = db::users::find_with_role(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(ApiResponse::ok("User fetched successfully").with_docs(json!({
        "id": user.id,
        "name": user.name,
        "role": user.role,
        "email": user.email,
        "isActive": user.is_active,
    })))
}

pub async fn toggle_activity(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let user_id = parse_uuid("userId", &user_id)?;
    let user = db::users::toggle_active(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if !user.is_active {
        db::refresh_tokens::delete_all_for_user(&state.pool, user.id).await?;
    }

    let action = if user.is_active { "user.activated" } else { "user.deactivated" };
    audit::log_event(&state.pool, Some(auth.user_id), action, "user", Some(user.id), None).await;

    Ok(ApiResponse::ok("User updated successfully")
        .with_docs(json!({ "id": user.id, "isActive": user.is_active })))
}

pub async fn update_email(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<UpdateEmailRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let current = normalize_email(&req.email_address);
    let next = normalize_email(&req.new_email_address);

    let user = db::users::find_by_email(&state.pool, &current)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    if next != current && db::users::find_any_by_email(&state.pool, &next).await?.is_some() {
        return Err(AppError::Conflict("Email is already in use".to_string()));
    }

    let user = db::users::update_email(&state.pool, user.id, &next)
        .await
        .map_err(conflict_on_unique("Email is already in use"))?;

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "user.email_changed",
        "user",
        Some(user.id),
        Some(json!({ "from": current, "to": next })),
    )
    .await;

    Ok(ApiResponse::ok("Email updated successfully")
        .with_docs(json!({ "id": user.id, "email": user.email })))
}

pub async fn transfer_role(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<TransferRoleRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let from = parse_uuid("fromRoleId", &req.from_role_id)?;
    let to = parse_uuid("toRoleId", &req.to_role_id)?;

    let from_role = db::roles::find_by_id(&state.pool, from)
        .await?
        .ok_or_else(|| AppError::not_found("Role"))?;
    let to_role = db::roles::find_by_id(&state.pool, to)
        .await?
        .ok_or_else(|| AppError::not_found("Role"))?;

    let moved = db::users::transfer_role(&state.pool, from_role.id, to_role.id).await?;

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "user.role_transferred",
        "role",
        Some(from_role.id),
        Some(json!({ "from": from_role.role, "to": to_role.role, "users": moved })),
    )
    .await;

    Ok(ApiResponse::ok("Users transferred successfully").with_docs(json!({ "transferred": moved })))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<DeleteUserRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let user_id = parse_uuid("userId", &req.user_id)?;
    let user = db::users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut tx = state.pool.begin().await?;
    db::refresh_tokens::delete_all_for_user(&mut *tx, user.id).await?;
    if req.permanent {
        db::users::delete(&mut *tx, user.id).await?;
    } else {
        db::users::soft_delete(&mut *tx, user.id).await?;
    }
    tx.commit().await?;

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "user.deleted",
        "user",
        Some(user.id),
        Some(json!({ "permanent": req.permanent })),
    )
    .await;

    Ok(ApiResponse::ok("User deleted successfully"))
}

pub async fn delete_by_role(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<DeleteUsersByRoleRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let role_id = parse_uuid("roleId", &req.role_id)?;
    let role = db::roles::find_by_id(&state.pool, role_id)
        .await?
        .ok_or_else(|| AppError::not_found("Role"))?;

    if role.id == auth.role_id {
        return Err(AppError::BadRequest(
            "You cannot delete the users of your own role".to_string(),
        ));
    }

    let mut tx = state.pool.begin().await?;
    for user_id in db::users::ids_by_role(&mut *tx, role.id).await? {
        db::refresh_tokens::delete_all_for_user(&mut *tx, user_id).await?;
    }
    let deleted = if req.permanent {
        db::users::delete_by_role(&mut *tx, role.id).await?
    } else {
        db::users::soft_delete_by_role(&mut *tx, role.id).await?
    };
    tx.commit().await?;

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "user.deleted_by_role",
        "role",
        Some(role.id),
        Some(json!({ "role": role.role, "permanent": req.permanent, "users": deleted })),
    )
    .await;

    Ok(ApiResponse::ok("Users deleted successfully").with_docs(json!({ "deleted": deleted })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{field_errors, FieldError};

    fn query(page: Option<&str>, limit: Option<&str>) -> ListUsersQuery {
        ListUsersQuery {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn paging_defaults_and_bounds() {
        let q = query(None, None);
        assert_eq!((q.page(), q.limit()), (Some(1), Some(10)));

        assert_eq!(query(Some("3"), Some("100")).limit(), Some(100));
        assert!(query(Some("0"), None).validate().is_err());
        assert!(query(None, Some("101")).validate().is_err());
        assert!(query(Some("two"), None).validate().is_err());
    }

    #[test]
    fn paging_errors_carry_their_messages() {
        let errors = field_errors(&query(Some("0"), Some("0")).validate().unwrap_err());
        assert_eq!(
            errors,
            vec![
                FieldError::new("limit", "limit must be an integer between 1 and 100"),
                FieldError::new("page", "page must be a positive integer"),
            ]
        );
    }

    #[test]
    fn role_filter_is_normalized() {
        let q = ListUsersQuery {
            roles: Some(" Admin, user ,,admin".to_string()),
            ..Default::default()
        };
        assert_eq!(q.role_names(), vec!["admin".to_string(), "user".to_string()]);
    }

    #[test]
    fn activity_filter() {
        let mut q = ListUsersQuery::default();
        assert_eq!(q.is_active(), None);
        q.is_active = Some("true".into());
        assert_eq!(q.is_active(), Some(true));
        q.is_active = Some("no".into());
        assert_eq!(q.is_active(), Some(false));
    }
}
