use axum::extract::State;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::auth::extractor::{AuthUser, ADMIN_ROLE, USER_ROLE};
use crate::db;
use crate::error::AppError;
use crate::middleware::audit;
use crate::response::ApiResponse;
use crate::state::SharedState;
use crate::validation::{not_blank, parse_uuid, valid_uuid, ValidJson};

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateRoleRequest {
    #[validate(custom(function = "not_blank"))]
    pub role_name: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteRoleRequest {
    #[validate(custom(function = "valid_uuid"))]
    pub role_id: String,
    pub permanent: bool,
}

pub fn normalize_role(name: &str) -> String {
    name.trim().to_lowercase()
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<CreateRoleRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let name = normalize_role(&req.role_name);

    let role = match db::roles::find_any_by_name(&state.pool, &name).await? {
        Some(existing) if !existing.is_deleted() => {
            return Err(AppError::Conflict("Role already exists".to_string()));
        }
        Some(deleted) => db::roles::restore(&state.pool, deleted.id).await?,
        None => db::roles::create(&state.pool, &name)
            .await
            .map_err(crate::error::conflict_on_unique("Role already exists"))?,
    };

    audit::log_event(&state.pool, Some(auth.user_id), "role.created", "role", Some(role.id), None)
        .await;

    Ok(ApiResponse::created("Role created successfully")
        .with_docs(json!({ "id": role.id, "role": role.role })))
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let roles: Vec<_> = db::roles::list(&state.pool)
        .await?
        .into_iter()
        .map(|r| json!({ "id": r.id, "role": r.role }))
        .collect();

    Ok(ApiResponse::ok("Roles fetched successfully").with_docs(roles))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    ValidJson(req): ValidJson<DeleteRoleRequest>,
) -> Result<ApiResponse, AppError> {
    auth.require_admin()?;

    let role_id = parse_uuid("roleId", &req.role_id)?;
    let role = db::roles::find_by_id(&state.pool, role_id)
        .await?
        .ok_or_else(|| AppError::not_found("Role"))?;

    if role.role == ADMIN_ROLE || role.role == USER_ROLE {
        return Err(AppError::BadRequest(format!(
            "The built-in '{}' role cannot be deleted",
            role.role
        )));
    }

    if req.permanent {
        db::roles::delete(&state.pool, role.id).await.map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                AppError::Conflict("Role is still assigned to users".to_string())
            }
            _ => AppError::Database(e),
        })?;
    } else {
        db::roles::soft_delete(&state.pool, role.id).await?;
    }

    audit::log_event(
        &state.pool,
        Some(auth.user_id),
        "role.deleted",
        "role",
        Some(role.id),
        Some(json!({ "role": role.role, "permanent": req.permanent })),
    )
    .await;

    Ok(ApiResponse::ok("Role deleted successfully"))
}
