use sqlx::PgPool;

use crate::auth::extractor::ADMIN_ROLE;
use crate::auth::password;
use crate::config::BootstrapAdmin;
use crate::db;
use crate::db::users::NewUser;
use crate::validation::normalize_email;

/// Create the configured administrator unless that email is already taken.
/// Returns whether a user was created.
pub async fn ensure_admin(pool: &PgPool, admin: &BootstrapAdmin) -> Result<bool, String> {
    let email = normalize_email(&admin.email);

    if db::users::find_any_by_email(pool, &email)
        .await
        .map_err(|e| format!("Failed to look up bootstrap admin: {e}"))?
        .is_some()
    {
        return Ok(false);
    }

    let role = db::roles::find_by_name(pool, ADMIN_ROLE)
        .await
        .map_err(|e| format!("Failed to look up admin role: {e}"))?
        .ok_or_else(|| "Admin role is missing".to_string())?;

    let pw_hash = password::hash_blocking(admin.password.clone()).await?;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| format!("Failed to start transaction: {e}"))?;

    let user = db::users::create(
        &mut *tx,
        &NewUser {
            name: &admin.name,
            email: &email,
            password_hash: &pw_hash,
            role_id: role.id,
            is_active: true,
        },
    )
    .await
    .map_err(|e| format!("Failed to create bootstrap admin: {e}"))?;

    db::users::mark_verified(&mut *tx, user.id)
        .await
        .map_err(|e| format!("Failed to verify bootstrap admin: {e}"))?;

    tx.commit()
        .await
        .map_err(|e| format!("Failed to commit bootstrap admin: {e}"))?;

    tracing::info!("Bootstrap admin {email} created");
    Ok(true)
}
