use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::PasswordReset;

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    otp_hash: &str,
    expires_at: DateTime<Utc>,
) -> Result<PasswordReset, sqlx::Error> {
    sqlx::query_as::<_, PasswordReset>(
        "INSERT INTO password_resets (user_id, otp_hash, expires_at)
         VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(user_id)
    .bind(otp_hash)
    .bind(expires_at)
    .fetch_one(executor)
    .await
}

/// Retire every open (unused) record so only the newest OTP can be redeemed.
pub async fn supersede_open<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE password_resets SET deleted_at = now(), updated_at = now()
         WHERE user_id = $1 AND is_used = false AND deleted_at IS NULL",
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn find_latest_by_otp(
    pool: &PgPool,
    user_id: Uuid,
    otp_hash: &str,
) -> Result<Option<PasswordReset>, sqlx::Error> {
    sqlx::query_as::<_, PasswordReset>(
        "SELECT * FROM password_resets
         WHERE user_id = $1 AND otp_hash = $2 AND deleted_at IS NULL
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .bind(otp_hash)
    .fetch_optional(pool)
    .await
}

pub async fn find_latest_verified_unused(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<PasswordReset>, sqlx::Error> {
    sqlx::query_as::<_, PasswordReset>(
        "SELECT * FROM password_resets
         WHERE user_id = $1 AND is_verified = true AND is_used = false AND deleted_at IS NULL
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn mark_verified<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE password_resets SET is_verified = true, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Flip `is_used` once; `false` means another request already consumed it.
pub async fn mark_used<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE password_resets SET is_used = true, updated_at = now()
         WHERE id = $1 AND is_used = false",
    )
    .bind(id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Drop records that expired or were retired more than a day ago.
pub async fn purge_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM password_resets
         WHERE expires_at < now() - interval '1 day'
            OR deleted_at < now() - interval '1 day'",
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
