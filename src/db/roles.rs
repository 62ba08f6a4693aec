use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Role;

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(executor: E, role: &str) -> Result<Role, sqlx::Error> {
    sqlx::query_as::<_, Role>("INSERT INTO roles (role) VALUES ($1) RETURNING *")
        .bind(role)
        .fetch_one(executor)
        .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_name<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    role: &str,
) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role = $1 AND deleted_at IS NULL")
        .bind(role)
        .fetch_optional(executor)
        .await
}

/// Includes soft-deleted roles.
pub async fn find_any_by_name(pool: &PgPool, role: &str) -> Result<Option<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE role = $1")
        .bind(role)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_names(pool: &PgPool, roles: &[String]) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "SELECT * FROM roles WHERE role = ANY($1) AND deleted_at IS NULL ORDER BY role",
    )
    .bind(roles)
    .fetch_all(pool)
    .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<Role>, sqlx::Error> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE deleted_at IS NULL ORDER BY role")
        .fetch_all(pool)
        .await
}

pub async fn restore(pool: &PgPool, id: Uuid) -> Result<Role, sqlx::Error> {
    sqlx::query_as::<_, Role>(
        "UPDATE roles SET deleted_at = NULL, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(pool)
    .await
}

pub async fn soft_delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE roles SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fails with a foreign-key violation while users still reference the role.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
