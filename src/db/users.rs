use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{User, UserListRow, UserWithRole};

const WITH_ROLE: &str = "SELECT u.id, u.name, u.email, u.password_hash, u.role_id, r.role,
        u.is_active, u.is_verified
     FROM users u JOIN roles r ON r.id = u.role_id
     WHERE u.deleted_at IS NULL";

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role_id: Uuid,
    pub is_active: bool,
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    new: &NewUser<'_>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (name, email, password_hash, role_id, is_active)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(new.name)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.role_id)
    .bind(new.is_active)
    .fetch_one(executor)
    .await
}

/// Bring a soft-deleted user back with fresh registration data.
pub async fn restore<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    new: &NewUser<'_>,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET name = $2, email = $3, password_hash = $4, role_id = $5,
            is_active = $6, is_verified = false, last_login_at = NULL,
            deleted_at = NULL, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(new.name)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.role_id)
    .bind(new.is_active)
    .fetch_one(executor)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_email<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 AND deleted_at IS NULL")
        .bind(email)
        .fetch_optional(executor)
        .await
}

/// Includes soft-deleted users.
pub async fn find_any_by_email<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(executor)
        .await
}

pub async fn find_with_role(pool: &PgPool, id: Uuid) -> Result<Option<UserWithRole>, sqlx::Error> {
    sqlx::query_as::<_, UserWithRole>(&format!("{WITH_ROLE} AND u.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_with_role_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserWithRole>, sqlx::Error> {
    sqlx::query_as::<_, UserWithRole>(&format!("{WITH_ROLE} AND u.email = $1"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn update_password<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn touch_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_verified<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET is_verified = true, updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn toggle_active(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET is_active = NOT is_active, updated_at = now()
         WHERE id = $1 AND deleted_at IS NULL RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// A changed address has to be verified again.
pub async fn update_email(pool: &PgPool, id: Uuid, email: &str) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET email = $2, is_verified = false, updated_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(email)
    .fetch_one(pool)
    .await
}

pub async fn transfer_role(pool: &PgPool, from: Uuid, to: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET role_id = $2, updated_at = now()
         WHERE role_id = $1 AND deleted_at IS NULL",
    )
    .bind(from)
    .bind(to)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn soft_delete<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn delete<'e, E: sqlx::PgExecutor<'e>>(executor: E, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Ids of every user (live or soft-deleted) holding the role.
pub async fn ids_by_role<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    role_id: Uuid,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE role_id = $1")
        .bind(role_id)
        .fetch_all(executor)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn soft_delete_by_role<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    role_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE users SET deleted_at = now(), updated_at = now()
         WHERE role_id = $1 AND deleted_at IS NULL",
    )
    .bind(role_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn delete_by_role<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    role_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE role_id = $1")
        .bind(role_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Default)]
pub struct UserFilter {
    pub is_active: Option<bool>,
    pub role_ids: Option<Vec<Uuid>>,
    pub search: Option<String>,
}

const LIST_WHERE: &str = "WHERE u.deleted_at IS NULL
       AND ($1::boolean IS NULL OR u.is_active = $1)
       AND ($2::uuid[] IS NULL OR u.role_id = ANY($2))
       AND ($3::text IS NULL OR u.name ILIKE '%' || $3 || '%' ESCAPE '\\')";

/// One page of users ordered by role name, newest first within a role,
/// plus the total number of matches.
pub async fn list_page(
    pool: &PgPool,
    filter: &UserFilter,
    limit: i64,
    offset: i64,
) -> Result<(Vec<UserListRow>, i64), sqlx::Error> {
    let search = filter.search.as_deref().map(escape_like);

    let (total,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM users u {LIST_WHERE}"
    ))
    .bind(filter.is_active)
    .bind(filter.role_ids.as_deref())
    .bind(search.as_deref())
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, UserListRow>(&format!(
        "SELECT u.id, u.name, u.email, u.is_active, r.role
         FROM users u JOIN roles r ON r.id = u.role_id
         {LIST_WHERE}
         ORDER BY r.role ASC, u.created_at DESC
         LIMIT $4 OFFSET $5"
    ))
    .bind(filter.is_active)
    .bind(filter.role_ids.as_deref())
    .bind(search.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((rows, total))
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_wildcards_are_literal() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("ann"), "ann");
    }
}
