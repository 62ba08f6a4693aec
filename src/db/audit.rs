use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AuditEvent;

pub async fn log_event(
    pool: &PgPool,
    actor_id: Option<Uuid>,
    action: &str,
    resource_type: &str,
    resource_id: Option<Uuid>,
    details: Option<serde_json::Value>,
) -> Result<AuditEvent, sqlx::Error> {
    sqlx::query_as::<_, AuditEvent>(
        "INSERT INTO audit_events (actor_id, action, resource_type, resource_id, details)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(actor_id)
    .bind(action)
    .bind(resource_type)
    .bind(resource_id)
    .bind(details)
    .fetch_one(pool)
    .await
}

pub async fn list_for_resource(
    pool: &PgPool,
    resource_id: Uuid,
) -> Result<Vec<AuditEvent>, sqlx::Error> {
    sqlx::query_as::<_, AuditEvent>(
        "SELECT * FROM audit_events WHERE resource_id = $1 ORDER BY created_at DESC",
    )
    .bind(resource_id)
    .fetch_all(pool)
    .await
}
