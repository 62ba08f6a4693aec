use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub otp_hash: String,
    pub is_verified: bool,
    pub is_used: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl PasswordReset {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}
