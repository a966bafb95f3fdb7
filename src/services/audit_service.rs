use crate::error::Result;
use crate::models::audit_log::AuditLog;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// One audit row, derived from a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub changes: Option<JsonValue>,
}

#[derive(Clone)]
pub struct AuditService {
    pool: PgPool,
}

impl AuditService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Writes the audit row for an outbox event. At most one row exists per
    /// event; `None` when it was already written by an earlier attempt.
    pub async fn log(&self, event_id: Uuid, entry: &AuditEntry) -> Result<Option<AuditLog>> {
        let row = sqlx::query_as::<_, AuditLog>(
            r#"
            INSERT INTO audit_logs (event_id, user_id, action, entity_type, entity_id, changes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (event_id) DO NOTHING
            RETURNING id, event_id, user_id, action, entity_type, entity_id, changes, created_at
            "#,
        )
        .bind(event_id)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.changes)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
