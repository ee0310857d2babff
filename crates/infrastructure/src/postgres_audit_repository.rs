use async_trait::async_trait;
use sqlx::PgPool;

use breeze_application::{AuditEvent, AuditRepository};
use breeze_core::{AppError, AppResult};

/// PostgreSQL-backed append-only audit repository for rule administration.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permission_audit_events (
                tenant_id,
                actor_id,
                action,
                resource_id,
                detail
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(event.tenant_id.get())
        .bind(event.actor_id.get())
        .bind(event.action.as_str())
        .bind(event.resource_id)
        .bind(event.detail)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit event: {error}")))?;

        Ok(())
    }
}
