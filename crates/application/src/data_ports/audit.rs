use async_trait::async_trait;

use breeze_core::{AppResult, TenantId, UserId};
use breeze_domain::AuditAction;

/// Audit event emitted by rule administration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Tenant of the acting principal.
    pub tenant_id: TenantId,
    /// Acting user.
    pub actor_id: UserId,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Affected rule identifier.
    pub resource_id: String,
    /// Optional audit detail.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
