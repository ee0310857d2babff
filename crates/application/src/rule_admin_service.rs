use std::sync::Arc;

use breeze_core::{AppError, AppResult, Principal, RoleId, TenantId};
use breeze_domain::{AuditAction, ColumnPermissionRule, ResourceKey, RowPermissionRule};
use tokio::sync::Mutex;
use tracing::info;

use crate::data_ports::{AuditEvent, AuditRepository, RuleRepository, RuleSnapshotPublisher};
use crate::resource_registry::ResourceRegistry;

#[cfg(test)]
mod tests;

/// Role code allowed to administer permission rules inside a tenant.
pub const RULE_ADMIN_ROLE_CODE: &str = "ROLE_ADMIN";

/// Application service for row and column rule administration.
///
/// Every successful edit reloads the complete rule set from the repository and
/// publishes it as a new snapshot, so readers switch from one committed rule
/// set to the next. Edits and reloads run one at a time, so a snapshot is never
/// replaced by one loaded before it.
///
/// Rule admins edit the rules of their own tenant; platform super admins may
/// edit any tenant's rules.
///
/// The audit event is written after the new snapshot is published. When the
/// audit write fails the edit stays committed and live, and the error is
/// returned to the caller.
#[derive(Clone)]
pub struct PermissionRuleAdminService {
    registry: Arc<ResourceRegistry>,
    repository: Arc<dyn RuleRepository>,
    publisher: Arc<dyn RuleSnapshotPublisher>,
    audit_repository: Arc<dyn AuditRepository>,
    edit_lock: Arc<Mutex<()>>,
}

impl PermissionRuleAdminService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        registry: Arc<ResourceRegistry>,
        repository: Arc<dyn RuleRepository>,
        publisher: Arc<dyn RuleSnapshotPublisher>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        Self {
            registry,
            repository,
            publisher,
            audit_repository,
            edit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Loads every persisted rule and publishes it; returns the snapshot version.
    pub async fn reload(&self) -> AppResult<u64> {
        let _edit_guard = self.edit_lock.lock().await;
        self.load_and_publish().await
    }

    async fn load_and_publish(&self) -> AppResult<u64> {
        let rules = self.repository.load_rules().await?;
        let row_rule_count = rules.row_rules.len();
        let column_rule_count = rules.column_rules.len();

        let version = self.publisher.publish(rules).await?;
        info!(
            version,
            row_rule_count, column_rule_count, "published permission rule snapshot"
        );

        Ok(version)
    }

    /// Creates or replaces a row rule.
    pub async fn save_row_rule(
        &self,
        actor: &Principal,
        rule: RowPermissionRule,
    ) -> AppResult<u64> {
        self.require_rule_admin(actor, rule.tenant_id())?;
        rule.validate()
            .map_err(|error| AppError::Validation(error.to_string()))?;
        if let Some(resource_key) = rule.resource_key() {
            self.require_registered(resource_key)?;
        }

        let tenant_id = rule.tenant_id();
        let code = rule.code().to_owned();
        let detail = format!(
            "subject={} filter={}",
            rule.subject().kind(),
            rule.filter().kind()
        );

        let edit_guard = self.edit_lock.lock().await;
        self.repository.save_row_rule(rule).await?;
        let version = self.load_and_publish().await?;
        drop(edit_guard);

        self.record(
            actor,
            tenant_id,
            AuditAction::RowRuleSaved,
            code,
            Some(detail),
        )
        .await?;
        Ok(version)
    }

    /// Deletes a tenant's row rule by code.
    pub async fn delete_row_rule(
        &self,
        actor: &Principal,
        tenant_id: TenantId,
        code: &str,
    ) -> AppResult<u64> {
        self.require_rule_admin(actor, tenant_id)?;

        let edit_guard = self.edit_lock.lock().await;
        self.repository.delete_row_rule(tenant_id, code).await?;
        let version = self.load_and_publish().await?;
        drop(edit_guard);

        self.record(
            actor,
            tenant_id,
            AuditAction::RowRuleDeleted,
            code.to_owned(),
            None,
        )
        .await?;
        Ok(version)
    }

    /// Creates or replaces a column rule.
    pub async fn save_column_rule(
        &self,
        actor: &Principal,
        rule: ColumnPermissionRule,
    ) -> AppResult<u64> {
        self.require_rule_admin(actor, rule.tenant_id())?;
        rule.validate()
            .map_err(|error| AppError::Validation(error.to_string()))?;
        self.require_registered(rule.resource_key())?;

        let tenant_id = rule.tenant_id();
        let resource_id = column_rule_id(rule.role_id(), rule.resource_key(), rule.column());
        let detail = format!("access={}", rule.access().as_str());

        let edit_guard = self.edit_lock.lock().await;
        self.repository.save_column_rule(rule).await?;
        let version = self.load_and_publish().await?;
        drop(edit_guard);

        self.record(
            actor,
            tenant_id,
            AuditAction::ColumnRuleSaved,
            resource_id,
            Some(detail),
        )
        .await?;
        Ok(version)
    }

    /// Deletes a tenant's column rule.
    pub async fn delete_column_rule(
        &self,
        actor: &Principal,
        tenant_id: TenantId,
        role_id: RoleId,
        resource_key: &ResourceKey,
        column: &str,
    ) -> AppResult<u64> {
        self.require_rule_admin(actor, tenant_id)?;

        let edit_guard = self.edit_lock.lock().await;
        self.repository
            .delete_column_rule(tenant_id, role_id, resource_key, column)
            .await?;
        let version = self.load_and_publish().await?;
        drop(edit_guard);

        self.record(
            actor,
            tenant_id,
            AuditAction::ColumnRuleDeleted,
            column_rule_id(role_id, resource_key, column),
            None,
        )
        .await?;
        Ok(version)
    }

    fn require_rule_admin(&self, actor: &Principal, tenant_id: TenantId) -> AppResult<()> {
        if actor.is_super_admin() {
            return Ok(());
        }

        if !actor.role_codes().contains(RULE_ADMIN_ROLE_CODE) {
            return Err(AppError::Forbidden(format!(
                "user '{}' may not administer permission rules",
                actor.username()
            )));
        }

        if actor.tenant_id() != tenant_id {
            return Err(AppError::Forbidden(format!(
                "user '{}' may not administer permission rules of tenant {tenant_id}",
                actor.username()
            )));
        }

        Ok(())
    }

    fn require_registered(&self, resource_key: &ResourceKey) -> AppResult<()> {
        if self.registry.contains(resource_key) {
            return Ok(());
        }

        Err(AppError::Validation(format!(
            "data resource '{resource_key}' is not registered"
        )))
    }

    async fn record(
        &self,
        actor: &Principal,
        tenant_id: TenantId,
        action: AuditAction,
        resource_id: String,
        detail: Option<String>,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                tenant_id,
                actor_id: actor.user_id(),
                action,
                resource_id,
                detail,
            })
            .await
    }
}

fn column_rule_id(role_id: RoleId, resource_key: &ResourceKey, column: &str) -> String {
    format!("{role_id}:{resource_key}:{column}")
}
