use std::collections::BTreeSet;

use async_trait::async_trait;
use breeze_core::{AppResult, RoleId, TenantId};
use breeze_domain::{ColumnPermissionRule, ResourceKey, RowPermissionRule};

/// Read side of the rule configuration consulted at query time.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Lists candidate row rules of a tenant for a resource.
    ///
    /// Role-scoped rules are limited to the given roles; user, department and
    /// everyone-scoped rules are always returned and matched by the caller.
    async fn row_rules_for(
        &self,
        tenant_id: TenantId,
        role_ids: &BTreeSet<RoleId>,
        resource_key: &ResourceKey,
    ) -> AppResult<Vec<RowPermissionRule>>;

    /// Lists row rules of a tenant with the given codes that cover a resource.
    async fn row_rules_by_codes(
        &self,
        tenant_id: TenantId,
        codes: &BTreeSet<String>,
        resource_key: &ResourceKey,
    ) -> AppResult<Vec<RowPermissionRule>>;

    /// Lists column rules of a tenant's roles on a resource.
    async fn column_rules_for(
        &self,
        tenant_id: TenantId,
        role_ids: &BTreeSet<RoleId>,
        resource_key: &ResourceKey,
    ) -> AppResult<Vec<ColumnPermissionRule>>;
}

/// Complete rule configuration loaded from persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    /// Row permission rules.
    pub row_rules: Vec<RowPermissionRule>,
    /// Column permission rules.
    pub column_rules: Vec<ColumnPermissionRule>,
}

/// Persistence port for administrator rule edits.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Creates or replaces a row rule keyed by tenant and code.
    async fn save_row_rule(&self, rule: RowPermissionRule) -> AppResult<()>;

    /// Deletes a tenant's row rule by code.
    async fn delete_row_rule(&self, tenant_id: TenantId, code: &str) -> AppResult<()>;

    /// Creates or replaces a column rule keyed by tenant, role, resource and column.
    async fn save_column_rule(&self, rule: ColumnPermissionRule) -> AppResult<()>;

    /// Deletes a tenant's column rule.
    async fn delete_column_rule(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        resource_key: &ResourceKey,
        column: &str,
    ) -> AppResult<()>;

    /// Loads every rule of every tenant.
    async fn load_rules(&self) -> AppResult<RuleSet>;
}

/// Write side of the rule store: swaps in a complete rule set.
#[async_trait]
pub trait RuleSnapshotPublisher: Send + Sync {
    /// Publishes the rule set and returns the new snapshot version.
    async fn publish(&self, rules: RuleSet) -> AppResult<u64>;
}
