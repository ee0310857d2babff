use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use breeze_application::{RuleSet, RuleSnapshotPublisher, RuleStore};
use breeze_core::{AppResult, RoleId, TenantId};
use breeze_domain::{ColumnPermissionRule, ResourceKey, RowPermissionRule, RuleSubject};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

/// Immutable rule configuration readers consult during one lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSnapshot {
    /// Monotonic version, starting at 0 for the empty snapshot.
    pub version: u64,
    /// Publish time.
    pub committed_at: DateTime<Utc>,
    /// Rules sorted by tenant and code, then by tenant, role, resource and column.
    pub rules: RuleSet,
}

/// Rule store serving lookups from the latest published snapshot.
///
/// Readers clone the current `Arc` and release the lock before filtering, so a
/// publish never blocks on a slow reader and readers never see a partial set.
#[derive(Debug)]
pub struct SnapshotRuleStore {
    current: RwLock<Arc<RuleSnapshot>>,
}

impl SnapshotRuleStore {
    /// Creates a store holding an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(RuleSnapshot {
                version: 0,
                committed_at: Utc::now(),
                rules: RuleSet::default(),
            })),
        }
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.current.read().await.clone()
    }
}

impl Default for SnapshotRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleStore for SnapshotRuleStore {
    async fn row_rules_for(
        &self,
        tenant_id: TenantId,
        role_ids: &BTreeSet<RoleId>,
        resource_key: &ResourceKey,
    ) -> AppResult<Vec<RowPermissionRule>> {
        let snapshot = self.snapshot().await;

        Ok(snapshot
            .rules
            .row_rules
            .iter()
            .filter(|rule| rule.tenant_id() == tenant_id && rule.covers_resource(resource_key))
            .filter(|rule| match rule.subject() {
                RuleSubject::Roles(rule_role_ids) => !rule_role_ids.is_disjoint(role_ids),
                RuleSubject::Everyone | RuleSubject::User(_) | RuleSubject::Departments(_) => true,
            })
            .cloned()
            .collect())
    }

    async fn row_rules_by_codes(
        &self,
        tenant_id: TenantId,
        codes: &BTreeSet<String>,
        resource_key: &ResourceKey,
    ) -> AppResult<Vec<RowPermissionRule>> {
        let snapshot = self.snapshot().await;

        Ok(snapshot
            .rules
            .row_rules
            .iter()
            .filter(|rule| rule.tenant_id() == tenant_id && rule.covers_resource(resource_key))
            .filter(|rule| codes.contains(rule.code()))
            .cloned()
            .collect())
    }

    async fn column_rules_for(
        &self,
        tenant_id: TenantId,
        role_ids: &BTreeSet<RoleId>,
        resource_key: &ResourceKey,
    ) -> AppResult<Vec<ColumnPermissionRule>> {
        let snapshot = self.snapshot().await;

        Ok(snapshot
            .rules
            .column_rules
            .iter()
            .filter(|rule| {
                rule.tenant_id() == tenant_id
                    && rule.resource_key() == resource_key
                    && role_ids.contains(&rule.role_id())
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RuleSnapshotPublisher for SnapshotRuleStore {
    async fn publish(&self, mut rules: RuleSet) -> AppResult<u64> {
        rules.row_rules.sort_by(|left, right| {
            (left.tenant_id(), left.code()).cmp(&(right.tenant_id(), right.code()))
        });
        rules.column_rules.sort_by(|left, right| {
            (
                left.tenant_id(),
                left.role_id(),
                left.resource_key(),
                left.column(),
            )
                .cmp(&(
                    right.tenant_id(),
                    right.role_id(),
                    right.resource_key(),
                    right.column(),
                ))
        });

        let mut current = self.current.write().await;
        let version = current.version + 1;
        *current = Arc::new(RuleSnapshot {
            version,
            committed_at: Utc::now(),
            rules,
        });
        drop(current);

        debug!(version, "swapped permission rule snapshot");
        Ok(version)
    }
}
