use std::sync::Arc;

use breeze_core::{AppError, AppResult, Principal};
use breeze_domain::{
    DataResource, MaskedRecord, Page, PageRequest, PredicateList, Record, ResourceKey,
};
use serde_json::Value;
use tracing::debug;

use crate::data_ports::{FinalQuery, RecordMapper, RowScope, RuleStore};
use crate::resource_registry::ResourceRegistry;

mod column_mask;
mod scope;


pub use column_mask::ColumnMask;

/// Query-time data permission enforcement for registered resources.
///
/// Every read runs through [`DataPermissionService::rewrite`], which ANDs the
/// principal's row scope and tenant with the caller's predicates. Reads are
/// masked and writes validated against the principal's column rules.
#[derive(Clone)]
pub struct DataPermissionService {
    registry: Arc<ResourceRegistry>,
    rule_store: Arc<dyn RuleStore>,
    record_mapper: Arc<dyn RecordMapper>,
}

impl DataPermissionService {
    /// Creates the service from a registry and its ports.
    #[must_use]
    pub fn new(
        registry: Arc<ResourceRegistry>,
        rule_store: Arc<dyn RuleStore>,
        record_mapper: Arc<dyn RecordMapper>,
    ) -> Self {
        Self {
            registry,
            rule_store,
            record_mapper,
        }
    }

    /// Returns the resource registry.
    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        self.registry.as_ref()
    }

    /// Assembles caller predicates with the resource's query declaration.
    pub fn assemble(
        &self,
        resource_key: &ResourceKey,
        declared_query: &Value,
    ) -> AppResult<PredicateList> {
        self.registry
            .resolve(resource_key)?
            .declaration
            .assemble(declared_query)
    }

    /// Merges the principal's row scope and tenant isolation into caller predicates.
    pub async fn rewrite(
        &self,
        base_query: PredicateList,
        principal: &Principal,
        resource_key: &ResourceKey,
    ) -> AppResult<FinalQuery> {
        let resource = self.resource(resource_key)?;
        let row_scope = self.resolve_row_scope(principal, &resource).await?;

        let tenant_id = if principal.is_super_admin() {
            None
        } else {
            Some(principal.tenant_id())
        };

        Ok(FinalQuery {
            resource,
            tenant_id,
            row_scope,
            filters: base_query,
        })
    }

    /// Runs a declared query for the principal and returns one masked page.
    pub async fn query_page(
        &self,
        principal: &Principal,
        resource_key: &ResourceKey,
        declared_query: &Value,
        page: PageRequest,
    ) -> AppResult<Page<MaskedRecord>> {
        let predicates = self.assemble(resource_key, declared_query)?;
        let query = self.rewrite(predicates, principal, resource_key).await?;

        if query.row_scope.is_deny_all() {
            debug!(
                tenant_id = %principal.tenant_id(),
                user_id = %principal.user_id(),
                resource_key = %resource_key,
                "no row rule grants access, returning empty page"
            );
            return Ok(Page::empty(page));
        }

        let rows = self.record_mapper.select_page(&query, page).await?;
        let mask = self.column_mask(principal, resource_key).await?;

        rows.try_map(|record| Ok(mask.apply(record)))
    }

    /// Redacts columns hidden from the principal.
    pub async fn mask(
        &self,
        rows: Vec<Record>,
        principal: &Principal,
        resource_key: &ResourceKey,
    ) -> AppResult<Vec<MaskedRecord>> {
        self.registry.resolve(resource_key)?;
        let mask = self.column_mask(principal, resource_key).await?;

        Ok(rows.into_iter().map(|record| mask.apply(record)).collect())
    }

    /// Rejects payload keys naming columns the principal may not write.
    pub async fn validate_write(
        &self,
        payload: &Value,
        principal: &Principal,
        resource_key: &ResourceKey,
    ) -> AppResult<()> {
        self.registry.resolve(resource_key)?;

        let object = payload.as_object().ok_or_else(|| {
            AppError::Validation("write payload must be a JSON object".to_owned())
        })?;

        let mask = self.column_mask(principal, resource_key).await?;
        mask.check_writable(object.keys().map(String::as_str))
    }

    fn resource(&self, resource_key: &ResourceKey) -> AppResult<DataResource> {
        Ok(self.registry.resolve(resource_key)?.resource.clone())
    }

    async fn column_mask(
        &self,
        principal: &Principal,
        resource_key: &ResourceKey,
    ) -> AppResult<ColumnMask> {
        if principal.is_super_admin() {
            return Ok(ColumnMask::unrestricted());
        }

        let rules = self
            .rule_store
            .column_rules_for(principal.tenant_id(), principal.role_ids(), resource_key)
            .await?;

        ColumnMask::from_rules(principal.tenant_id(), principal.role_ids(), resource_key, &rules)
    }
}
