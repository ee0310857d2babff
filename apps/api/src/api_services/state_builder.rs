use std::sync::Arc;

use breeze_application::{
    DataPermissionService, PermissionRuleAdminService, ResourceRegistry,
};
use breeze_core::AppError;
use breeze_infrastructure::{
    PostgresAuditRepository, PostgresRecordMapper, PostgresRuleRepository, SnapshotRuleStore,
};
use sqlx::PgPool;
use tracing::info;

use crate::resources::built_in_registry;
use crate::state::AppState;

/// Wires Postgres adapters into the services and publishes the first rule snapshot.
pub async fn build_app_state(pool: PgPool) -> Result<AppState, AppError> {
    let registry: Arc<ResourceRegistry> = Arc::new(built_in_registry()?);
    let rule_store = Arc::new(SnapshotRuleStore::new());

    let rule_admin_service = PermissionRuleAdminService::new(
        registry.clone(),
        Arc::new(PostgresRuleRepository::new(pool.clone())),
        rule_store.clone(),
        Arc::new(PostgresAuditRepository::new(pool.clone())),
    );
    let version = rule_admin_service.reload().await?;
    info!(
        version,
        resource_count = registry.keys().count(),
        "permission rules loaded"
    );

    let data_permission_service = DataPermissionService::new(
        registry,
        rule_store,
        Arc::new(PostgresRecordMapper::new(pool.clone())),
    );

    Ok(AppState {
        data_permission_service,
        rule_admin_service,
        postgres_pool: pool,
    })
}
