use breeze_application::{DataPermissionService, PermissionRuleAdminService};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub data_permission_service: DataPermissionService,
    pub rule_admin_service: PermissionRuleAdminService,
    pub postgres_pool: PgPool,
}
