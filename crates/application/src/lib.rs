//! Application services and ports.

#![forbid(unsafe_code)]

mod condition_assembler;
mod data_permission_service;
mod data_ports;
mod resource_registry;
mod rule_admin_service;

pub use condition_assembler::{ConditionMode, FieldBinding, FieldType, QueryDeclaration};
pub use data_permission_service::{ColumnMask, DataPermissionService};
pub use data_ports::{
    AuditEvent, AuditRepository, FinalQuery, RecordMapper, RowScope, RuleRepository, RuleSet,
    RuleSnapshotPublisher, RuleStore,
};
pub use resource_registry::{RegisteredResource, ResourceRegistry};
pub use rule_admin_service::{PermissionRuleAdminService, RULE_ADMIN_ROLE_CODE};
