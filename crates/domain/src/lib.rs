//! Domain types for query-time data permissions.

#![forbid(unsafe_code)]

mod condition;
mod record;
mod resource;
mod security;

pub use condition::{
    ConditionGroup, ConditionNode, LogicalMode, Predicate, PredicateList, validate_identifier,
};
pub use record::{Cell, MAX_PAGE_SIZE, MaskedRecord, Page, PageRequest, REDACTED_MARKER_KEY, Record};
pub use resource::{DataColumn, DataResource, DataResourceBuilder, ResourceKey};
pub use security::{
    AuditAction, ColumnAccess, ColumnPermissionRule, RowFilter, RowPermissionRule, RuleSubject,
};
