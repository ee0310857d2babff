//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_record_mapper;
mod postgres_audit_repository;
mod postgres_record_mapper;
mod postgres_rule_repository;
mod snapshot_rule_store;

pub use in_memory_record_mapper::InMemoryRecordMapper;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_record_mapper::PostgresRecordMapper;
pub use postgres_rule_repository::PostgresRuleRepository;
pub use snapshot_rule_store::{RuleSnapshot, SnapshotRuleStore};
