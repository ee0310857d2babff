mod audit;
mod final_query;
mod record_mapper;
mod rule_store;

pub use audit::{AuditEvent, AuditRepository};
pub use final_query::{FinalQuery, RowScope};
pub use record_mapper::RecordMapper;
pub use rule_store::{RuleRepository, RuleSet, RuleSnapshotPublisher, RuleStore};
