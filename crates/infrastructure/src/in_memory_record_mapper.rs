use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use breeze_application::{FinalQuery, RecordMapper};
use breeze_core::{AppError, AppResult};
use breeze_domain::{ConditionGroup, ConditionNode, LogicalMode, Page, PageRequest, Predicate, Record};
use serde_json::Value;
use tokio::sync::RwLock;


/// In-memory record mapper evaluating rewritten queries over stored rows.
#[derive(Debug, Default)]
pub struct InMemoryRecordMapper {
    tables: RwLock<HashMap<String, Vec<Record>>>,
}

impl InMemoryRecordMapper {
    /// Creates an empty mapper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row to a table.
    pub async fn insert(&self, table: &str, row: Value) -> AppResult<()> {
        let record = Record::new(row)?;
        self.tables
            .write()
            .await
            .entry(table.to_owned())
            .or_default()
            .push(record);
        Ok(())
    }
}

#[async_trait]
impl RecordMapper for InMemoryRecordMapper {
    async fn select_page(&self, query: &FinalQuery, page: PageRequest) -> AppResult<Page<Record>> {
        let where_clause = query.where_clause();
        let id_column = query.resource.id_column();

        let tables = self.tables.read().await;
        let mut matched: Vec<&Record> = tables
            .get(query.resource.table())
            .map(|rows| {
                rows.iter()
                    .filter(|row| group_matches(&where_clause, row))
                    .collect()
            })
            .unwrap_or_default();

        matched.sort_by(|left, right| {
            compare_values(
                left.get(id_column).unwrap_or(&Value::Null),
                right.get(id_column).unwrap_or(&Value::Null),
            )
            .unwrap_or(Ordering::Equal)
        });

        let offset = usize::try_from(page.offset()).map_err(|error| {
            AppError::Validation(format!("page offset is out of range: {error}"))
        })?;
        let size = usize::try_from(page.size())
            .map_err(|error| AppError::Validation(format!("page size is out of range: {error}")))?;

        Ok(Page {
            total: matched.len() as u64,
            records: matched.into_iter().skip(offset).take(size).cloned().collect(),
            page: page.page(),
            size: page.size(),
        })
    }
}

fn group_matches(group: &ConditionGroup, row: &Record) -> bool {
    let node_matches = |node: &ConditionNode| match node {
        ConditionNode::Predicate(predicate) => predicate_matches(predicate, row),
        ConditionNode::Group(nested) => group_matches(nested, row),
    };

    match group.logical_mode {
        LogicalMode::And => group.nodes.iter().all(node_matches),
        LogicalMode::Or => group.nodes.iter().any(node_matches),
    }
}

fn predicate_matches(predicate: &Predicate, row: &Record) -> bool {
    let cell = |column: &str| row.get(column).unwrap_or(&Value::Null);

    match predicate {
        Predicate::Eq { column, value } => {
            compare_values(cell(column), value) == Some(Ordering::Equal)
        }
        Predicate::Gt { column, value } => {
            compare_values(cell(column), value) == Some(Ordering::Greater)
        }
        Predicate::Gte { column, value } => matches!(
            compare_values(cell(column), value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Predicate::Lt { column, value } => {
            compare_values(cell(column), value) == Some(Ordering::Less)
        }
        Predicate::Lte { column, value } => matches!(
            compare_values(cell(column), value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Predicate::Like { column, value } => cell(column)
            .as_str()
            .is_some_and(|text| text.contains(value.as_str())),
        Predicate::In { column, values } => values
            .iter()
            .any(|value| compare_values(cell(column), value) == Some(Ordering::Equal)),
        Predicate::MatchNone => false,
    }
}

/// Orders two scalars the way SQL would; `None` when incomparable or NULL.
fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => match (left.as_i64(), right.as_i64()) {
            (Some(left), Some(right)) => Some(left.cmp(&right)),
            _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
        },
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => Some(left.cmp(right)),
        _ => None,
    }
}
