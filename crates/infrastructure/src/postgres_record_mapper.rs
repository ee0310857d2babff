use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use breeze_application::{FinalQuery, RecordMapper};
use breeze_core::{AppError, AppResult};
use breeze_domain::{
    ConditionGroup, ConditionNode, LogicalMode, Page, PageRequest, Predicate, Record,
};
use serde_json::Value;


/// PostgreSQL-backed mapper reading rows of registered resource tables.
///
/// Rows come back as `to_jsonb` objects so any table can be served without a
/// per-table row type.
#[derive(Clone)]
pub struct PostgresRecordMapper {
    pool: PgPool,
}

impl PostgresRecordMapper {
    /// Creates a mapper with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordMapper for PostgresRecordMapper {
    async fn select_page(&self, query: &FinalQuery, page: PageRequest) -> AppResult<Page<Record>> {
        let mut builder = build_page_query(query, page)?;

        let (total, records): (i64, Value) = builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to query records of resource '{}': {error}",
                    query.resource.key()
                ))
            })?;

        let Value::Array(rows) = records else {
            return Err(AppError::Internal(format!(
                "record page of resource '{}' is not a JSON array",
                query.resource.key()
            )));
        };

        Ok(Page {
            records: rows
                .into_iter()
                .map(Record::new)
                .collect::<AppResult<Vec<_>>>()?,
            total: u64::try_from(total).map_err(|error| {
                AppError::Internal(format!("record count is out of range: {error}"))
            })?,
            page: page.page(),
            size: page.size(),
        })
    }
}

/// Renders the count and page of one query as a single statement.
pub(crate) fn build_page_query(
    query: &FinalQuery,
    page: PageRequest,
) -> AppResult<QueryBuilder<'static, Postgres>> {
    let limit = i64::try_from(page.size())
        .map_err(|error| AppError::Validation(format!("invalid page size: {error}")))?;
    let offset = i64::try_from(page.offset())
        .map_err(|error| AppError::Validation(format!("invalid page offset: {error}")))?;

    let mut builder: QueryBuilder<'static, Postgres> =
        QueryBuilder::new("WITH matched AS (SELECT * FROM ");
    push_identifier(&mut builder, query.resource.table());
    builder.push(" WHERE ");
    push_group(&mut builder, &query.where_clause());
    builder.push(
        ") SELECT (SELECT COUNT(*) FROM matched) AS total, \
         COALESCE((SELECT jsonb_agg(to_jsonb(paged) ORDER BY paged.",
    );
    push_identifier(&mut builder, query.resource.id_column());
    builder.push(") FROM (SELECT * FROM matched ORDER BY ");
    push_identifier(&mut builder, query.resource.id_column());
    builder.push(" LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);
    builder.push(") paged), '[]'::jsonb) AS records");

    Ok(builder)
}

fn push_identifier(builder: &mut QueryBuilder<'static, Postgres>, identifier: &str) {
    for (index, segment) in identifier.split('.').enumerate() {
        if index > 0 {
            builder.push('.');
        }
        builder.push('"');
        builder.push(segment.replace('"', "\"\""));
        builder.push('"');
    }
}

fn push_group(builder: &mut QueryBuilder<'static, Postgres>, group: &ConditionGroup) {
    if group.nodes.is_empty() {
        builder.push(match group.logical_mode {
            LogicalMode::And => "TRUE",
            LogicalMode::Or => "FALSE",
        });
        return;
    }

    builder.push('(');
    for (index, node) in group.nodes.iter().enumerate() {
        if index > 0 {
            builder.push(" ");
            builder.push(group.logical_mode.as_str());
            builder.push(" ");
        }

        match node {
            ConditionNode::Predicate(predicate) => push_predicate(builder, predicate),
            ConditionNode::Group(nested) => push_group(builder, nested),
        }
    }
    builder.push(')');
}

fn push_predicate(builder: &mut QueryBuilder<'static, Postgres>, predicate: &Predicate) {
    let (column, operator, value) = match predicate {
        Predicate::Eq { column, value } => (column, "=", value),
        Predicate::Gt { column, value } => (column, ">", value),
        Predicate::Gte { column, value } => (column, ">=", value),
        Predicate::Lt { column, value } => (column, "<", value),
        Predicate::Lte { column, value } => (column, "<=", value),
        Predicate::Like { column, value } => {
            push_identifier(builder, column);
            builder.push(" LIKE ");
            builder.push_bind(format!("%{}%", escape_like(value)));
            builder.push(" ESCAPE '\\'");
            return;
        }
        Predicate::In { values, .. } if values.is_empty() => {
            builder.push("FALSE");
            return;
        }
        Predicate::In { column, values } => {
            push_identifier(builder, column);
            builder.push(" IN (");
            for (index, value) in values.iter().enumerate() {
                if index > 0 {
                    builder.push(", ");
                }
                push_scalar(builder, value, false);
            }
            builder.push(')');
            return;
        }
        Predicate::MatchNone => {
            builder.push("FALSE");
            return;
        }
    };

    if value.is_null() {
        builder.push("FALSE");
        return;
    }

    push_identifier(builder, column);
    builder.push(" ");
    builder.push(operator);
    builder.push(" ");
    push_scalar(builder, value, operator != "=");
}

/// Binds a JSON scalar with its natural Postgres type.
///
/// Ordering comparisons bind RFC 3339 timestamps and `YYYY-MM-DD` dates as
/// temporal values so range bounds work against timestamp columns.
fn push_scalar(builder: &mut QueryBuilder<'static, Postgres>, value: &Value, ordered: bool) {
    match value {
        Value::Bool(flag) => {
            builder.push_bind(*flag);
        }
        Value::Number(number) => match number.as_i64() {
            Some(integer) => {
                builder.push_bind(integer);
            }
            None => {
                builder.push_bind(number.as_f64().unwrap_or_default());
            }
        },
        Value::String(text) if ordered => {
            if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
                builder.push_bind(timestamp.with_timezone(&Utc));
            } else if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                builder.push_bind(date);
            } else {
                builder.push_bind(text.clone());
            }
        }
        Value::String(text) => {
            builder.push_bind(text.clone());
        }
        Value::Null => {
            builder.push("NULL");
        }
        Value::Array(_) | Value::Object(_) => {
            builder.push_bind(value.clone());
        }
    }
}

/// Escapes LIKE wildcards so the needle matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        if matches!(character, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(character);
    }
    escaped
}
