use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use breeze_application::{RuleRepository, RuleSet};
use breeze_core::{AppError, AppResult, RoleId, TenantId};
use breeze_domain::{
    ColumnAccess, ColumnPermissionRule, ResourceKey, RowFilter, RowPermissionRule, RuleSubject,
};
use serde_json::Value;


/// PostgreSQL-backed repository for row and column permission rules.
#[derive(Clone)]
pub struct PostgresRuleRepository {
    pool: PgPool,
}

impl PostgresRuleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RowRuleRow {
    tenant_id: i64,
    code: String,
    resource_key: Option<String>,
    subject: Value,
    filter: Value,
}

#[derive(Debug, FromRow)]
struct ColumnRuleRow {
    tenant_id: i64,
    role_id: i64,
    resource_key: String,
    column_name: String,
    access: String,
}

#[async_trait]
impl RuleRepository for PostgresRuleRepository {
    async fn save_row_rule(&self, rule: RowPermissionRule) -> AppResult<()> {
        let subject = serde_json::to_value(rule.subject()).map_err(|error| {
            AppError::Internal(format!("failed to serialize row rule subject: {error}"))
        })?;
        let filter = serde_json::to_value(rule.filter()).map_err(|error| {
            AppError::Internal(format!("failed to serialize row rule filter: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO row_permission_rules (tenant_id, code, resource_key, subject, filter)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, code) DO UPDATE
            SET resource_key = EXCLUDED.resource_key,
                subject = EXCLUDED.subject,
                filter = EXCLUDED.filter,
                updated_at = now()
            "#,
        )
        .bind(rule.tenant_id().get())
        .bind(rule.code())
        .bind(rule.resource_key().map(ResourceKey::as_str))
        .bind(subject)
        .bind(filter)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save row rule '{}': {error}",
                rule.code()
            ))
        })?;

        Ok(())
    }

    async fn delete_row_rule(&self, tenant_id: TenantId, code: &str) -> AppResult<()> {
        let result =
            sqlx::query("DELETE FROM row_permission_rules WHERE tenant_id = $1 AND code = $2")
                .bind(tenant_id.get())
                .bind(code)
                .execute(&self.pool)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to delete row rule '{code}': {error}"))
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "row rule '{code}' does not exist in tenant '{tenant_id}'"
            )));
        }

        Ok(())
    }

    async fn save_column_rule(&self, rule: ColumnPermissionRule) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO column_permission_rules (
                tenant_id, role_id, resource_key, column_name, access
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (tenant_id, role_id, resource_key, column_name) DO UPDATE
            SET access = EXCLUDED.access,
                updated_at = now()
            "#,
        )
        .bind(rule.tenant_id().get())
        .bind(rule.role_id().get())
        .bind(rule.resource_key().as_str())
        .bind(rule.column())
        .bind(rule.access().as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save column rule for '{}' on '{}': {error}",
                rule.column(),
                rule.resource_key()
            ))
        })?;

        Ok(())
    }

    async fn delete_column_rule(
        &self,
        tenant_id: TenantId,
        role_id: RoleId,
        resource_key: &ResourceKey,
        column: &str,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM column_permission_rules
            WHERE tenant_id = $1 AND role_id = $2 AND resource_key = $3 AND column_name = $4
            "#,
        )
        .bind(tenant_id.get())
        .bind(role_id.get())
        .bind(resource_key.as_str())
        .bind(column)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete column rule for '{column}' on '{resource_key}': {error}"
            ))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "column rule for '{column}' on '{resource_key}' does not exist for role '{role_id}'"
            )));
        }

        Ok(())
    }

    async fn load_rules(&self) -> AppResult<RuleSet> {
        let row_rows = sqlx::query_as::<_, RowRuleRow>(
            r#"
            SELECT tenant_id, code, resource_key, subject, filter
            FROM row_permission_rules
            ORDER BY tenant_id, code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load row rules: {error}")))?;

        let column_rows = sqlx::query_as::<_, ColumnRuleRow>(
            r#"
            SELECT tenant_id, role_id, resource_key, column_name, access
            FROM column_permission_rules
            ORDER BY tenant_id, role_id, resource_key, column_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load column rules: {error}")))?;

        Ok(RuleSet {
            row_rules: row_rows
                .into_iter()
                .map(row_rule_from_row)
                .collect::<AppResult<_>>()?,
            column_rules: column_rows
                .into_iter()
                .map(column_rule_from_row)
                .collect::<AppResult<_>>()?,
        })
    }
}

fn row_rule_from_row(row: RowRuleRow) -> AppResult<RowPermissionRule> {
    let subject = serde_json::from_value::<RuleSubject>(row.subject).map_err(|error| {
        AppError::Configuration(format!(
            "row rule '{}' has a malformed subject: {error}",
            row.code
        ))
    })?;
    let filter = serde_json::from_value::<RowFilter>(row.filter).map_err(|error| {
        AppError::Configuration(format!(
            "row rule '{}' has a malformed filter: {error}",
            row.code
        ))
    })?;
    let resource_key = row.resource_key.map(ResourceKey::new).transpose()?;

    RowPermissionRule::new(
        TenantId::new(row.tenant_id),
        row.code,
        resource_key,
        subject,
        filter,
    )
}

fn column_rule_from_row(row: ColumnRuleRow) -> AppResult<ColumnPermissionRule> {
    ColumnPermissionRule::new(
        TenantId::new(row.tenant_id),
        RoleId::new(row.role_id),
        ResourceKey::new(row.resource_key)?,
        row.column_name,
        row.access.parse::<ColumnAccess>()?,
    )
}
