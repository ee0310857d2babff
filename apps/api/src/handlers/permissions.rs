use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use breeze_core::{AppError, Principal, RoleId};
use breeze_domain::{ColumnPermissionRule, ResourceKey};

use crate::dto::{
    RuleSnapshotResponse, RuleTenantQuery, SaveColumnRuleRequest, SaveRowRuleRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;


pub async fn save_row_rule_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(code): Path<String>,
    Query(tenant): Query<RuleTenantQuery>,
    Json(payload): Json<SaveRowRuleRequest>,
) -> ApiResult<Json<RuleSnapshotResponse>> {
    let rule = payload.into_rule(tenant.target_tenant(&principal), code)?;
    let version = state
        .rule_admin_service
        .save_row_rule(&principal, rule)
        .await?;

    Ok(Json(RuleSnapshotResponse { version }))
}

pub async fn delete_row_rule_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(code): Path<String>,
    Query(tenant): Query<RuleTenantQuery>,
) -> ApiResult<Json<RuleSnapshotResponse>> {
    let version = state
        .rule_admin_service
        .delete_row_rule(&principal, tenant.target_tenant(&principal), code.as_str())
        .await?;

    Ok(Json(RuleSnapshotResponse { version }))
}

pub async fn save_column_rule_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((role_id, resource, column)): Path<(i64, String, String)>,
    Query(tenant): Query<RuleTenantQuery>,
    Json(payload): Json<SaveColumnRuleRequest>,
) -> ApiResult<Json<RuleSnapshotResponse>> {
    let rule = ColumnPermissionRule::new(
        tenant.target_tenant(&principal),
        RoleId::new(role_id),
        column_rule_resource_key(resource)?,
        column,
        payload.access,
    )
    .map_err(|error| AppError::Validation(error.to_string()))?;

    let version = state
        .rule_admin_service
        .save_column_rule(&principal, rule)
        .await?;

    Ok(Json(RuleSnapshotResponse { version }))
}

pub async fn delete_column_rule_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((role_id, resource, column)): Path<(i64, String, String)>,
    Query(tenant): Query<RuleTenantQuery>,
) -> ApiResult<Json<RuleSnapshotResponse>> {
    let resource_key = column_rule_resource_key(resource)?;
    let version = state
        .rule_admin_service
        .delete_column_rule(
            &principal,
            tenant.target_tenant(&principal),
            RoleId::new(role_id),
            &resource_key,
            column.as_str(),
        )
        .await?;

    Ok(Json(RuleSnapshotResponse { version }))
}

fn column_rule_resource_key(resource: String) -> Result<ResourceKey, AppError> {
    ResourceKey::new(resource)
        .map_err(|error| AppError::Validation(format!("invalid resource key: {error}")))
}
