use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use breeze_core::{AppError, AppResult, Principal};
use breeze_domain::{MaskedRecord, Page, ResourceKey};
use serde_json::Value;

use crate::dto::DataPageRequest;
use crate::error::ApiResult;
use crate::state::AppState;


pub async fn query_data_page_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(resource): Path<String>,
    Json(payload): Json<DataPageRequest>,
) -> ApiResult<Json<Page<MaskedRecord>>> {
    let resource_key = registered_resource_key(&state, resource)?;
    let page_request = payload.page_request()?;

    let page = state
        .data_permission_service
        .query_page(&principal, &resource_key, &payload.query, page_request)
        .await?;

    Ok(Json(page))
}

pub async fn validate_data_write_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(resource): Path<String>,
    Json(payload): Json<Value>,
) -> ApiResult<StatusCode> {
    let resource_key = registered_resource_key(&state, resource)?;

    state
        .data_permission_service
        .validate_write(&payload, &principal, &resource_key)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

fn registered_resource_key(state: &AppState, resource: String) -> AppResult<ResourceKey> {
    let resource_key = ResourceKey::new(resource)
        .map_err(|error| AppError::Validation(format!("invalid resource key: {error}")))?;

    if !state
        .data_permission_service
        .registry()
        .contains(&resource_key)
    {
        return Err(AppError::NotFound(format!(
            "data resource '{resource_key}' does not exist"
        )));
    }

    Ok(resource_key)
}
