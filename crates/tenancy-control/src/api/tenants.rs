//! Tenant management endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::error::{ControlError, ControlResult};
use crate::types::{Tenant, TenantId};
use crate::validation::{validate_tenant_id, validate_tenant_name};

use super::AppState;

/// Request to create a tenant.
#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    /// Tenant identifier; becomes part of the namespace and hostname.
    pub id: String,
    /// Display label.
    pub name: String,
}

/// Create a tenant.
///
/// Responds once the namespace exists; the rollout continues in the
/// background. Unreadable bodies are client errors like any other
/// validation failure.
pub async fn create_tenant(
    State(state): State<AppState>,
    payload: Result<Json<CreateTenantRequest>, JsonRejection>,
) -> ControlResult<(StatusCode, Json<Tenant>)> {
    let Json(request) =
        payload.map_err(|rejection| ControlError::InvalidRequest(rejection.body_text()))?;

    validate_tenant_id(&request.id, state.manager.namespace_prefix())?;
    validate_tenant_name(&request.name)?;

    info!(tenant_id = %request.id, "creating tenant via API");

    let tenant = state
        .manager
        .create(TenantId::new(request.id), request.name)
        .await?;

    Ok((StatusCode::CREATED, Json(tenant)))
}

/// List all tenants with their cached status.
pub async fn list_tenants(State(state): State<AppState>) -> ControlResult<Json<Vec<Tenant>>> {
    Ok(Json(state.manager.list()?))
}

/// Get a tenant, refreshing its deployment status.
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ControlResult<Json<Tenant>> {
    let tenant_id = TenantId::new(id);

    state
        .manager
        .get(&tenant_id)
        .await?
        .map(Json)
        .ok_or_else(|| ControlError::TenantNotFound(tenant_id.to_string()))
}

/// Delete a tenant and its platform resources.
pub async fn delete_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ControlResult<StatusCode> {
    state.manager.delete(&TenantId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
