//! Equipment inventory endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        equipment::{CreateEquipment, CreateInOut, CreateMaintenance, UpdateEquipment},
        Equipment,
    },
    AppState,
};

use super::Actor;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct EquipmentQuery {
    /// Include deactivated items
    #[serde(default)]
    pub include_inactive: bool,
}

/// List equipment
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    params(EquipmentQuery),
    responses(
        (status = 200, description = "Equipment items", body = Vec<Equipment>)
    )
)]
pub async fn list_equipment(
    State(state): State<AppState>,
    Query(query): Query<EquipmentQuery>,
) -> AppResult<Json<Vec<Equipment>>> {
    let items = state
        .services
        .inventory
        .list_items(query.include_inactive)
        .await?;
    Ok(Json(items))
}

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = Equipment),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Equipment>> {
    Ok(Json(state.services.inventory.get_item(id).await?))
}

/// Register equipment
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment created", body = Equipment),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Code already exists")
    )
)]
pub async fn create_equipment(
    State(state): State<AppState>,
    Json(data): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<Equipment>)> {
    let item = state.services.inventory.create_item(data).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Update equipment
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Equipment updated", body = Equipment),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Owned quantity below units out")
    )
)]
pub async fn update_equipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateEquipment>,
) -> AppResult<Json<Equipment>> {
    Ok(Json(state.services.inventory.update_item(id, data).await?))
}

/// Deactivate equipment
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment deactivated", body = Equipment),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Equipment is checked out or reserved")
    )
)]
pub async fn delete_equipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Equipment>> {
    Ok(Json(state.services.inventory.deactivate(id).await?))
}

/// Record maintenance work
#[utoipa::path(
    post,
    path = "/equipment/{id}/maintenance",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = CreateMaintenance,
    responses(
        (status = 200, description = "Maintenance recorded", body = Equipment),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn record_maintenance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(data): Json<CreateMaintenance>,
) -> AppResult<Json<Equipment>> {
    let item = state
        .services
        .inventory
        .record_maintenance(id, data, actor.name())
        .await?;
    Ok(Json(item))
}

/// Record a manual in/out movement
#[utoipa::path(
    post,
    path = "/equipment/{id}/in-out",
    tag = "equipment",
    params(("id" = Uuid, Path, description = "Equipment ID")),
    request_body = CreateInOut,
    responses(
        (status = 200, description = "Movement recorded", body = Equipment),
        (status = 404, description = "Equipment not found"),
        (status = 409, description = "Not enough units")
    )
)]
pub async fn record_in_out(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(data): Json<CreateInOut>,
) -> AppResult<Json<Equipment>> {
    let item = state
        .services
        .inventory
        .record_in_out(id, data, actor.name())
        .await?;
    Ok(Json(item))
}
