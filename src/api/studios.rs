//! Studio endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::{studio::CreateStudio, Studio},
    AppState,
};

/// List studios
#[utoipa::path(
    get,
    path = "/studios",
    tag = "studios",
    responses(
        (status = 200, description = "Studios", body = Vec<Studio>)
    )
)]
pub async fn list_studios(State(state): State<AppState>) -> AppResult<Json<Vec<Studio>>> {
    Ok(Json(state.services.inventory.list_studios().await?))
}

/// Register a studio
#[utoipa::path(
    post,
    path = "/studios",
    tag = "studios",
    request_body = CreateStudio,
    responses(
        (status = 201, description = "Studio created", body = Studio),
        (status = 409, description = "Name already exists")
    )
)]
pub async fn create_studio(
    State(state): State<AppState>,
    Json(data): Json<CreateStudio>,
) -> AppResult<(StatusCode, Json<Studio>)> {
    let studio = state.services.inventory.create_studio(data).await?;
    Ok((StatusCode::CREATED, Json(studio)))
}
