//! Availability endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    services::availability::{AvailabilityQuery, AvailabilityReport},
    AppState,
};

/// Check whether a resource is free for a window
#[utoipa::path(
    get,
    path = "/availability",
    tag = "availability",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Availability report", body = AvailabilityReport),
        (status = 400, description = "Invalid window or quantity"),
        (status = 404, description = "Resource not found")
    )
)]
pub async fn check_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityReport>> {
    Ok(Json(state.services.availability.check(&query).await?))
}
