//! Reservation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        reservation::{
            AmendReservation, ApproveReservation, CreateReservation, ReservationQuery, ReturnItems,
            UpdateReservationStatus,
        },
        Invoice, Reservation,
    },
    AppState,
};

use super::Actor;

/// List reservations
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    params(ReservationQuery),
    responses(
        (status = 200, description = "Reservations ordered by start", body = Vec<Reservation>)
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    Query(query): Query<ReservationQuery>,
) -> AppResult<Json<Vec<Reservation>>> {
    Ok(Json(state.services.reservations.list(&query).await?))
}

/// Get reservation by ID
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation details", body = Reservation),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Reservation>> {
    Ok(Json(state.services.reservations.get(id).await?))
}

/// Create a reservation in its kind's initial status
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    request_body = CreateReservation,
    responses(
        (status = 201, description = "Reservation created", body = Reservation),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Slot unavailable or insufficient availability")
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<CreateReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    let reservation = state.services.reservations.create(request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Amend a reservation that has not been acted on
#[utoipa::path(
    patch,
    path = "/reservations/{id}",
    tag = "reservations",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    request_body = AmendReservation,
    responses(
        (status = 200, description = "Reservation amended", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation can no longer change")
    )
)]
pub async fn amend_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<AmendReservation>,
) -> AppResult<Json<Reservation>> {
    Ok(Json(state.services.reservations.amend(id, patch).await?))
}

/// Delete a reservation
#[utoipa::path(
    delete,
    path = "/reservations/{id}",
    tag = "reservations",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 204, description = "Reservation deleted"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Reservation is invoiced or holds resources")
    )
)]
pub async fn delete_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.reservations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Approve or reject a pending checkout
#[utoipa::path(
    post,
    path = "/reservations/{id}/approve",
    tag = "reservations",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    request_body = ApproveReservation,
    responses(
        (status = 200, description = "Decision recorded", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Not pending, or not enough units")
    )
)]
pub async fn approve_reservation(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(decision): Json<ApproveReservation>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .reservations
        .approve(id, decision, actor.name())
        .await?;
    Ok(Json(reservation))
}

/// Move a reservation along its transition table
#[utoipa::path(
    put,
    path = "/reservations/{id}/status",
    tag = "reservations",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    request_body = UpdateReservationStatus,
    responses(
        (status = 200, description = "Status changed", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Transition not allowed or resource unavailable")
    )
)]
pub async fn update_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateReservationStatus>,
) -> AppResult<Json<Reservation>> {
    let reservation = state
        .services
        .reservations
        .update_status(id, request, actor.name())
        .await?;
    Ok(Json(reservation))
}

/// Return some or all of the units out
#[utoipa::path(
    post,
    path = "/reservations/{id}/return",
    tag = "reservations",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    request_body = ReturnItems,
    responses(
        (status = 200, description = "Return recorded", body = Reservation),
        (status = 400, description = "Unknown line or too many units"),
        (status = 404, description = "Reservation not found"),
        (status = 409, description = "Nothing is out")
    )
)]
pub async fn return_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReturnItems>,
) -> AppResult<Json<Reservation>> {
    Ok(Json(state.services.reservations.return_items(id, request).await?))
}

/// Invoice issued for a reservation
#[utoipa::path(
    get,
    path = "/reservations/{id}/invoice",
    tag = "reservations",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Invoice", body = Invoice),
        (status = 404, description = "Reservation or invoice not found")
    )
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    Ok(Json(state.services.invoices.get_for_reservation(id).await?))
}
