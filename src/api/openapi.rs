//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{availability, equipment, health, pricing, reservations, studios};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "D4 Media API",
        version = "0.4.0",
        description = "Equipment checkout, rental and studio reservation REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html"),
        contact(name = "D4 Media Engineering", email = "dev@d4media.in")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        equipment::record_maintenance,
        equipment::record_in_out,
        // Studios
        studios::list_studios,
        studios::create_studio,
        // Availability & pricing
        availability::check_availability,
        pricing::estimate,
        // Reservations
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::create_reservation,
        reservations::amend_reservation,
        reservations::delete_reservation,
        reservations::approve_reservation,
        reservations::update_status,
        reservations::return_items,
        reservations::get_invoice,
    ),
    components(
        schemas(
            // Enums
            crate::models::CheckoutStatus,
            crate::models::EquipmentCondition,
            crate::models::MovementDirection,
            crate::models::ReservationKind,
            crate::models::ReservationStatus,
            // Equipment
            crate::models::Equipment,
            crate::models::RateTable,
            crate::models::equipment::MaintenanceRecord,
            crate::models::equipment::InOutRecord,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::CreateMaintenance,
            crate::models::equipment::CreateInOut,
            // Studios
            crate::models::Studio,
            crate::models::studio::CreateStudio,
            // Reservations
            crate::models::Reservation,
            crate::models::TimeWindow,
            crate::models::LineItem,
            crate::models::PriceBreakdown,
            crate::models::reservation::Requester,
            crate::models::reservation::Charge,
            crate::models::reservation::Approval,
            crate::models::reservation::ReturnEntry,
            crate::models::reservation::LineItemRequest,
            crate::models::reservation::CreateReservation,
            crate::models::reservation::ApproveReservation,
            crate::models::reservation::UpdateReservationStatus,
            crate::models::reservation::ItemReturn,
            crate::models::reservation::ReturnItems,
            crate::models::reservation::AmendReservation,
            crate::models::Invoice,
            // Availability & pricing
            crate::services::availability::AvailabilityPolicy,
            crate::services::availability::ResourceType,
            crate::services::availability::AvailabilityReport,
            crate::services::pricing::PriceEstimateRequest,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "equipment", description = "Equipment inventory"),
        (name = "studios", description = "Studio registry"),
        (name = "availability", description = "Availability checks"),
        (name = "pricing", description = "Price estimates"),
        (name = "reservations", description = "Checkouts, rentals and studio bookings")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_reservation_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/reservations/{id}/approve"));
        assert!(doc.paths.paths.contains_key("/availability"));
    }
}
