//! Data models for the reservation core

pub mod enums;
pub mod equipment;
pub mod event;
pub mod invoice;
pub mod lifecycle;
pub mod reservation;
pub mod studio;

// Re-export commonly used types
pub use enums::{
    CheckoutStatus, EquipmentCondition, MovementDirection, ReservationKind, ReservationStatus,
};
pub use equipment::{Equipment, RateTable};
pub use event::{DomainEvent, Outcome};
pub use invoice::Invoice;
pub use reservation::{LineItem, PriceBreakdown, Reservation, TimeWindow};
pub use studio::Studio;
