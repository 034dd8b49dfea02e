//! Domain events collected into an outbox by lifecycle operations and
//! dispatched once the commit succeeded

use uuid::Uuid;

use super::enums::ReservationStatus;
use super::reservation::Reservation;

#[derive(Debug, Clone)]
pub enum DomainEvent {
    Requested {
        reservation: Box<Reservation>,
    },
    Approved {
        reservation: Box<Reservation>,
    },
    Rejected {
        reservation: Box<Reservation>,
    },
    StatusChanged {
        reservation: Box<Reservation>,
        from: ReservationStatus,
    },
    ItemsReturned {
        reservation: Box<Reservation>,
        fully_returned: bool,
    },
    EquipmentDamaged {
        equipment_id: Uuid,
        code: String,
        reservation_id: Uuid,
    },
    InvoiceRequested {
        reservation_id: Uuid,
    },
}

impl DomainEvent {
    /// Reservation whose requester should hear about this event
    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            DomainEvent::Requested { reservation }
            | DomainEvent::Approved { reservation }
            | DomainEvent::Rejected { reservation }
            | DomainEvent::StatusChanged { reservation, .. }
            | DomainEvent::ItemsReturned { reservation, .. } => Some(reservation),
            DomainEvent::EquipmentDamaged { .. } | DomainEvent::InvoiceRequested { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::Requested { .. } => "requested",
            DomainEvent::Approved { .. } => "approved",
            DomainEvent::Rejected { .. } => "rejected",
            DomainEvent::StatusChanged { .. } => "status_changed",
            DomainEvent::ItemsReturned { .. } => "items_returned",
            DomainEvent::EquipmentDamaged { .. } => "equipment_damaged",
            DomainEvent::InvoiceRequested { .. } => "invoice_requested",
        }
    }
}

/// Result of a lifecycle operation: the committed record and its outbox
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub record: T,
    pub events: Vec<DomainEvent>,
}
