//! Per-kind transition tables
//!
//! The table is authoritative: an edge that is not listed is rejected.
//! `overdue` never appears as a target because it is derived from the
//! window when a record is loaded or saved.

use super::enums::{ReservationKind, ReservationStatus};
use crate::error::{AppError, AppResult};

use ReservationStatus::*;

type Edge = (ReservationStatus, ReservationStatus);

const STUDIO_BOOKING: &[Edge] = &[
    (Inquiry, Confirmed),
    (Inquiry, Cancelled),
    (Confirmed, InProgress),
    (Confirmed, Cancelled),
    (InProgress, Completed),
];

const EQUIPMENT_CHECKOUT: &[Edge] = &[
    (PendingApproval, CheckedOut),
    (PendingApproval, Cancelled),
    (CheckedOut, PartiallyReturned),
    (CheckedOut, Returned),
    (Overdue, PartiallyReturned),
    (Overdue, Returned),
    (PartiallyReturned, Returned),
];

const EVENT_CHECKOUT: &[Edge] = &[
    (CheckedOut, PartiallyReturned),
    (CheckedOut, Returned),
    (Overdue, PartiallyReturned),
    (Overdue, Returned),
    (PartiallyReturned, Returned),
];

const RENTAL: &[Edge] = &[
    (Inquiry, Confirmed),
    (Inquiry, Cancelled),
    (Confirmed, CheckedOut),
    (Confirmed, Cancelled),
    (CheckedOut, PartiallyReturned),
    (CheckedOut, Returned),
    (Overdue, PartiallyReturned),
    (Overdue, Returned),
    (PartiallyReturned, Returned),
];

impl ReservationKind {
    pub fn transitions(&self) -> &'static [Edge] {
        match self {
            ReservationKind::StudioBooking => STUDIO_BOOKING,
            ReservationKind::EquipmentCheckout => EQUIPMENT_CHECKOUT,
            ReservationKind::EventCheckout => EVENT_CHECKOUT,
            ReservationKind::Rental => RENTAL,
        }
    }

    /// Status a new reservation of this kind starts in
    pub fn initial_status(&self) -> ReservationStatus {
        match self {
            ReservationKind::StudioBooking | ReservationKind::Rental => Inquiry,
            ReservationKind::EquipmentCheckout => PendingApproval,
            // event kits leave the building when the checkout is recorded
            ReservationKind::EventCheckout => CheckedOut,
        }
    }

    pub fn allowed_next(&self, from: ReservationStatus) -> Vec<ReservationStatus> {
        self.transitions()
            .iter()
            .filter(|(f, _)| *f == from)
            .map(|(_, to)| *to)
            .collect()
    }

    pub fn can_transition(&self, from: ReservationStatus, to: ReservationStatus) -> bool {
        self.transitions().contains(&(from, to))
    }

    /// Whether confirming a reservation of this kind issues an invoice
    pub fn invoices_on_confirm(&self) -> bool {
        matches!(self, ReservationKind::Rental | ReservationKind::StudioBooking)
    }

    /// Whether the kind moves units out of the building
    pub fn takes_inventory(&self) -> bool {
        !matches!(self, ReservationKind::StudioBooking)
    }
}

/// Reject any edge the kind's table does not list
pub fn ensure_transition(
    kind: ReservationKind,
    from: ReservationStatus,
    to: ReservationStatus,
) -> AppResult<()> {
    if kind.can_transition(from, to) {
        return Ok(());
    }
    let allowed = kind
        .allowed_next(from)
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Err(AppError::InvalidTransition(format!(
        "{} cannot move from {} to {} (allowed: [{}])",
        kind, from, to, allowed
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_totality() {
        for kind in ReservationKind::ALL {
            for from in ReservationStatus::ALL {
                for to in ReservationStatus::ALL {
                    let listed = kind.transitions().contains(&(*from, *to));
                    let result = ensure_transition(*kind, *from, *to);
                    assert_eq!(result.is_ok(), listed, "{} {} -> {}", kind, from, to);
                    if !listed {
                        assert!(matches!(result, Err(AppError::InvalidTransition(_))));
                    }
                }
            }
        }
    }

    #[test]
    fn no_self_loops_and_terminals_are_final() {
        for kind in ReservationKind::ALL {
            for (from, to) in kind.transitions() {
                assert_ne!(from, to);
                assert!(!from.is_terminal());
                assert_ne!(*to, Overdue);
            }
        }
    }

    #[test]
    fn studio_booking_table() {
        let kind = ReservationKind::StudioBooking;
        assert_eq!(kind.initial_status(), Inquiry);
        assert_eq!(kind.allowed_next(Inquiry), vec![Confirmed, Cancelled]);
        assert_eq!(kind.allowed_next(Confirmed), vec![InProgress, Cancelled]);
        assert_eq!(kind.allowed_next(InProgress), vec![Completed]);
        assert!(kind.allowed_next(Completed).is_empty());
        assert!(!kind.can_transition(Inquiry, InProgress));
    }

    #[test]
    fn checkout_is_approved_or_cancelled() {
        let kind = ReservationKind::EquipmentCheckout;
        assert_eq!(kind.initial_status(), PendingApproval);
        assert_eq!(kind.allowed_next(PendingApproval), vec![CheckedOut, Cancelled]);
        assert!(!kind.can_transition(CheckedOut, Cancelled));
    }
}
