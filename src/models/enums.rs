//! Shared domain enums
//!
//! Every enum is stored as its snake_case label, the same label serde uses
//! on the wire.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Implements `as_str`, `Display` and `FromStr` from one label table
macro_rules! labelled_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(AppError::Internal(format!(
                        "Unknown {} value '{}'",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// CheckoutStatus
// ---------------------------------------------------------------------------

/// Equipment checkout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    Available,
    CheckedOut,
    PartiallyCheckedOut,
    FullyCheckedOut,
    Maintenance,
    Damaged,
    Retired,
}

labelled_enum!(CheckoutStatus {
    Available => "available",
    CheckedOut => "checked_out",
    PartiallyCheckedOut => "partially_checked_out",
    FullyCheckedOut => "fully_checked_out",
    Maintenance => "maintenance",
    Damaged => "damaged",
    Retired => "retired",
});

impl CheckoutStatus {
    /// Statuses meaning some units are out with a borrower
    pub fn is_active_out(&self) -> bool {
        matches!(
            self,
            CheckoutStatus::CheckedOut
                | CheckoutStatus::PartiallyCheckedOut
                | CheckoutStatus::FullyCheckedOut
        )
    }

    /// Statuses that counter recomputation must not overwrite. Only a
    /// completed maintenance record or an explicit admin update clears them.
    pub fn is_admin_held(&self) -> bool {
        matches!(
            self,
            CheckoutStatus::Maintenance | CheckoutStatus::Damaged | CheckoutStatus::Retired
        )
    }
}

// ---------------------------------------------------------------------------
// EquipmentCondition
// ---------------------------------------------------------------------------

/// Physical condition of an equipment item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCondition {
    Excellent,
    Good,
    Fair,
    Poor,
    Damaged,
}

labelled_enum!(EquipmentCondition {
    Excellent => "excellent",
    Good => "good",
    Fair => "fair",
    Poor => "poor",
    Damaged => "damaged",
});

impl Default for EquipmentCondition {
    fn default() -> Self {
        EquipmentCondition::Good
    }
}

// ---------------------------------------------------------------------------
// ReservationKind
// ---------------------------------------------------------------------------

/// The four reservation kinds sharing the generic reservation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReservationKind {
    EquipmentCheckout,
    EventCheckout,
    Rental,
    StudioBooking,
}

labelled_enum!(ReservationKind {
    EquipmentCheckout => "equipment_checkout",
    EventCheckout => "event_checkout",
    Rental => "rental",
    StudioBooking => "studio_booking",
});

// ---------------------------------------------------------------------------
// ReservationStatus
// ---------------------------------------------------------------------------

/// Lifecycle status shared by all reservation kinds.
///
/// Which statuses a kind may use, and how it moves between them, is
/// decided by its transition table in [`crate::models::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Inquiry,
    PendingApproval,
    Confirmed,
    CheckedOut,
    InProgress,
    PartiallyReturned,
    Overdue,
    Returned,
    Completed,
    Cancelled,
}

labelled_enum!(ReservationStatus {
    Inquiry => "inquiry",
    PendingApproval => "pending_approval",
    Confirmed => "confirmed",
    CheckedOut => "checked_out",
    InProgress => "in_progress",
    PartiallyReturned => "partially_returned",
    Overdue => "overdue",
    Returned => "returned",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl ReservationStatus {
    /// Statuses in which a reservation counts against availability
    pub const HOLDING: &'static [ReservationStatus] = &[
        ReservationStatus::Confirmed,
        ReservationStatus::CheckedOut,
        ReservationStatus::InProgress,
        ReservationStatus::PartiallyReturned,
        ReservationStatus::Overdue,
    ];

    pub fn holds_inventory(&self) -> bool {
        Self::HOLDING.contains(self)
    }

    /// Statuses in which units are physically with the requester
    pub fn is_physically_out(&self) -> bool {
        matches!(
            self,
            ReservationStatus::CheckedOut
                | ReservationStatus::PartiallyReturned
                | ReservationStatus::Overdue
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Returned | ReservationStatus::Completed | ReservationStatus::Cancelled
        )
    }
}

// ---------------------------------------------------------------------------
// MovementDirection
// ---------------------------------------------------------------------------

/// Direction of a manual in/out movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MovementDirection {
    Out,
    In,
}

labelled_enum!(MovementDirection {
    Out => "out",
    In => "in",
});
