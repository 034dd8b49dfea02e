//! Reservation model shared by equipment checkouts, event checkouts,
//! rentals and studio bookings

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::{EquipmentCondition, ReservationKind, ReservationStatus};
use crate::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Closed time interval `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::Validation(format!(
                "Window end {} must be after start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Closed-interval overlap: sharing a single instant counts
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Started hours, at least one
    pub fn billable_hours(&self) -> i64 {
        ceil_units(self.end - self.start, Duration::hours(1))
    }

    /// Started days, at least one
    pub fn billable_days(&self) -> i64 {
        ceil_units(self.end - self.start, Duration::days(1))
    }
}

fn ceil_units(span: Duration, unit: Duration) -> i64 {
    let span = span.num_seconds().max(0);
    let unit = unit.num_seconds();
    ((span + unit - 1) / unit).max(1)
}

// ---------------------------------------------------------------------------
// Parts of a reservation
// ---------------------------------------------------------------------------

/// One `(equipment, quantity, rate)` line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub equipment_id: Uuid,
    pub quantity: i32,
    /// Unit rate snapshot taken when the reservation was priced
    pub rate: Decimal,
    #[serde(default)]
    pub returned_quantity: i32,
}

impl LineItem {
    pub fn outstanding(&self) -> i32 {
        (self.quantity - self.returned_quantity).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct Requester {
    #[validate(length(min = 1, message = "Requester name is required"))]
    pub name: String,
    /// Messaging number, international format
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

/// Extra charge added on top of base and equipment costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Charge {
    pub label: String,
    pub amount: Decimal,
}

/// Pricing snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceBreakdown {
    pub duration_units: i64,
    /// base rate × duration
    pub subtotal: Decimal,
    /// Σ line rate × quantity
    pub equipment_cost: Decimal,
    pub additional_total: Decimal,
    pub discount: Decimal,
    /// Never negative
    pub total: Decimal,
}

/// Approval or rejection metadata
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Approval {
    pub approved: bool,
    pub decided_by: Option<String>,
    pub decided_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// One returned batch for one line
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnEntry {
    pub equipment_id: Uuid,
    pub quantity: i32,
    pub condition: EquipmentCondition,
    pub returned_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// Reservation record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Reservation {
    pub id: Uuid,
    pub kind: ReservationKind,
    pub status: ReservationStatus,
    /// Booked studio, only for studio bookings
    pub studio_id: Option<Uuid>,
    pub line_items: Vec<LineItem>,
    pub window: TimeWindow,
    pub requester: Requester,
    pub base_rate: Decimal,
    pub additional_charges: Vec<Charge>,
    pub discount: Decimal,
    pub pricing: PriceBreakdown,
    pub approval: Option<Approval>,
    /// When inventory physically left
    pub checked_out_at: Option<DateTime<Utc>>,
    pub return_log: Vec<ReturnEntry>,
    pub returned_at: Option<DateTime<Utc>>,
    pub return_duration_minutes: Option<i64>,
    pub return_notes: Option<String>,
    pub invoice_id: Option<Uuid>,
    pub notes: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Derive `overdue` from the window; returns true when the status changed
    pub fn refresh_overdue(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == ReservationStatus::CheckedOut && self.window.end < now {
            self.status = ReservationStatus::Overdue;
            return true;
        }
        false
    }

    /// Window during which this reservation counts against availability.
    ///
    /// Units still out past the planned end keep their hold open-ended.
    pub fn holding_window(&self, now: DateTime<Utc>) -> TimeWindow {
        if self.status.is_physically_out() && self.window.end < now {
            TimeWindow {
                start: self.window.start,
                end: DateTime::<Utc>::MAX_UTC,
            }
        } else {
            self.window
        }
    }

    /// Units of `equipment_id` this reservation still holds
    pub fn outstanding_for(&self, equipment_id: Uuid) -> i32 {
        self.line_items
            .iter()
            .filter(|line| line.equipment_id == equipment_id)
            .map(LineItem::outstanding)
            .fold(0, i32::saturating_add)
    }

    pub fn equipment_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.line_items.iter().map(|l| l.equipment_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn is_fully_returned(&self) -> bool {
        self.line_items.iter().all(|line| line.outstanding() == 0)
    }

    pub fn is_invoiced(&self) -> bool {
        self.invoice_id.is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LineItemRequest {
    pub equipment_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    /// Overrides the equipment rate table
    pub rate: Option<Decimal>,
}

/// Create reservation request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReservation {
    pub kind: ReservationKind,
    pub studio_id: Option<Uuid>,
    #[serde(default)]
    #[validate(nested)]
    pub line_items: Vec<LineItemRequest>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[validate(nested)]
    pub requester: Requester,
    /// Defaults to the studio hourly rate for studio bookings, zero otherwise
    pub base_rate: Option<Decimal>,
    #[serde(default)]
    pub additional_charges: Vec<Charge>,
    pub discount: Option<Decimal>,
    pub notes: Option<String>,
}

/// Approve or reject a pending checkout
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ApproveReservation {
    pub approved: bool,
    pub notes: Option<String>,
}

/// Move a reservation along its kind's transition table
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateReservationStatus {
    pub status: ReservationStatus,
    pub notes: Option<String>,
}

/// One returned line; quantity defaults to everything outstanding
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ItemReturn {
    pub equipment_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub condition: EquipmentCondition,
}

/// Return request; an empty list returns everything in good condition
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct ReturnItems {
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<ItemReturn>,
    pub notes: Option<String>,
}

/// Amend a reservation that has not been acted on yet
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AmendReservation {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    #[validate(nested)]
    pub line_items: Option<Vec<LineItemRequest>>,
    pub base_rate: Option<Decimal>,
    pub additional_charges: Option<Vec<Charge>>,
    pub discount: Option<Decimal>,
    pub notes: Option<String>,
}

/// Query parameters for listing reservations
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ReservationQuery {
    pub kind: Option<ReservationKind>,
    pub status: Option<ReservationStatus>,
    pub equipment_id: Option<Uuid>,
    pub studio_id: Option<Uuid>,
}

impl ReservationQuery {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        self.kind.map_or(true, |k| reservation.kind == k)
            && self.status.map_or(true, |s| reservation.status == s)
            && self.studio_id.map_or(true, |s| reservation.studio_id == Some(s))
            && self
                .equipment_id
                .map_or(true, |e| reservation.line_items.iter().any(|l| l.equipment_id == e))
    }
}

#[cfg(test)]
pub(crate) fn sample(kind: ReservationKind, line_items: Vec<LineItem>, window: TimeWindow) -> Reservation {
    let now = Utc::now();
    Reservation {
        id: Uuid::new_v4(),
        kind,
        status: kind.initial_status(),
        studio_id: None,
        line_items,
        window,
        requester: Requester {
            name: "Asha".into(),
            phone: Some("+94771234567".into()),
            email: None,
        },
        base_rate: Decimal::ZERO,
        additional_charges: vec![],
        discount: Decimal::ZERO,
        pricing: PriceBreakdown::default(),
        approval: None,
        checked_out_at: None,
        return_log: vec![],
        returned_at: None,
        return_duration_minutes: None,
        return_notes: None,
        invoice_id: None,
        notes: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}
