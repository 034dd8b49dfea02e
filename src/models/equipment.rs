//! Equipment (inventory item) model and its quantity bookkeeping

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::enums::{CheckoutStatus, EquipmentCondition, MovementDirection, ReservationKind};
use crate::error::{AppError, AppResult};

/// Per-usage-context unit rates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RateTable {
    pub studio_rate: Decimal,
    pub event_rate: Decimal,
    pub rental_rate: Decimal,
}

impl RateTable {
    /// Unit rate charged when the item is used by a reservation of `kind`
    pub fn rate_for(&self, kind: ReservationKind) -> Decimal {
        match kind {
            ReservationKind::StudioBooking => self.studio_rate,
            ReservationKind::EventCheckout => self.event_rate,
            ReservationKind::Rental | ReservationKind::EquipmentCheckout => self.rental_rate,
        }
    }
}

/// One maintenance history entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRecord {
    pub performed_at: DateTime<Utc>,
    pub description: String,
    pub cost: Option<Decimal>,
    pub performed_by: Option<String>,
    /// Open records put the item into maintenance
    pub completed: bool,
    /// Condition reported when the work was completed
    pub condition_after: Option<EquipmentCondition>,
}

/// One manual in/out movement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InOutRecord {
    pub recorded_at: DateTime<Utc>,
    pub direction: MovementDirection,
    pub quantity: i32,
    pub person: Option<String>,
    pub notes: Option<String>,
}

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Equipment {
    pub id: Uuid,
    /// Unique human-readable code (asset tag)
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub pricing: RateTable,
    /// Units owned
    pub available_quantity: i32,
    /// Units presently out
    pub current_quantity_out: i32,
    pub checkout_status: CheckoutStatus,
    pub condition: EquipmentCondition,
    pub maintenance_history: Vec<MaintenanceRecord>,
    pub in_out_history: Vec<InOutRecord>,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    pub fn new(data: &CreateEquipment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: data.code.trim().to_string(),
            name: data.name.trim().to_string(),
            category: data.category.clone(),
            pricing: data.pricing.clone().unwrap_or_default(),
            available_quantity: data.available_quantity,
            current_quantity_out: 0,
            checkout_status: CheckoutStatus::Available,
            condition: data.condition.unwrap_or_default(),
            maintenance_history: Vec::new(),
            in_out_history: Vec::new(),
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Units owned and not out right now
    pub fn actual_available_quantity(&self) -> i32 {
        self.available_quantity - self.current_quantity_out
    }

    /// Whether the item may be promised to a new reservation at all
    pub fn is_lendable(&self) -> bool {
        self.is_active
            && !matches!(
                self.checkout_status,
                CheckoutStatus::Maintenance | CheckoutStatus::Damaged | CheckoutStatus::Retired
            )
    }

    /// Add `delta` units to the out counter.
    ///
    /// Fails without touching the record if the result would break
    /// `0 <= current_quantity_out <= available_quantity`.
    pub fn adjust_out(&mut self, delta: i32) -> AppResult<()> {
        let next = self.current_quantity_out.checked_add(delta);
        if next.is_some_and(|n| n < 0) {
            return Err(AppError::InsufficientAvailability(format!(
                "Equipment {} has only {} unit(s) out, cannot take back {}",
                self.code,
                self.current_quantity_out,
                delta.unsigned_abs()
            )));
        }
        let Some(next) = next.filter(|n| *n <= self.available_quantity) else {
            return Err(AppError::InsufficientAvailability(format!(
                "Equipment {} has {} unit(s) available, {} requested",
                self.code,
                self.actual_available_quantity(),
                delta
            )));
        };
        self.current_quantity_out = next;
        self.recompute_status();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Take back units from a returning reservation, flooring the counter at zero.
    /// Returns how many units could not be matched against the counter.
    pub fn release(&mut self, quantity: i32) -> i32 {
        let taken = quantity.min(self.current_quantity_out).max(0);
        self.current_quantity_out -= taken;
        self.recompute_status();
        self.updated_at = Utc::now();
        quantity - taken
    }

    /// Derive the checkout status from the out/owned ratio
    pub fn recompute_status(&mut self) {
        if self.checkout_status.is_admin_held() {
            return;
        }
        self.checkout_status = if self.current_quantity_out <= 0 {
            CheckoutStatus::Available
        } else if self.current_quantity_out >= self.available_quantity {
            if self.available_quantity == 1 {
                CheckoutStatus::CheckedOut
            } else {
                CheckoutStatus::FullyCheckedOut
            }
        } else {
            CheckoutStatus::PartiallyCheckedOut
        };
    }

    /// Record a unit coming back damaged
    pub fn mark_damaged(&mut self) {
        self.checkout_status = CheckoutStatus::Damaged;
        self.condition = EquipmentCondition::Damaged;
        self.updated_at = Utc::now();
    }

    /// Soft delete
    pub fn deactivate(&mut self) -> AppResult<()> {
        if self.current_quantity_out > 0 || self.checkout_status.is_active_out() {
            return Err(AppError::ResourceBusy(format!(
                "Equipment {} has {} unit(s) checked out",
                self.code, self.current_quantity_out
            )));
        }
        self.is_active = false;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn apply_maintenance(&mut self, record: MaintenanceRecord) {
        if record.completed {
            if let Some(condition) = record.condition_after {
                self.condition = condition;
            }
            if matches!(
                self.checkout_status,
                CheckoutStatus::Maintenance | CheckoutStatus::Damaged
            ) {
                self.checkout_status = CheckoutStatus::Available;
            }
            self.recompute_status();
        } else {
            self.checkout_status = CheckoutStatus::Maintenance;
        }
        self.maintenance_history.push(record);
        self.updated_at = Utc::now();
    }

    pub fn apply_movement(&mut self, record: InOutRecord) -> AppResult<()> {
        let delta = match record.direction {
            MovementDirection::Out => record.quantity,
            MovementDirection::In => -record.quantity,
        };
        self.adjust_out(delta)?;
        self.in_out_history.push(record);
        Ok(())
    }

    /// Apply an admin patch; owned units may never drop below units out
    pub fn apply_update(&mut self, data: &UpdateEquipment) -> AppResult<()> {
        if let Some(quantity) = data.available_quantity {
            if quantity < self.current_quantity_out {
                return Err(AppError::InsufficientAvailability(format!(
                    "Equipment {} has {} unit(s) out, cannot own only {}",
                    self.code, self.current_quantity_out, quantity
                )));
            }
            self.available_quantity = quantity;
        }
        if let Some(ref name) = data.name {
            self.name = name.trim().to_string();
        }
        if data.category.is_some() {
            self.category = data.category.clone();
        }
        if let Some(ref pricing) = data.pricing {
            self.pricing = pricing.clone();
        }
        if let Some(condition) = data.condition {
            self.condition = condition;
        }
        match data.checkout_status {
            Some(status @ (CheckoutStatus::Maintenance | CheckoutStatus::Retired | CheckoutStatus::Damaged)) => {
                self.checkout_status = status;
            }
            Some(CheckoutStatus::Available) => {
                // Leaving an admin state; the counters decide the real status
                self.checkout_status = CheckoutStatus::Available;
                self.recompute_status();
            }
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "Status '{}' is derived from the counters and cannot be set directly",
                    other
                )));
            }
            None => self.recompute_status(),
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Create equipment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, max = 64, message = "Code must be 1 to 64 characters"))]
    pub code: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub category: Option<String>,
    pub pricing: Option<RateTable>,
    #[validate(range(min = 1, message = "At least one unit must be owned"))]
    pub available_quantity: i32,
    pub condition: Option<EquipmentCondition>,
}

/// Update equipment request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub category: Option<String>,
    pub pricing: Option<RateTable>,
    #[validate(range(min = 1, message = "At least one unit must be owned"))]
    pub available_quantity: Option<i32>,
    pub condition: Option<EquipmentCondition>,
    /// Only maintenance, damaged, retired or available (to clear them)
    pub checkout_status: Option<CheckoutStatus>,
}

/// Maintenance entry request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMaintenance {
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub cost: Option<Decimal>,
    pub performed_by: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub condition_after: Option<EquipmentCondition>,
}

/// Manual in/out movement request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInOut {
    pub direction: MovementDirection,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub person: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample(code: &str, quantity: i32) -> Equipment {
    Equipment::new(&CreateEquipment {
        code: code.to_string(),
        name: format!("{} unit", code),
        category: Some("camera".to_string()),
        pricing: Some(RateTable {
            studio_rate: Decimal::new(500, 0),
            event_rate: Decimal::new(800, 0),
            rental_rate: Decimal::new(1000, 0),
        }),
        available_quantity: quantity,
        condition: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_out_recomputes_status() {
        let mut item = sample("CAM-01", 5);
        item.adjust_out(3).unwrap();
        assert_eq!(item.current_quantity_out, 3);
        assert_eq!(item.actual_available_quantity(), 2);
        assert_eq!(item.checkout_status, CheckoutStatus::PartiallyCheckedOut);

        item.adjust_out(2).unwrap();
        assert_eq!(item.checkout_status, CheckoutStatus::FullyCheckedOut);

        item.adjust_out(-5).unwrap();
        assert_eq!(item.checkout_status, CheckoutStatus::Available);
    }

    #[test]
    fn single_unit_uses_checked_out() {
        let mut item = sample("MIC-01", 1);
        item.adjust_out(1).unwrap();
        assert_eq!(item.checkout_status, CheckoutStatus::CheckedOut);
    }

    #[test]
    fn adjust_out_never_breaks_bounds() {
        let mut item = sample("CAM-02", 5);
        item.adjust_out(3).unwrap();
        let err = item.adjust_out(3).unwrap_err();
        assert!(matches!(err, AppError::InsufficientAvailability(_)));
        assert_eq!(item.current_quantity_out, 3);

        let err = item.adjust_out(-4).unwrap_err();
        assert!(matches!(err, AppError::InsufficientAvailability(_)));
        assert_eq!(item.current_quantity_out, 3);
    }

    #[test]
    fn adjust_out_refuses_counts_past_the_integer_range() {
        let mut item = sample("CAM-05", 2);
        item.adjust_out(1).unwrap();
        let err = item.adjust_out(i32::MAX).unwrap_err();
        assert!(matches!(err, AppError::InsufficientAvailability(_)));
        assert_eq!(item.current_quantity_out, 1);
        assert_eq!(item.checkout_status, CheckoutStatus::PartiallyCheckedOut);
    }

    #[test]
    fn release_floors_at_zero() {
        let mut item = sample("CAM-03", 2);
        item.adjust_out(1).unwrap();
        assert_eq!(item.release(2), 1);
        assert_eq!(item.current_quantity_out, 0);
    }

    #[test]
    fn maintenance_is_not_overwritten_by_counters() {
        let mut item = sample("LGT-01", 4);
        item.apply_maintenance(MaintenanceRecord {
            performed_at: Utc::now(),
            description: "Replace bulb".into(),
            cost: None,
            performed_by: None,
            completed: false,
            condition_after: None,
        });
        assert_eq!(item.checkout_status, CheckoutStatus::Maintenance);
        assert!(!item.is_lendable());

        item.recompute_status();
        assert_eq!(item.checkout_status, CheckoutStatus::Maintenance);

        item.apply_maintenance(MaintenanceRecord {
            performed_at: Utc::now(),
            description: "Bulb replaced".into(),
            cost: Some(Decimal::new(1200, 0)),
            performed_by: Some("ravi".into()),
            completed: true,
            condition_after: Some(EquipmentCondition::Excellent),
        });
        assert_eq!(item.checkout_status, CheckoutStatus::Available);
        assert_eq!(item.condition, EquipmentCondition::Excellent);
        assert_eq!(item.maintenance_history.len(), 2);
    }

    #[test]
    fn deactivate_refuses_while_out() {
        let mut item = sample("CAM-04", 2);
        item.adjust_out(1).unwrap();
        assert!(matches!(item.deactivate(), Err(AppError::ResourceBusy(_))));
        item.adjust_out(-1).unwrap();
        item.deactivate().unwrap();
        assert!(!item.is_active);
    }

    #[test]
    fn owned_quantity_cannot_drop_below_out() {
        let mut item = sample("CAM-05", 4);
        item.adjust_out(3).unwrap();
        let patch = UpdateEquipment {
            available_quantity: Some(2),
            ..Default::default()
        };
        assert!(item.apply_update(&patch).is_err());
        assert_eq!(item.available_quantity, 4);
    }

    #[test]
    fn rate_table_by_kind() {
        let item = sample("CAM-06", 1);
        assert_eq!(item.pricing.rate_for(ReservationKind::StudioBooking), Decimal::new(500, 0));
        assert_eq!(item.pricing.rate_for(ReservationKind::EventCheckout), Decimal::new(800, 0));
        assert_eq!(item.pricing.rate_for(ReservationKind::Rental), Decimal::new(1000, 0));
    }
}
