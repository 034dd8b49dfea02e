//! Availability checker
//!
//! Studios are exclusive: any overlapping holding reservation blocks the
//! window. Equipment is pooled: overlapping reservations are fine as long
//! as the peak concurrent demand inside the window, plus the request,
//! stays within the units owned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Equipment, Reservation, Studio, TimeWindow},
    repository::{Repository, ResourceKey},
};

/// Conflict semantics of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityPolicy {
    Exclusive,
    Pooled,
}

impl ResourceKey {
    pub fn policy(&self) -> AvailabilityPolicy {
        match self {
            ResourceKey::Studio(_) => AvailabilityPolicy::Exclusive,
            ResourceKey::Equipment(_) => AvailabilityPolicy::Pooled,
        }
    }
}

/// Peak number of units of `equipment_id` held at any instant of `window`
pub fn peak_demand(
    reservations: &[Reservation],
    equipment_id: Uuid,
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> i32 {
    let intervals: Vec<(TimeWindow, i32)> = reservations
        .iter()
        .filter(|r| r.status.holds_inventory())
        .filter_map(|r| {
            let held = r.holding_window(now);
            let quantity = r.outstanding_for(equipment_id);
            if quantity == 0 || !held.overlaps(window) {
                return None;
            }
            let clipped = TimeWindow {
                start: held.start.max(window.start),
                end: held.end.min(window.end),
            };
            Some((clipped, quantity))
        })
        .collect();

    // With closed intervals the maximum is reached at one of the starts
    intervals
        .iter()
        .map(|(at, _)| {
            intervals
                .iter()
                .filter(|(w, _)| w.contains(at.start))
                .fold(0i32, |total, (_, q)| total.saturating_add(*q))
        })
        .max()
        .unwrap_or(0)
}

/// Holding reservations whose window touches `window`
pub fn overlapping(
    reservations: &[Reservation],
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> Vec<Uuid> {
    reservations
        .iter()
        .filter(|r| r.status.holds_inventory())
        .filter(|r| r.holding_window(now).overlaps(window))
        .map(|r| r.id)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Equipment,
    Studio,
}

/// Query parameters for an availability check
#[derive(Debug, Clone, Deserialize, IntoParams, ToSchema)]
pub struct AvailabilityQuery {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Units wanted (equipment only, defaults to 1)
    pub quantity: Option<i32>,
    /// Reservation to leave out, when re-checking an existing one
    pub exclude_reservation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvailabilityReport {
    pub available: bool,
    pub policy: AvailabilityPolicy,
    pub requested_quantity: i32,
    /// Units owned (equipment only)
    pub capacity: Option<i32>,
    /// Peak units already promised inside the window (equipment only)
    pub committed: Option<i32>,
    pub conflicting_reservations: Vec<Uuid>,
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct AvailabilityService {
    repository: Repository,
}

impl AvailabilityService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Answer an availability query without reserving anything
    pub async fn check(&self, query: &AvailabilityQuery) -> AppResult<AvailabilityReport> {
        let window = TimeWindow::new(query.start, query.end)?;
        let exclude = query.exclude_reservation_id;
        match query.resource_type {
            ResourceType::Equipment => {
                let quantity = query.quantity.unwrap_or(1);
                if quantity < 1 {
                    return Err(AppError::Validation("Quantity must be positive".to_string()));
                }
                let equipment = self.repository.equipment_get(query.resource_id).await?;
                self.equipment_report(&equipment, quantity, &window, exclude).await
            }
            ResourceType::Studio => {
                let studio = self.repository.studio_get(query.resource_id).await?;
                self.studio_report(&studio, &window, exclude).await
            }
        }
    }

    pub async fn equipment_report(
        &self,
        equipment: &Equipment,
        quantity: i32,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<AvailabilityReport> {
        let key = ResourceKey::Equipment(equipment.id);
        let holding = self
            .repository
            .reservations_holding(key, window, exclude)
            .await?;
        let now = Utc::now();
        let committed = peak_demand(&holding, equipment.id, window, now);

        let reason = if !equipment.is_lendable() {
            Some(format!(
                "Equipment {} is {} and cannot be reserved",
                equipment.code,
                if equipment.is_active {
                    equipment.checkout_status.as_str()
                } else {
                    "inactive"
                }
            ))
        } else if quantity > equipment.available_quantity {
            Some(format!(
                "Equipment {} owns {} unit(s), {} requested",
                equipment.code, equipment.available_quantity, quantity
            ))
        } else if committed
            .checked_add(quantity)
            .map_or(true, |total| total > equipment.available_quantity)
        {
            Some(format!(
                "Equipment {}: {} of {} unit(s) already promised in the window, {} requested",
                equipment.code, committed, equipment.available_quantity, quantity
            ))
        } else {
            None
        };

        Ok(AvailabilityReport {
            available: reason.is_none(),
            policy: key.policy(),
            requested_quantity: quantity,
            capacity: Some(equipment.available_quantity),
            committed: Some(committed),
            conflicting_reservations: overlapping(&holding, window, now),
            reason,
        })
    }

    pub async fn studio_report(
        &self,
        studio: &Studio,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<AvailabilityReport> {
        let key = ResourceKey::Studio(studio.id);
        let holding = self
            .repository
            .reservations_holding(key, window, exclude)
            .await?;
        let conflicts = overlapping(&holding, window, Utc::now());

        let reason = if !studio.is_active {
            Some(format!("Studio {} is inactive", studio.name))
        } else if !conflicts.is_empty() {
            Some(format!(
                "Studio {} is already booked in the requested window",
                studio.name
            ))
        } else {
            None
        };

        Ok(AvailabilityReport {
            available: reason.is_none(),
            policy: key.policy(),
            requested_quantity: 1,
            capacity: None,
            committed: None,
            conflicting_reservations: conflicts,
            reason,
        })
    }

    /// Fail with `InsufficientAvailability` unless `quantity` units fit the window
    pub async fn ensure_equipment(
        &self,
        equipment: &Equipment,
        quantity: i32,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<()> {
        let report = self
            .equipment_report(equipment, quantity, window, exclude)
            .await?;
        match report.reason {
            None => Ok(()),
            Some(reason) => Err(AppError::InsufficientAvailability(reason)),
        }
    }

    /// Fail with `SlotUnavailable` unless the studio is free for the whole window
    pub async fn ensure_studio(
        &self,
        studio: &Studio,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<()> {
        let report = self.studio_report(studio, window, exclude).await?;
        match report.reason {
            None => Ok(()),
            Some(reason) => Err(AppError::SlotUnavailable(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{reservation::sample, LineItem, ReservationKind, ReservationStatus};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 6, day, hour, 0, 0).unwrap()
    }

    fn holding(equipment_id: Uuid, quantity: i32, start: DateTime<Utc>, end: DateTime<Utc>) -> Reservation {
        let line = LineItem {
            equipment_id,
            quantity,
            rate: Decimal::ZERO,
            returned_quantity: 0,
        };
        let mut reservation = sample(ReservationKind::Rental, vec![line], TimeWindow { start, end });
        reservation.status = ReservationStatus::Confirmed;
        reservation
    }

    #[test]
    fn peak_counts_only_concurrent_demand() {
        let id = Uuid::new_v4();
        let reservations = vec![
            holding(id, 2, at(1, 9), at(1, 12)),
            holding(id, 2, at(1, 13), at(1, 17)),
            holding(id, 1, at(1, 11), at(1, 14)),
        ];
        let window = TimeWindow::new(at(1, 8), at(1, 18)).unwrap();
        // 9-12 and 11-14 overlap (3 units), 11-14 and 13-17 overlap (3 units)
        assert_eq!(peak_demand(&reservations, id, &window, at(1, 0)), 3);

        let morning = TimeWindow::new(at(1, 8), at(1, 10)).unwrap();
        assert_eq!(peak_demand(&reservations, id, &morning, at(1, 0)), 2);
    }

    #[test]
    fn peak_ignores_other_equipment_and_returned_units() {
        let id = Uuid::new_v4();
        let mut partly_back = holding(id, 3, at(2, 9), at(2, 18));
        partly_back.status = ReservationStatus::PartiallyReturned;
        partly_back.line_items[0].returned_quantity = 2;
        let other = holding(Uuid::new_v4(), 5, at(2, 9), at(2, 18));
        let window = TimeWindow::new(at(2, 10), at(2, 11)).unwrap();
        assert_eq!(peak_demand(&[partly_back, other], id, &window, at(2, 0)), 1);
    }

    #[test]
    fn overdue_units_hold_past_their_end() {
        let id = Uuid::new_v4();
        let mut late = holding(id, 2, at(1, 9), at(1, 12));
        late.status = ReservationStatus::Overdue;
        let next_week = TimeWindow::new(at(8, 9), at(8, 12)).unwrap();
        assert_eq!(peak_demand(&[late.clone()], id, &next_week, at(3, 0)), 2);

        late.status = ReservationStatus::Confirmed;
        assert_eq!(peak_demand(&[late], id, &next_week, at(3, 0)), 0);
    }

    #[test]
    fn peak_saturates_instead_of_wrapping() {
        let id = Uuid::new_v4();
        let reservations = vec![
            holding(id, i32::MAX, at(1, 9), at(1, 12)),
            holding(id, 5, at(1, 10), at(1, 11)),
        ];
        let window = TimeWindow::new(at(1, 8), at(1, 18)).unwrap();
        assert_eq!(peak_demand(&reservations, id, &window, at(1, 0)), i32::MAX);
    }

    #[test]
    fn overlapping_lists_touching_windows() {
        let id = Uuid::new_v4();
        let booked = holding(id, 1, at(1, 11), at(1, 13));
        let window = TimeWindow::new(at(1, 10), at(1, 12)).unwrap();
        assert_eq!(overlapping(&[booked.clone()], &window, at(1, 0)), vec![booked.id]);

        let later = TimeWindow::new(at(1, 13) + Duration::minutes(1), at(1, 15)).unwrap();
        assert!(overlapping(&[booked], &later, at(1, 0)).is_empty());
    }
}
