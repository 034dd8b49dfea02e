//! Pricing calculator

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::{Charge, LineItemRequest},
        LineItem, PriceBreakdown, ReservationKind, TimeWindow,
    },
    repository::Repository,
};

/// Largest amount a NUMERIC(12, 2) column holds
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

fn overflow(what: &str) -> AppError {
    AppError::Validation(format!("{} exceeds the largest supported amount", what))
}

fn bounded(amount: Decimal, what: &str) -> AppResult<Decimal> {
    if amount > MAX_AMOUNT {
        return Err(overflow(what));
    }
    Ok(amount)
}

/// `max(0, base_rate × duration + Σ rate × qty + Σ charges − discount)`
///
/// Every intermediate amount must fit a stored price, anything larger is
/// a `Validation` error.
pub fn compute_total(
    base_rate: Decimal,
    duration_units: i64,
    line_items: &[LineItem],
    additional_charges: &[Charge],
    discount: Decimal,
) -> AppResult<PriceBreakdown> {
    let subtotal = base_rate
        .checked_mul(Decimal::from(duration_units))
        .ok_or_else(|| overflow("Base charge"))
        .and_then(|v| bounded(v, "Base charge"))?;

    let mut equipment_cost = Decimal::ZERO;
    for line in line_items {
        let cost = line
            .rate
            .checked_mul(Decimal::from(line.quantity))
            .ok_or_else(|| overflow("Equipment cost"))?;
        equipment_cost = equipment_cost
            .checked_add(cost)
            .ok_or_else(|| overflow("Equipment cost"))
            .and_then(|v| bounded(v, "Equipment cost"))?;
    }

    let mut additional_total = Decimal::ZERO;
    for charge in additional_charges {
        additional_total = additional_total
            .checked_add(charge.amount)
            .ok_or_else(|| overflow("Additional charges"))
            .and_then(|v| bounded(v, "Additional charges"))?;
    }

    let discount = bounded(discount, "Discount")?;
    let gross = subtotal
        .checked_add(equipment_cost)
        .and_then(|v| v.checked_add(additional_total))
        .ok_or_else(|| overflow("Total"))
        .and_then(|v| bounded(v, "Total"))?;
    let total = (gross - discount).max(Decimal::ZERO);

    Ok(PriceBreakdown {
        duration_units,
        subtotal,
        equipment_cost,
        additional_total,
        discount,
        total,
    })
}

/// Two-decimal display used in messages and documents
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Billing unit for a kind: started hours for studios, started days otherwise
pub fn duration_units(kind: ReservationKind, window: &TimeWindow) -> i64 {
    match kind {
        ReservationKind::StudioBooking => window.billable_hours(),
        _ => window.billable_days(),
    }
}

/// Price estimate request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PriceEstimateRequest {
    pub kind: ReservationKind,
    pub studio_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    #[validate(nested)]
    pub line_items: Vec<LineItemRequest>,
    pub base_rate: Option<Decimal>,
    #[serde(default)]
    pub additional_charges: Vec<Charge>,
    pub discount: Option<Decimal>,
}

#[derive(Clone)]
pub struct PricingService {
    repository: Repository,
}

impl PricingService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Snapshot the unit rate of each requested line from the equipment rate table
    pub async fn price_lines(
        &self,
        kind: ReservationKind,
        requested: &[LineItemRequest],
    ) -> AppResult<Vec<LineItem>> {
        let mut lines = Vec::with_capacity(requested.len());
        for request in requested {
            let rate = match request.rate {
                Some(rate) => rate,
                None => {
                    let equipment = self.repository.equipment_get(request.equipment_id).await?;
                    equipment.pricing.rate_for(kind)
                }
            };
            if rate < Decimal::ZERO {
                return Err(AppError::Validation("Rates cannot be negative".to_string()));
            }
            lines.push(LineItem {
                equipment_id: request.equipment_id,
                quantity: request.quantity,
                rate,
                returned_quantity: 0,
            });
        }
        Ok(lines)
    }

    /// Base rate: explicit value, else the studio hourly rate, else zero
    pub async fn base_rate(
        &self,
        kind: ReservationKind,
        studio_id: Option<Uuid>,
        explicit: Option<Decimal>,
    ) -> AppResult<Decimal> {
        if let Some(rate) = explicit {
            return Ok(rate);
        }
        match (kind, studio_id) {
            (ReservationKind::StudioBooking, Some(id)) => {
                Ok(self.repository.studio_get(id).await?.hourly_rate)
            }
            _ => Ok(Decimal::ZERO),
        }
    }

    pub async fn estimate(&self, request: &PriceEstimateRequest) -> AppResult<PriceBreakdown> {
        request.validate()?;
        let window = TimeWindow::new(request.start, request.end)?;
        let lines = self.price_lines(request.kind, &request.line_items).await?;
        let base_rate = self
            .base_rate(request.kind, request.studio_id, request.base_rate)
            .await?;

        compute_total(
            base_rate,
            duration_units(request.kind, &window),
            &lines,
            &request.additional_charges,
            request.discount.unwrap_or(Decimal::ZERO),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn line(rate: i64, quantity: i32) -> LineItem {
        LineItem {
            equipment_id: Uuid::new_v4(),
            quantity,
            rate: Decimal::from(rate),
            returned_quantity: 0,
        }
    }

    fn charge(amount: i64) -> Charge {
        Charge {
            label: "transport".into(),
            amount: Decimal::from(amount),
        }
    }

    #[test]
    fn total_combines_every_component() {
        let price = compute_total(
            Decimal::from(100),
            3,
            &[line(50, 2)],
            &[charge(20)],
            Decimal::from(30),
        )
        .unwrap();
        assert_eq!(price.subtotal, Decimal::from(300));
        assert_eq!(price.equipment_cost, Decimal::from(100));
        assert_eq!(price.additional_total, Decimal::from(20));
        assert_eq!(price.total, Decimal::from(390));
    }

    #[test]
    fn oversized_discount_clamps_to_zero() {
        let price = compute_total(Decimal::from(10), 1, &[], &[], Decimal::from(500)).unwrap();
        assert_eq!(price.total, Decimal::ZERO);
    }

    #[test]
    fn amounts_beyond_storage_are_rejected() {
        let huge = LineItem {
            rate: Decimal::MAX,
            ..line(0, 2)
        };
        assert!(matches!(
            compute_total(Decimal::ZERO, 1, &[huge], &[], Decimal::ZERO),
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            compute_total(Decimal::MAX, 3, &[], &[], Decimal::ZERO),
            Err(AppError::Validation(_))
        ));

        let charges = [charge(6_000_000_000), charge(6_000_000_000)];
        assert!(matches!(
            compute_total(Decimal::ZERO, 1, &[], &charges, Decimal::ZERO),
            Err(AppError::Validation(_))
        ));

        let at_limit = compute_total(MAX_AMOUNT, 1, &[], &[], Decimal::ZERO).unwrap();
        assert_eq!(at_limit.total, MAX_AMOUNT);
    }

    #[test]
    fn amounts_display_with_two_decimals() {
        assert_eq!(format_amount(Decimal::new(3905, 1)), "390.50");
        assert_eq!(format_amount(Decimal::from(12)), "12.00");
    }

    #[test]
    fn studio_bills_hours_others_bill_days() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap();
        let window = TimeWindow::new(start, end).unwrap();
        assert_eq!(duration_units(ReservationKind::StudioBooking, &window), 3);
        assert_eq!(duration_units(ReservationKind::Rental, &window), 1);
    }
}
