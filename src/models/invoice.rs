//! Invoice model (only what the auto-invoice trigger needs)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Invoice generated from a reservation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub reservation_id: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}
