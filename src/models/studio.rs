//! Studio model (exclusive, single-occupancy resource)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Studio record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Studio {
    pub id: Uuid,
    pub name: String,
    /// Base rate per started hour
    pub hourly_rate: Decimal,
    pub is_active: bool,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Studio {
    pub fn new(data: &CreateStudio) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: data.name.trim().to_string(),
            hourly_rate: data.hourly_rate,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create studio request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStudio {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub hourly_rate: Decimal,
}
