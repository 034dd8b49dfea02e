//! API handlers for the D4 Media REST endpoints

pub mod availability;
pub mod equipment;
pub mod health;
pub mod openapi;
pub mod pricing;
pub mod reservations;
pub mod studios;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, AppState};

/// Header naming the staff member behind a request
pub const ACTOR_HEADER: &str = "x-actor";

/// Extractor for the optional acting staff member.
///
/// Authentication happens upstream; this only carries the name into
/// approval and history metadata.
pub struct Actor(pub Option<String>);

impl Actor {
    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor(None));
        };
        let name = value
            .to_str()
            .map_err(|_| AppError::Validation("X-Actor header must be plain text".to_string()))?
            .trim();
        Ok(Actor((!name.is_empty()).then(|| name.to_string())))
    }
}
