//! Repository layer for persistence
//!
//! Reads are plain lookups. Every write goes through [`Store::commit`],
//! which applies a whole [`ChangeSet`] atomically and refuses it if any
//! record changed since it was read (optimistic `version` check).

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        reservation::ReservationQuery, Equipment, Invoice, Reservation, Studio, TimeWindow,
    },
};

/// A resource reservations compete for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Equipment(Uuid),
    Studio(Uuid),
}

/// One write inside a change set.
///
/// Updates carry the version that was read; the store writes `version + 1`.
#[derive(Debug, Clone)]
pub enum Change {
    InsertEquipment(Equipment),
    UpdateEquipment(Equipment),
    InsertStudio(Studio),
    UpdateStudio(Studio),
    InsertReservation(Reservation),
    UpdateReservation(Reservation),
    DeleteReservation { id: Uuid, version: i64 },
    InsertInvoice(Invoice),
}

/// Writes committed as one unit
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    async fn equipment_get(&self, id: Uuid) -> AppResult<Equipment>;
    async fn equipment_list(&self, include_inactive: bool) -> AppResult<Vec<Equipment>>;
    async fn equipment_find_by_code(&self, code: &str) -> AppResult<Option<Equipment>>;

    async fn studio_get(&self, id: Uuid) -> AppResult<Studio>;
    async fn studio_list(&self) -> AppResult<Vec<Studio>>;
    async fn studio_find_by_name(&self, name: &str) -> AppResult<Option<Studio>>;

    async fn reservation_get(&self, id: Uuid) -> AppResult<Reservation>;
    async fn reservation_list(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>>;

    /// Reservations in a holding status that reference `resource` and may
    /// overlap `window`. Physically-out reservations past their end are
    /// always returned since their hold extends until the return.
    async fn reservations_holding(
        &self,
        resource: ResourceKey,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Reservation>>;

    async fn invoice_get_by_reservation(&self, reservation_id: Uuid) -> AppResult<Option<Invoice>>;

    /// Apply every change or none.
    ///
    /// Fails with `Conflict` on a stale version or a second invoice for the
    /// same reservation, and with `DuplicateCode` on a reused equipment code.
    async fn commit(&self, changes: ChangeSet) -> AppResult<()>;
}

/// Shared handle every service holds
pub type Repository = Arc<dyn Store>;
