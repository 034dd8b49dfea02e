//! In-memory store used for development runs and tests

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Change, ChangeSet, ResourceKey, Store};
use crate::{
    error::{AppError, AppResult},
    models::{
        reservation::ReservationQuery, Equipment, Invoice, Reservation, ReservationStatus, Studio,
        TimeWindow,
    },
};

#[derive(Default)]
struct MemoryState {
    equipment: HashMap<Uuid, Equipment>,
    studios: HashMap<Uuid, Studio>,
    reservations: HashMap<Uuid, Reservation>,
    invoices: HashMap<Uuid, Invoice>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn stale(what: &str, id: Uuid, expected: i64, found: i64) -> AppError {
    AppError::Conflict(format!(
        "{} {} was modified concurrently (read version {}, stored {})",
        what, id, expected, found
    ))
}

impl MemoryState {
    /// Check every change against the current state without applying any
    fn validate(&self, changes: &ChangeSet) -> AppResult<()> {
        let mut codes: HashMap<&str, Uuid> = self
            .equipment
            .values()
            .map(|e| (e.code.as_str(), e.id))
            .collect();
        let mut invoiced: HashMap<Uuid, Uuid> = self
            .invoices
            .values()
            .map(|i| (i.reservation_id, i.id))
            .collect();

        for change in &changes.changes {
            match change {
                Change::InsertEquipment(e) => {
                    if self.equipment.contains_key(&e.id) {
                        return Err(AppError::Conflict(format!("Equipment {} already exists", e.id)));
                    }
                    if codes.insert(e.code.as_str(), e.id).is_some() {
                        return Err(AppError::DuplicateCode(format!(
                            "Equipment code '{}' already exists",
                            e.code
                        )));
                    }
                }
                Change::UpdateEquipment(e) => {
                    let stored = self
                        .equipment
                        .get(&e.id)
                        .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", e.id)))?;
                    if stored.version != e.version {
                        return Err(stale("Equipment", e.id, e.version, stored.version));
                    }
                    if e.current_quantity_out < 0 || e.current_quantity_out > e.available_quantity {
                        return Err(AppError::InsufficientAvailability(format!(
                            "Equipment {} would have {} of {} unit(s) out",
                            e.code, e.current_quantity_out, e.available_quantity
                        )));
                    }
                }
                Change::InsertStudio(s) => {
                    if self.studios.contains_key(&s.id) {
                        return Err(AppError::Conflict(format!("Studio {} already exists", s.id)));
                    }
                    if self.studios.values().any(|other| other.name == s.name) {
                        return Err(AppError::DuplicateCode(format!(
                            "Studio '{}' already exists",
                            s.name
                        )));
                    }
                }
                Change::UpdateStudio(s) => {
                    let stored = self
                        .studios
                        .get(&s.id)
                        .ok_or_else(|| AppError::NotFound(format!("Studio {} not found", s.id)))?;
                    if stored.version != s.version {
                        return Err(stale("Studio", s.id, s.version, stored.version));
                    }
                }
                Change::InsertReservation(r) => {
                    if self.reservations.contains_key(&r.id) {
                        return Err(AppError::Conflict(format!("Reservation {} already exists", r.id)));
                    }
                }
                Change::UpdateReservation(r) => {
                    let stored = self.reservations.get(&r.id).ok_or_else(|| {
                        AppError::NotFound(format!("Reservation {} not found", r.id))
                    })?;
                    if stored.version != r.version {
                        return Err(stale("Reservation", r.id, r.version, stored.version));
                    }
                }
                Change::DeleteReservation { id, version } => {
                    let stored = self.reservations.get(id).ok_or_else(|| {
                        AppError::NotFound(format!("Reservation {} not found", id))
                    })?;
                    if stored.version != *version {
                        return Err(stale("Reservation", *id, *version, stored.version));
                    }
                }
                Change::InsertInvoice(i) => {
                    if invoiced.insert(i.reservation_id, i.id).is_some() {
                        return Err(AppError::Conflict(format!(
                            "Reservation {} already has an invoice",
                            i.reservation_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) {
        for change in changes.changes {
            match change {
                Change::InsertEquipment(mut e) | Change::UpdateEquipment(mut e) => {
                    e.version += 1;
                    self.equipment.insert(e.id, e);
                }
                Change::InsertStudio(mut s) | Change::UpdateStudio(mut s) => {
                    s.version += 1;
                    self.studios.insert(s.id, s);
                }
                Change::InsertReservation(mut r) | Change::UpdateReservation(mut r) => {
                    r.version += 1;
                    self.reservations.insert(r.id, r);
                }
                Change::DeleteReservation { id, .. } => {
                    self.reservations.remove(&id);
                }
                Change::InsertInvoice(i) => {
                    self.invoices.insert(i.id, i);
                }
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn equipment_get(&self, id: Uuid) -> AppResult<Equipment> {
        self.state
            .read()
            .await
            .equipment
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    async fn equipment_list(&self, include_inactive: bool) -> AppResult<Vec<Equipment>> {
        let state = self.state.read().await;
        let mut rows: Vec<Equipment> = state
            .equipment
            .values()
            .filter(|e| include_inactive || e.is_active)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn equipment_find_by_code(&self, code: &str) -> AppResult<Option<Equipment>> {
        let state = self.state.read().await;
        Ok(state.equipment.values().find(|e| e.code == code).cloned())
    }

    async fn studio_get(&self, id: Uuid) -> AppResult<Studio> {
        self.state
            .read()
            .await
            .studios
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Studio {} not found", id)))
    }

    async fn studio_list(&self) -> AppResult<Vec<Studio>> {
        let state = self.state.read().await;
        let mut rows: Vec<Studio> = state.studios.values().cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn studio_find_by_name(&self, name: &str) -> AppResult<Option<Studio>> {
        let state = self.state.read().await;
        Ok(state.studios.values().find(|s| s.name == name).cloned())
    }

    async fn reservation_get(&self, id: Uuid) -> AppResult<Reservation> {
        self.state
            .read()
            .await
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", id)))
    }

    async fn reservation_list(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let state = self.state.read().await;
        let mut rows: Vec<Reservation> = state
            .reservations
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.window.start);
        Ok(rows)
    }

    async fn reservations_holding(
        &self,
        resource: ResourceKey,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Reservation>> {
        let state = self.state.read().await;
        let rows = state
            .reservations
            .values()
            .filter(|r| Some(r.id) != exclude)
            .filter(|r| r.status.holds_inventory())
            .filter(|r| match resource {
                ResourceKey::Studio(id) => r.studio_id == Some(id),
                ResourceKey::Equipment(id) => r.line_items.iter().any(|l| l.equipment_id == id),
            })
            .filter(|r| {
                r.window.start <= window.end
                    && (r.window.end >= window.start
                        || matches!(
                            r.status,
                            ReservationStatus::CheckedOut
                                | ReservationStatus::Overdue
                                | ReservationStatus::PartiallyReturned
                        ))
            })
            .cloned()
            .collect();
        Ok(rows)
    }

    async fn invoice_get_by_reservation(&self, reservation_id: Uuid) -> AppResult<Option<Invoice>> {
        let state = self.state.read().await;
        Ok(state
            .invoices
            .values()
            .find(|i| i.reservation_id == reservation_id)
            .cloned())
    }

    async fn commit(&self, changes: ChangeSet) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.validate(&changes)?;
        state.apply(changes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::equipment::sample;

    #[tokio::test]
    async fn commit_bumps_version() {
        let store = MemoryStore::new();
        let item = sample("CAM-01", 3);
        let id = item.id;
        store
            .commit(ChangeSet { changes: vec![Change::InsertEquipment(item)] })
            .await
            .unwrap();

        let stored = store.equipment_get(id).await.unwrap();
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn stale_update_is_rejected_and_nothing_applied() {
        let store = MemoryStore::new();
        let item = sample("CAM-01", 3);
        let other = sample("CAM-02", 3);
        let (id, other_id) = (item.id, other.id);
        store
            .commit(ChangeSet {
                changes: vec![Change::InsertEquipment(item), Change::InsertEquipment(other)],
            })
            .await
            .unwrap();

        let mut first = store.equipment_get(id).await.unwrap();
        let mut second = first.clone();
        first.adjust_out(2).unwrap();
        store
            .commit(ChangeSet { changes: vec![Change::UpdateEquipment(first)] })
            .await
            .unwrap();

        let mut untouched = store.equipment_get(other_id).await.unwrap();
        untouched.adjust_out(1).unwrap();
        second.adjust_out(2).unwrap();
        let err = store
            .commit(ChangeSet {
                changes: vec![Change::UpdateEquipment(untouched), Change::UpdateEquipment(second)],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        assert_eq!(store.equipment_get(id).await.unwrap().current_quantity_out, 2);
        assert_eq!(store.equipment_get(other_id).await.unwrap().current_quantity_out, 0);
    }

    #[tokio::test]
    async fn duplicate_code_is_rejected() {
        let store = MemoryStore::new();
        store
            .commit(ChangeSet { changes: vec![Change::InsertEquipment(sample("CAM-01", 1))] })
            .await
            .unwrap();
        let err = store
            .commit(ChangeSet { changes: vec![Change::InsertEquipment(sample("CAM-01", 2))] })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateCode(_)));
    }
}
