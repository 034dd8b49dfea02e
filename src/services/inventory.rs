//! Inventory store: equipment and studio administration

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{
            CreateEquipment, CreateInOut, CreateMaintenance, InOutRecord, MaintenanceRecord,
            UpdateEquipment,
        },
        reservation::ReservationQuery,
        studio::CreateStudio,
        Equipment, Studio,
    },
    repository::{Change, ChangeSet, Repository},
    services::with_retry,
};

#[derive(Clone)]
pub struct InventoryService {
    repository: Repository,
    max_retries: u32,
}

impl InventoryService {
    pub fn new(repository: Repository, max_retries: u32) -> Self {
        Self {
            repository,
            max_retries,
        }
    }

    /// Register a new equipment item
    pub async fn create_item(&self, data: CreateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        if let Some(ref pricing) = data.pricing {
            if pricing.studio_rate.is_sign_negative()
                || pricing.event_rate.is_sign_negative()
                || pricing.rental_rate.is_sign_negative()
            {
                return Err(AppError::Validation("Rates cannot be negative".to_string()));
            }
        }

        let code = data.code.trim();
        if self.repository.equipment_find_by_code(code).await?.is_some() {
            return Err(AppError::DuplicateCode(format!(
                "Equipment code '{}' already exists",
                code
            )));
        }

        let item = Equipment::new(&data);
        let id = item.id;
        let mut changes = ChangeSet::new();
        changes.push(Change::InsertEquipment(item));
        self.repository.commit(changes).await?;

        tracing::info!(equipment = %id, code, "Equipment created");
        self.repository.equipment_get(id).await
    }

    pub async fn get_item(&self, id: Uuid) -> AppResult<Equipment> {
        self.repository.equipment_get(id).await
    }

    pub async fn list_items(&self, include_inactive: bool) -> AppResult<Vec<Equipment>> {
        self.repository.equipment_list(include_inactive).await
    }

    /// Admin edit of an item
    pub async fn update_item(&self, id: Uuid, data: UpdateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        with_retry(self.max_retries, "update_item", || async {
            let mut item = self.repository.equipment_get(id).await?;
            item.apply_update(&data)?;
            let mut changes = ChangeSet::new();
            changes.push(Change::UpdateEquipment(item));
            self.repository.commit(changes).await
        })
        .await?;
        self.repository.equipment_get(id).await
    }

    /// Soft delete; refused while units are out or reservations still hold the item
    pub async fn deactivate(&self, id: Uuid) -> AppResult<Equipment> {
        with_retry(self.max_retries, "deactivate", || async {
            let mut item = self.repository.equipment_get(id).await?;
            if !item.is_active {
                return Ok(());
            }
            item.deactivate()?;

            let query = ReservationQuery {
                equipment_id: Some(id),
                ..Default::default()
            };
            let holding = self
                .repository
                .reservation_list(&query)
                .await?
                .into_iter()
                .filter(|r| r.status.holds_inventory())
                .count();
            if holding > 0 {
                return Err(AppError::ResourceBusy(format!(
                    "Equipment {} is held by {} reservation(s)",
                    item.code, holding
                )));
            }

            let mut changes = ChangeSet::new();
            changes.push(Change::UpdateEquipment(item));
            self.repository.commit(changes).await
        })
        .await?;

        tracing::info!(equipment = %id, "Equipment deactivated");
        self.repository.equipment_get(id).await
    }

    /// Append a maintenance entry; an open entry takes the item out of service
    pub async fn record_maintenance(
        &self,
        id: Uuid,
        data: CreateMaintenance,
        actor: Option<&str>,
    ) -> AppResult<Equipment> {
        data.validate()?;
        with_retry(self.max_retries, "record_maintenance", || async {
            let mut item = self.repository.equipment_get(id).await?;
            item.apply_maintenance(MaintenanceRecord {
                performed_at: Utc::now(),
                description: data.description.clone(),
                cost: data.cost,
                performed_by: data.performed_by.clone().or_else(|| actor.map(str::to_string)),
                completed: data.completed,
                condition_after: data.condition_after,
            });
            let mut changes = ChangeSet::new();
            changes.push(Change::UpdateEquipment(item));
            self.repository.commit(changes).await
        })
        .await?;

        tracing::info!(equipment = %id, completed = data.completed, "Maintenance recorded");
        self.repository.equipment_get(id).await
    }

    /// Manual movement outside any reservation
    pub async fn record_in_out(
        &self,
        id: Uuid,
        data: CreateInOut,
        actor: Option<&str>,
    ) -> AppResult<Equipment> {
        data.validate()?;
        with_retry(self.max_retries, "record_in_out", || async {
            let mut item = self.repository.equipment_get(id).await?;
            item.apply_movement(InOutRecord {
                recorded_at: Utc::now(),
                direction: data.direction,
                quantity: data.quantity,
                person: data.person.clone().or_else(|| actor.map(str::to_string)),
                notes: data.notes.clone(),
            })?;
            let mut changes = ChangeSet::new();
            changes.push(Change::UpdateEquipment(item));
            self.repository.commit(changes).await
        })
        .await?;

        tracing::info!(equipment = %id, direction = %data.direction, quantity = data.quantity, "Movement recorded");
        self.repository.equipment_get(id).await
    }

    pub async fn create_studio(&self, data: CreateStudio) -> AppResult<Studio> {
        data.validate()?;
        if data.hourly_rate.is_sign_negative() {
            return Err(AppError::Validation("Hourly rate cannot be negative".to_string()));
        }
        let name = data.name.trim();
        if self.repository.studio_find_by_name(name).await?.is_some() {
            return Err(AppError::DuplicateCode(format!("Studio '{}' already exists", name)));
        }

        let studio = Studio::new(&data);
        let id = studio.id;
        let mut changes = ChangeSet::new();
        changes.push(Change::InsertStudio(studio));
        self.repository.commit(changes).await?;

        tracing::info!(studio = %id, name, "Studio created");
        self.repository.studio_get(id).await
    }

    pub async fn list_studios(&self) -> AppResult<Vec<Studio>> {
        self.repository.studio_list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{CheckoutStatus, EquipmentCondition, MovementDirection, RateTable},
        repository::memory::MemoryStore,
    };
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn service() -> InventoryService {
        InventoryService::new(Arc::new(MemoryStore::new()), 3)
    }

    fn camera(code: &str, quantity: i32) -> CreateEquipment {
        CreateEquipment {
            code: code.to_string(),
            name: "Sony FX3".to_string(),
            category: Some("camera".to_string()),
            pricing: Some(RateTable {
                studio_rate: Decimal::from(500),
                event_rate: Decimal::from(800),
                rental_rate: Decimal::from(1000),
            }),
            available_quantity: quantity,
            condition: None,
        }
    }

    #[tokio::test]
    async fn duplicate_code_is_refused() {
        let inventory = service();
        inventory.create_item(camera("CAM-01", 2)).await.unwrap();
        let err = inventory.create_item(camera(" CAM-01 ", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateCode(_)));
    }

    #[tokio::test]
    async fn movements_respect_the_counter_bounds() {
        let inventory = service();
        let item = inventory.create_item(camera("CAM-02", 3)).await.unwrap();

        let out = CreateInOut {
            direction: MovementDirection::Out,
            quantity: 2,
            person: None,
            notes: Some("Client demo".into()),
        };
        let item = inventory.record_in_out(item.id, out, Some("ravi")).await.unwrap();
        assert_eq!(item.current_quantity_out, 2);
        assert_eq!(item.checkout_status, CheckoutStatus::PartiallyCheckedOut);
        assert_eq!(item.in_out_history[0].person.as_deref(), Some("ravi"));

        let too_many = CreateInOut {
            direction: MovementDirection::Out,
            quantity: 2,
            person: None,
            notes: None,
        };
        let err = inventory.record_in_out(item.id, too_many, None).await.unwrap_err();
        assert!(matches!(err, AppError::InsufficientAvailability(_)));
        assert_eq!(inventory.get_item(item.id).await.unwrap().current_quantity_out, 2);
    }

    #[tokio::test]
    async fn open_maintenance_blocks_then_completion_restores() {
        let inventory = service();
        let item = inventory.create_item(camera("CAM-03", 1)).await.unwrap();
        let open = CreateMaintenance {
            description: "Sensor cleaning".into(),
            cost: None,
            performed_by: None,
            completed: false,
            condition_after: None,
        };
        let item = inventory.record_maintenance(item.id, open, None).await.unwrap();
        assert_eq!(item.checkout_status, CheckoutStatus::Maintenance);

        let done = CreateMaintenance {
            description: "Sensor cleaned".into(),
            cost: Some(Decimal::from(1500)),
            performed_by: Some("tech".into()),
            completed: true,
            condition_after: Some(EquipmentCondition::Excellent),
        };
        let item = inventory.record_maintenance(item.id, done, None).await.unwrap();
        assert_eq!(item.checkout_status, CheckoutStatus::Available);
        assert_eq!(item.condition, EquipmentCondition::Excellent);
    }

    #[tokio::test]
    async fn deactivate_refuses_items_out() {
        let inventory = service();
        let item = inventory.create_item(camera("CAM-04", 2)).await.unwrap();
        let out = CreateInOut {
            direction: MovementDirection::Out,
            quantity: 1,
            person: None,
            notes: None,
        };
        inventory.record_in_out(item.id, out, None).await.unwrap();
        assert!(matches!(
            inventory.deactivate(item.id).await,
            Err(AppError::ResourceBusy(_))
        ));

        let back = CreateInOut {
            direction: MovementDirection::In,
            quantity: 1,
            person: None,
            notes: None,
        };
        assert_ok!(inventory.record_in_out(item.id, back, None).await);
        let item = assert_ok!(inventory.deactivate(item.id).await);
        assert!(!item.is_active);
        assert!(inventory.list_items(false).await.unwrap().is_empty());
        assert_eq!(inventory.list_items(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn studio_names_are_unique() {
        let inventory = service();
        let studio = CreateStudio {
            name: "Studio A".into(),
            hourly_rate: Decimal::from(2500),
        };
        inventory.create_studio(studio).await.unwrap();
        let again = CreateStudio {
            name: "Studio A".into(),
            hourly_rate: Decimal::from(2000),
        };
        assert!(matches!(
            inventory.create_studio(again).await,
            Err(AppError::DuplicateCode(_))
        ));
        assert_eq!(inventory.list_studios().await.unwrap().len(), 1);
    }
}
