//! Postgres store
//!
//! Nested lists (line items, histories, charges) live in JSONB columns.
//! A change set runs inside one transaction; every update is guarded by
//! `WHERE version = $n` so a concurrent writer makes the whole set roll back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, FromRow, Pool, Postgres, Transaction};
use uuid::Uuid;

use super::{Change, ChangeSet, ResourceKey, Store};
use crate::{
    error::{AppError, AppResult},
    models::{
        equipment::{InOutRecord, MaintenanceRecord},
        reservation::{
            Approval, Charge, LineItem, PriceBreakdown, Requester, ReservationQuery, ReturnEntry,
        },
        Equipment, Invoice, RateTable, Reservation, ReservationStatus, Studio, TimeWindow,
    },
};

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(FromRow)]
struct EquipmentRow {
    id: Uuid,
    code: String,
    name: String,
    category: Option<String>,
    pricing: Json<RateTable>,
    available_quantity: i32,
    current_quantity_out: i32,
    checkout_status: String,
    condition: String,
    maintenance_history: Json<Vec<MaintenanceRecord>>,
    in_out_history: Json<Vec<InOutRecord>>,
    is_active: bool,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EquipmentRow> for Equipment {
    type Error = AppError;

    fn try_from(row: EquipmentRow) -> AppResult<Self> {
        Ok(Equipment {
            id: row.id,
            code: row.code,
            name: row.name,
            category: row.category,
            pricing: row.pricing.0,
            available_quantity: row.available_quantity,
            current_quantity_out: row.current_quantity_out,
            checkout_status: row.checkout_status.parse()?,
            condition: row.condition.parse()?,
            maintenance_history: row.maintenance_history.0,
            in_out_history: row.in_out_history.0,
            is_active: row.is_active,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ReservationRow {
    id: Uuid,
    kind: String,
    status: String,
    studio_id: Option<Uuid>,
    line_items: Json<Vec<LineItem>>,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    requester: Json<Requester>,
    base_rate: Decimal,
    additional_charges: Json<Vec<Charge>>,
    discount: Decimal,
    pricing: Json<PriceBreakdown>,
    approval: Option<Json<Approval>>,
    checked_out_at: Option<DateTime<Utc>>,
    return_log: Json<Vec<ReturnEntry>>,
    returned_at: Option<DateTime<Utc>>,
    return_duration_minutes: Option<i64>,
    return_notes: Option<String>,
    invoice_id: Option<Uuid>,
    notes: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = AppError;

    fn try_from(row: ReservationRow) -> AppResult<Self> {
        Ok(Reservation {
            id: row.id,
            kind: row.kind.parse()?,
            status: row.status.parse()?,
            studio_id: row.studio_id,
            line_items: row.line_items.0,
            window: TimeWindow {
                start: row.start_at,
                end: row.end_at,
            },
            requester: row.requester.0,
            base_rate: row.base_rate,
            additional_charges: row.additional_charges.0,
            discount: row.discount,
            pricing: row.pricing.0,
            approval: row.approval.map(|a| a.0),
            checked_out_at: row.checked_out_at,
            return_log: row.return_log.0,
            returned_at: row.returned_at,
            return_duration_minutes: row.return_duration_minutes,
            return_notes: row.return_notes,
            invoice_id: row.invoice_id,
            notes: row.notes,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_reservations(rows: Vec<ReservationRow>) -> AppResult<Vec<Reservation>> {
    rows.into_iter().map(Reservation::try_from).collect()
}

/// Translate constraint violations into domain errors
fn map_write_error(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        match db.constraint() {
            Some("equipment_code_key") => {
                return AppError::DuplicateCode("Equipment code already exists".to_string())
            }
            Some("studios_name_key") => {
                return AppError::DuplicateCode("Studio name already exists".to_string())
            }
            Some("invoices_reservation_id_key") => {
                return AppError::Conflict("Reservation already has an invoice".to_string())
            }
            Some("equipment_quantity_out_check") => {
                return AppError::InsufficientAvailability(
                    "Units out would exceed units owned".to_string(),
                )
            }
            _ => {}
        }
    }
    AppError::Database(e)
}

fn ensure_applied(rows_affected: u64, what: &str, id: Uuid) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "{} {} was modified concurrently or no longer exists",
            what, id
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

async fn write_equipment(
    tx: &mut Transaction<'_, Postgres>,
    e: &Equipment,
    insert: bool,
) -> AppResult<()> {
    if insert {
        sqlx::query(
            r#"
            INSERT INTO equipment (
                id, code, name, category, pricing, available_quantity, current_quantity_out,
                checkout_status, condition, maintenance_history, in_out_history, is_active,
                version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13 + 1, $14, $15)
            "#,
        )
        .bind(e.id)
        .bind(&e.code)
        .bind(&e.name)
        .bind(&e.category)
        .bind(Json(&e.pricing))
        .bind(e.available_quantity)
        .bind(e.current_quantity_out)
        .bind(e.checkout_status.as_str())
        .bind(e.condition.as_str())
        .bind(Json(&e.maintenance_history))
        .bind(Json(&e.in_out_history))
        .bind(e.is_active)
        .bind(e.version)
        .bind(e.created_at)
        .bind(e.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(map_write_error)?;
        return Ok(());
    }

    let result = sqlx::query(
        r#"
        UPDATE equipment SET
            name = $3, category = $4, pricing = $5, available_quantity = $6,
            current_quantity_out = $7, checkout_status = $8, condition = $9,
            maintenance_history = $10, in_out_history = $11, is_active = $12,
            updated_at = $13, version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(e.id)
    .bind(e.version)
    .bind(&e.name)
    .bind(&e.category)
    .bind(Json(&e.pricing))
    .bind(e.available_quantity)
    .bind(e.current_quantity_out)
    .bind(e.checkout_status.as_str())
    .bind(e.condition.as_str())
    .bind(Json(&e.maintenance_history))
    .bind(Json(&e.in_out_history))
    .bind(e.is_active)
    .bind(e.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(map_write_error)?;
    ensure_applied(result.rows_affected(), "Equipment", e.id)
}

async fn write_studio(
    tx: &mut Transaction<'_, Postgres>,
    s: &Studio,
    insert: bool,
) -> AppResult<()> {
    if insert {
        sqlx::query(
            r#"
            INSERT INTO studios (id, name, hourly_rate, is_active, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5 + 1, $6, $7)
            "#,
        )
        .bind(s.id)
        .bind(&s.name)
        .bind(s.hourly_rate)
        .bind(s.is_active)
        .bind(s.version)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(map_write_error)?;
        return Ok(());
    }

    let result = sqlx::query(
        r#"
        UPDATE studios SET
            name = $3, hourly_rate = $4, is_active = $5, updated_at = $6, version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(s.id)
    .bind(s.version)
    .bind(&s.name)
    .bind(s.hourly_rate)
    .bind(s.is_active)
    .bind(s.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(map_write_error)?;
    ensure_applied(result.rows_affected(), "Studio", s.id)
}

async fn write_reservation(
    tx: &mut Transaction<'_, Postgres>,
    r: &Reservation,
    insert: bool,
) -> AppResult<()> {
    let query = if insert {
        r#"
        INSERT INTO reservations (
            id, version, kind, status, studio_id, line_items, start_at, end_at, requester,
            base_rate, additional_charges, discount, pricing, approval, checked_out_at,
            return_log, returned_at, return_duration_minutes, return_notes, invoice_id, notes,
            created_at, updated_at
        )
        VALUES ($1, $2 + 1, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, $21, $22, $23)
        "#
    } else {
        r#"
        UPDATE reservations SET
            kind = $3, status = $4, studio_id = $5, line_items = $6, start_at = $7, end_at = $8,
            requester = $9, base_rate = $10, additional_charges = $11, discount = $12,
            pricing = $13, approval = $14, checked_out_at = $15, return_log = $16,
            returned_at = $17, return_duration_minutes = $18, return_notes = $19,
            invoice_id = $20, notes = $21, created_at = $22, updated_at = $23,
            version = version + 1
        WHERE id = $1 AND version = $2
        "#
    };

    let result = sqlx::query(query)
        .bind(r.id)
        .bind(r.version)
        .bind(r.kind.as_str())
        .bind(r.status.as_str())
        .bind(r.studio_id)
        .bind(Json(&r.line_items))
        .bind(r.window.start)
        .bind(r.window.end)
        .bind(Json(&r.requester))
        .bind(r.base_rate)
        .bind(Json(&r.additional_charges))
        .bind(r.discount)
        .bind(Json(&r.pricing))
        .bind(r.approval.as_ref().map(Json))
        .bind(r.checked_out_at)
        .bind(Json(&r.return_log))
        .bind(r.returned_at)
        .bind(r.return_duration_minutes)
        .bind(&r.return_notes)
        .bind(r.invoice_id)
        .bind(&r.notes)
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(map_write_error)?;

    if insert {
        return Ok(());
    }
    ensure_applied(result.rows_affected(), "Reservation", r.id)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn equipment_get(&self, id: Uuid) -> AppResult<Equipment> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?
            .try_into()
    }

    async fn equipment_list(&self, include_inactive: bool) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, EquipmentRow>(
            "SELECT * FROM equipment WHERE ($1 OR is_active) ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Equipment::try_from).collect()
    }

    async fn equipment_find_by_code(&self, code: &str) -> AppResult<Option<Equipment>> {
        sqlx::query_as::<_, EquipmentRow>("SELECT * FROM equipment WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .map(Equipment::try_from)
            .transpose()
    }

    async fn studio_get(&self, id: Uuid) -> AppResult<Studio> {
        sqlx::query_as::<_, Studio>("SELECT * FROM studios WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Studio {} not found", id)))
    }

    async fn studio_list(&self) -> AppResult<Vec<Studio>> {
        let rows = sqlx::query_as::<_, Studio>("SELECT * FROM studios ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn studio_find_by_name(&self, name: &str) -> AppResult<Option<Studio>> {
        let row = sqlx::query_as::<_, Studio>("SELECT * FROM studios WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn reservation_get(&self, id: Uuid) -> AppResult<Reservation> {
        sqlx::query_as::<_, ReservationRow>("SELECT * FROM reservations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation {} not found", id)))?
            .try_into()
    }

    async fn reservation_list(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let equipment_filter = query
            .equipment_id
            .map(|id| Json(serde_json::json!([{ "equipment_id": id }])));

        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT * FROM reservations
            WHERE ($1::text IS NULL OR kind = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR studio_id = $3)
              AND ($4::jsonb IS NULL OR line_items @> $4)
            ORDER BY start_at
            "#,
        )
        .bind(query.kind.map(|k| k.as_str()))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.studio_id)
        .bind(equipment_filter)
        .fetch_all(&self.pool)
        .await?;
        into_reservations(rows)
    }

    async fn reservations_holding(
        &self,
        resource: ResourceKey,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Reservation>> {
        let holding: Vec<String> = ReservationStatus::HOLDING
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let (studio_id, equipment_filter) = match resource {
            ResourceKey::Studio(id) => (Some(id), None),
            ResourceKey::Equipment(id) => {
                (None, Some(Json(serde_json::json!([{ "equipment_id": id }]))))
            }
        };

        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT * FROM reservations
            WHERE status = ANY($1)
              AND ($2::uuid IS NULL OR id <> $2)
              AND start_at <= $3
              AND (end_at >= $4 OR status IN ('checked_out', 'overdue', 'partially_returned'))
              AND ($5::uuid IS NULL OR studio_id = $5)
              AND ($6::jsonb IS NULL OR line_items @> $6)
            "#,
        )
        .bind(holding)
        .bind(exclude)
        .bind(window.end)
        .bind(window.start)
        .bind(studio_id)
        .bind(equipment_filter)
        .fetch_all(&self.pool)
        .await?;
        into_reservations(rows)
    }

    async fn invoice_get_by_reservation(&self, reservation_id: Uuid) -> AppResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE reservation_id = $1")
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn commit(&self, changes: ChangeSet) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for change in &changes.changes {
            match change {
                Change::InsertEquipment(e) => write_equipment(&mut tx, e, true).await?,
                Change::UpdateEquipment(e) => write_equipment(&mut tx, e, false).await?,
                Change::InsertStudio(s) => write_studio(&mut tx, s, true).await?,
                Change::UpdateStudio(s) => write_studio(&mut tx, s, false).await?,
                Change::InsertReservation(r) => write_reservation(&mut tx, r, true).await?,
                Change::UpdateReservation(r) => write_reservation(&mut tx, r, false).await?,
                Change::DeleteReservation { id, version } => {
                    let result =
                        sqlx::query("DELETE FROM reservations WHERE id = $1 AND version = $2")
                            .bind(id)
                            .bind(version)
                            .execute(&mut *tx)
                            .await?;
                    ensure_applied(result.rows_affected(), "Reservation", *id)?;
                }
                Change::InsertInvoice(i) => {
                    sqlx::query(
                        r#"
                        INSERT INTO invoices (id, number, reservation_id, amount, created_at)
                        VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(i.id)
                    .bind(&i.number)
                    .bind(i.reservation_id)
                    .bind(i.amount)
                    .bind(i.created_at)
                    .execute(&mut *tx)
                    .await
                    .map_err(map_write_error)?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
