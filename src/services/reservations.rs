//! Reservation lifecycle manager
//!
//! Every operation reads what it needs, validates, and writes one
//! [`ChangeSet`]. Reservations that take or release a hold also rewrite
//! the equipment and studios they reference, so two commits competing
//! for the same resource cannot both pass the version check. The loser
//! is retried and re-validated against the winner's state.
//!
//! Domain events are collected while building the change set and only
//! dispatched after the commit succeeded.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        lifecycle::ensure_transition,
        reservation::{
            AmendReservation, Approval, ApproveReservation, Charge, CreateReservation, ItemReturn,
            LineItemRequest, ReservationQuery, ReturnEntry, ReturnItems, UpdateReservationStatus,
        },
        DomainEvent, Equipment, EquipmentCondition, LineItem, Outcome, Reservation,
        ReservationKind, ReservationStatus, Studio, TimeWindow,
    },
    repository::{Change, ChangeSet, Repository},
    services::{
        availability::AvailabilityService,
        invoices::InvoicesService,
        notifications::NotificationDispatcher,
        pricing::{compute_total, duration_units, PricingService},
        with_retry,
    },
};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
    availability: AvailabilityService,
    pricing: PricingService,
    invoices: InvoicesService,
    notifier: NotificationDispatcher,
    max_retries: u32,
}

/// Line items must match the kind's resource model
fn validate_resources(
    kind: ReservationKind,
    studio_id: Option<Uuid>,
    lines: &[LineItemRequest],
) -> AppResult<()> {
    match (kind, studio_id) {
        (ReservationKind::StudioBooking, None) => {
            return Err(AppError::Validation(
                "A studio booking must name a studio".to_string(),
            ));
        }
        (ReservationKind::StudioBooking, Some(_)) => {}
        (_, Some(_)) => {
            return Err(AppError::Validation(format!(
                "A {} cannot book a studio",
                kind
            )));
        }
        (_, None) if lines.is_empty() => {
            return Err(AppError::Validation(format!(
                "A {} needs at least one equipment line",
                kind
            )));
        }
        _ => {}
    }

    let mut seen = Vec::with_capacity(lines.len());
    for line in lines {
        if seen.contains(&line.equipment_id) {
            return Err(AppError::Validation(format!(
                "Equipment {} is listed more than once",
                line.equipment_id
            )));
        }
        seen.push(line.equipment_id);
    }
    Ok(())
}

fn validate_amounts(
    base_rate: Option<Decimal>,
    charges: &[Charge],
    discount: Option<Decimal>,
) -> AppResult<()> {
    if base_rate.is_some_and(|r| r < Decimal::ZERO) {
        return Err(AppError::Validation("Base rate cannot be negative".to_string()));
    }
    if charges.iter().any(|c| c.amount < Decimal::ZERO) {
        return Err(AppError::Validation("Charges cannot be negative".to_string()));
    }
    if discount.is_some_and(|d| d < Decimal::ZERO) {
        return Err(AppError::Validation("Discount cannot be negative".to_string()));
    }
    Ok(())
}

fn append_note(existing: &mut Option<String>, note: Option<&str>) {
    let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) else {
        return;
    };
    *existing = Some(match existing.take() {
        Some(previous) => format!("{}\n{}", previous, note),
        None => note.to_string(),
    });
}

fn touch_equipment(items: Vec<Equipment>, changes: &mut ChangeSet) {
    for mut item in items {
        item.updated_at = Utc::now();
        changes.push(Change::UpdateEquipment(item));
    }
}

fn touch_studio(studio: Option<Studio>, changes: &mut ChangeSet) {
    if let Some(mut studio) = studio {
        studio.updated_at = Utc::now();
        changes.push(Change::UpdateStudio(studio));
    }
}

impl ReservationsService {
    pub fn new(
        repository: Repository,
        availability: AvailabilityService,
        pricing: PricingService,
        invoices: InvoicesService,
        notifier: NotificationDispatcher,
        max_retries: u32,
    ) -> Self {
        Self {
            repository,
            availability,
            pricing,
            invoices,
            notifier,
            max_retries,
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    async fn load(&self, id: Uuid) -> AppResult<Reservation> {
        let mut reservation = self.repository.reservation_get(id).await?;
        reservation.refresh_overdue(Utc::now());
        Ok(reservation)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Reservation> {
        self.load(id).await
    }

    /// List reservations; the status filter sees derived `overdue`
    pub async fn list(&self, query: &ReservationQuery) -> AppResult<Vec<Reservation>> {
        let stored = ReservationQuery {
            status: None,
            ..query.clone()
        };
        let now = Utc::now();
        let mut rows = self.repository.reservation_list(&stored).await?;
        for row in rows.iter_mut() {
            row.refresh_overdue(now);
        }
        rows.retain(|r| query.status.map_or(true, |s| r.status == s));
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Availability helpers
    // -----------------------------------------------------------------------

    /// Load the equipment of every line and check the pooled policy for each
    async fn check_lines(
        &self,
        lines: &[LineItem],
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<Vec<Equipment>> {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let equipment = self.repository.equipment_get(line.equipment_id).await?;
            self.availability
                .ensure_equipment(&equipment, line.outstanding(), window, exclude)
                .await?;
            items.push(equipment);
        }
        Ok(items)
    }

    async fn check_studio(
        &self,
        studio_id: Option<Uuid>,
        window: &TimeWindow,
        exclude: Option<Uuid>,
    ) -> AppResult<Option<Studio>> {
        let Some(id) = studio_id else {
            return Ok(None);
        };
        let studio = self.repository.studio_get(id).await?;
        self.availability
            .ensure_studio(&studio, window, exclude)
            .await?;
        Ok(Some(studio))
    }

    /// Current equipment for every line, without availability checks
    async fn line_equipment(&self, reservation: &Reservation) -> AppResult<Vec<Equipment>> {
        let mut items = Vec::with_capacity(reservation.line_items.len());
        for id in reservation.equipment_ids() {
            items.push(self.repository.equipment_get(id).await?);
        }
        Ok(items)
    }

    /// Rewrite every resource a reservation references so the commit
    /// conflicts with any concurrent hold on them
    async fn touch_resources(
        &self,
        reservation: &Reservation,
        changes: &mut ChangeSet,
    ) -> AppResult<()> {
        touch_equipment(self.line_equipment(reservation).await?, changes);
        if let Some(id) = reservation.studio_id {
            touch_studio(Some(self.repository.studio_get(id).await?), changes);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Post-commit dispatch
    // -----------------------------------------------------------------------

    /// Run the outbox. Nothing here can fail the operation that produced it.
    async fn finish(&self, outcome: Outcome<Reservation>) -> Reservation {
        let Outcome { mut record, events } = outcome;

        for event in &events {
            if let DomainEvent::InvoiceRequested { reservation_id } = event {
                let issued = with_retry(self.max_retries, "ensure_invoice", || {
                    self.invoices.ensure_invoice(*reservation_id)
                })
                .await;
                match issued {
                    Ok(_) => match self.load(record.id).await {
                        Ok(fresh) => record = fresh,
                        Err(e) => tracing::warn!(reservation = %record.id, "Reload after invoicing failed: {}", e),
                    },
                    Err(e) => {
                        tracing::warn!(reservation = %reservation_id, "Auto-invoice failed: {}", e)
                    }
                }
            }
        }

        self.notifier.dispatch(&events).await;
        record
    }

    /// Commit, then reload the reservation so callers see the stored version
    async fn commit_and_reload(&self, id: Uuid, changes: ChangeSet) -> AppResult<Reservation> {
        self.repository.commit(changes).await?;
        self.load(id).await
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    pub async fn create(&self, request: CreateReservation) -> AppResult<Reservation> {
        request.validate()?;
        let window = TimeWindow::new(request.start, request.end)?;
        validate_resources(request.kind, request.studio_id, &request.line_items)?;
        validate_amounts(request.base_rate, &request.additional_charges, request.discount)?;

        let lines = self
            .pricing
            .price_lines(request.kind, &request.line_items)
            .await?;
        let base_rate = self
            .pricing
            .base_rate(request.kind, request.studio_id, request.base_rate)
            .await?;

        let outcome = with_retry(self.max_retries, "create_reservation", || {
            self.try_create(&request, window, &lines, base_rate)
        })
        .await?;

        tracing::info!(
            reservation = %outcome.record.id,
            kind = %outcome.record.kind,
            status = %outcome.record.status,
            "Reservation created"
        );
        Ok(self.finish(outcome).await)
    }

    async fn try_create(
        &self,
        request: &CreateReservation,
        window: TimeWindow,
        lines: &[LineItem],
        base_rate: Decimal,
    ) -> AppResult<Outcome<Reservation>> {
        let kind = request.kind;
        let status = kind.initial_status();
        let now = Utc::now();

        let studio = self.check_studio(request.studio_id, &window, None).await?;
        let mut items = self.check_lines(lines, &window, None).await?;

        let mut changes = ChangeSet::new();
        if status.holds_inventory() {
            if status.is_physically_out() {
                for (item, line) in items.iter_mut().zip(lines) {
                    item.adjust_out(line.quantity)?;
                }
            }
            touch_equipment(items, &mut changes);
            touch_studio(studio, &mut changes);
        }

        let discount = request.discount.unwrap_or(Decimal::ZERO);
        let pricing = compute_total(
            base_rate,
            duration_units(kind, &window),
            lines,
            &request.additional_charges,
            discount,
        )?;

        let mut reservation = Reservation {
            id: Uuid::new_v4(),
            kind,
            status,
            studio_id: request.studio_id,
            line_items: lines.to_vec(),
            window,
            requester: request.requester.clone(),
            base_rate,
            additional_charges: request.additional_charges.clone(),
            discount,
            pricing,
            approval: None,
            checked_out_at: status.is_physically_out().then_some(now),
            return_log: Vec::new(),
            returned_at: None,
            return_duration_minutes: None,
            return_notes: None,
            invoice_id: None,
            notes: request.notes.clone(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        reservation.refresh_overdue(now);
        let id = reservation.id;
        changes.push(Change::InsertReservation(reservation));

        let record = self.commit_and_reload(id, changes).await?;
        Ok(Outcome {
            events: vec![DomainEvent::Requested {
                reservation: Box::new(record.clone()),
            }],
            record,
        })
    }

    // -----------------------------------------------------------------------
    // Approval
    // -----------------------------------------------------------------------

    /// Approve or reject a checkout waiting for approval
    pub async fn approve(
        &self,
        id: Uuid,
        decision: ApproveReservation,
        actor: Option<&str>,
    ) -> AppResult<Reservation> {
        let outcome = with_retry(self.max_retries, "approve_reservation", || {
            self.try_approve(id, &decision, actor)
        })
        .await?;

        tracing::info!(
            reservation = %id,
            approved = decision.approved,
            actor = actor.unwrap_or("unknown"),
            "Reservation decided"
        );
        Ok(self.finish(outcome).await)
    }

    async fn try_approve(
        &self,
        id: Uuid,
        decision: &ApproveReservation,
        actor: Option<&str>,
    ) -> AppResult<Outcome<Reservation>> {
        let mut reservation = self.load(id).await?;
        if reservation.status != ReservationStatus::PendingApproval {
            return Err(AppError::InvalidState(format!(
                "Reservation {} is {}, only pending requests can be approved or rejected",
                id, reservation.status
            )));
        }

        let now = Utc::now();
        let target = if decision.approved {
            ReservationStatus::CheckedOut
        } else {
            ReservationStatus::Cancelled
        };
        ensure_transition(reservation.kind, reservation.status, target)?;

        let mut changes = ChangeSet::new();
        if decision.approved {
            let mut items = self
                .check_lines(&reservation.line_items, &reservation.window, Some(id))
                .await?;
            for (item, line) in items.iter_mut().zip(&reservation.line_items) {
                item.adjust_out(line.quantity)?;
            }
            touch_equipment(items, &mut changes);
            reservation.checked_out_at = Some(now);
        }

        reservation.status = target;
        reservation.approval = Some(Approval {
            approved: decision.approved,
            decided_by: actor.map(str::to_string),
            decided_at: now,
            notes: decision.notes.clone(),
        });
        reservation.touch();
        reservation.refresh_overdue(now);
        changes.push(Change::UpdateReservation(reservation));

        let record = self.commit_and_reload(id, changes).await?;
        let event = if decision.approved {
            DomainEvent::Approved {
                reservation: Box::new(record.clone()),
            }
        } else {
            DomainEvent::Rejected {
                reservation: Box::new(record.clone()),
            }
        };
        Ok(Outcome {
            record,
            events: vec![event],
        })
    }

    // -----------------------------------------------------------------------
    // Generic status edges
    // -----------------------------------------------------------------------

    pub async fn update_status(
        &self,
        id: Uuid,
        request: UpdateReservationStatus,
        actor: Option<&str>,
    ) -> AppResult<Reservation> {
        let current = self.load(id).await?;
        let target = request.status;

        match (current.kind, current.status, target) {
            (_, _, ReservationStatus::Returned) => {
                ensure_transition(current.kind, current.status, target)?;
                return self
                    .return_items(
                        id,
                        ReturnItems {
                            items: Vec::new(),
                            notes: request.notes,
                        },
                    )
                    .await;
            }
            (_, _, ReservationStatus::PartiallyReturned) => {
                return Err(AppError::Validation(
                    "Partial returns need per-item quantities, use the return endpoint"
                        .to_string(),
                ));
            }
            (
                ReservationKind::EquipmentCheckout,
                ReservationStatus::PendingApproval,
                ReservationStatus::CheckedOut | ReservationStatus::Cancelled,
            ) => {
                let decision = ApproveReservation {
                    approved: target == ReservationStatus::CheckedOut,
                    notes: request.notes,
                };
                return self.approve(id, decision, actor).await;
            }
            _ => {}
        }

        let outcome = with_retry(self.max_retries, "update_status", || {
            self.try_update_status(id, target, request.notes.as_deref(), actor)
        })
        .await?;

        tracing::info!(
            reservation = %id,
            status = %target,
            actor = actor.unwrap_or("unknown"),
            "Reservation status changed"
        );
        Ok(self.finish(outcome).await)
    }

    async fn try_update_status(
        &self,
        id: Uuid,
        target: ReservationStatus,
        notes: Option<&str>,
        actor: Option<&str>,
    ) -> AppResult<Outcome<Reservation>> {
        let mut reservation = self.load(id).await?;
        let from = reservation.status;
        ensure_transition(reservation.kind, from, target)?;

        let now = Utc::now();
        let mut changes = ChangeSet::new();
        let mut events = Vec::new();

        match target {
            ReservationStatus::Confirmed => {
                let studio = self
                    .check_studio(reservation.studio_id, &reservation.window, Some(id))
                    .await?;
                let items = self
                    .check_lines(&reservation.line_items, &reservation.window, Some(id))
                    .await?;
                touch_equipment(items, &mut changes);
                touch_studio(studio, &mut changes);
                reservation.approval = Some(Approval {
                    approved: true,
                    decided_by: actor.map(str::to_string),
                    decided_at: now,
                    notes: notes.map(str::to_string),
                });
                if reservation.kind.invoices_on_confirm() {
                    events.push(DomainEvent::InvoiceRequested { reservation_id: id });
                }
            }
            ReservationStatus::CheckedOut => {
                let mut items = self.line_equipment(&reservation).await?;
                for item in items.iter_mut() {
                    item.adjust_out(reservation.outstanding_for(item.id))?;
                }
                touch_equipment(items, &mut changes);
                reservation.checked_out_at = Some(now);
                append_note(&mut reservation.notes, notes);
            }
            _ => {
                if from.holds_inventory() != target.holds_inventory() {
                    self.touch_resources(&reservation, &mut changes).await?;
                }
                append_note(&mut reservation.notes, notes);
            }
        }

        reservation.status = target;
        reservation.touch();
        reservation.refresh_overdue(now);
        changes.push(Change::UpdateReservation(reservation));

        let record = self.commit_and_reload(id, changes).await?;
        events.insert(
            0,
            DomainEvent::StatusChanged {
                reservation: Box::new(record.clone()),
                from,
            },
        );
        Ok(Outcome { record, events })
    }

    // -----------------------------------------------------------------------
    // Returns
    // -----------------------------------------------------------------------

    /// Take back some or all units; an empty item list returns everything
    pub async fn return_items(&self, id: Uuid, request: ReturnItems) -> AppResult<Reservation> {
        request.validate()?;
        let outcome = with_retry(self.max_retries, "return_items", || {
            self.try_return(id, &request)
        })
        .await?;

        tracing::info!(
            reservation = %id,
            status = %outcome.record.status,
            "Items returned"
        );
        Ok(self.finish(outcome).await)
    }

    async fn try_return(&self, id: Uuid, request: &ReturnItems) -> AppResult<Outcome<Reservation>> {
        let mut reservation = self.load(id).await?;
        let from = reservation.status;
        if !from.is_physically_out() {
            return Err(AppError::InvalidState(format!(
                "Reservation {} is {}, nothing is out to return",
                id, from
            )));
        }

        let requested: Vec<ItemReturn> = if request.items.is_empty() {
            reservation
                .line_items
                .iter()
                .filter(|line| line.outstanding() > 0)
                .map(|line| ItemReturn {
                    equipment_id: line.equipment_id,
                    quantity: Some(line.outstanding()),
                    condition: EquipmentCondition::Good,
                })
                .collect()
        } else {
            request.items.clone()
        };

        let now = Utc::now();
        // equipment id -> (units back, any came back damaged)
        let mut per_item: HashMap<Uuid, (i32, bool)> = HashMap::new();
        for entry in &requested {
            let line = reservation
                .line_items
                .iter_mut()
                .find(|line| line.equipment_id == entry.equipment_id)
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "Equipment {} is not part of reservation {}",
                        entry.equipment_id, id
                    ))
                })?;
            let quantity = entry.quantity.unwrap_or_else(|| line.outstanding());
            if quantity < 1 || quantity > line.outstanding() {
                return Err(AppError::Validation(format!(
                    "Cannot return {} unit(s) of {}, {} outstanding",
                    quantity,
                    entry.equipment_id,
                    line.outstanding()
                )));
            }
            line.returned_quantity += quantity;
            reservation.return_log.push(ReturnEntry {
                equipment_id: entry.equipment_id,
                quantity,
                condition: entry.condition,
                returned_at: now,
            });
            let slot = per_item.entry(entry.equipment_id).or_insert((0, false));
            slot.0 += quantity;
            slot.1 |= entry.condition == EquipmentCondition::Damaged;
        }

        let mut changes = ChangeSet::new();
        let mut damaged = Vec::new();
        for (equipment_id, (quantity, was_damaged)) in per_item {
            let mut item = self.repository.equipment_get(equipment_id).await?;
            let unmatched = item.release(quantity);
            if unmatched > 0 {
                tracing::warn!(
                    equipment = %item.code,
                    reservation = %id,
                    unmatched,
                    "Returned more units than were counted out"
                );
            }
            if was_damaged {
                item.mark_damaged();
                damaged.push(DomainEvent::EquipmentDamaged {
                    equipment_id,
                    code: item.code.clone(),
                    reservation_id: id,
                });
            }
            changes.push(Change::UpdateEquipment(item));
        }

        let fully_returned = reservation.is_fully_returned();
        let target = if fully_returned {
            ReservationStatus::Returned
        } else {
            ReservationStatus::PartiallyReturned
        };
        if target != from {
            ensure_transition(reservation.kind, from, target)?;
        }

        reservation.status = target;
        if fully_returned {
            let since = reservation.checked_out_at.unwrap_or(reservation.window.start);
            reservation.returned_at = Some(now);
            reservation.return_duration_minutes = Some((now - since).num_minutes().max(0));
        }
        append_note(&mut reservation.return_notes, request.notes.as_deref());
        reservation.touch();
        changes.push(Change::UpdateReservation(reservation));

        let record = self.commit_and_reload(id, changes).await?;
        let mut events = vec![DomainEvent::ItemsReturned {
            reservation: Box::new(record.clone()),
            fully_returned,
        }];
        events.extend(damaged);
        Ok(Outcome { record, events })
    }

    // -----------------------------------------------------------------------
    // Amend / delete
    // -----------------------------------------------------------------------

    /// Change a reservation nobody has acted on yet
    pub async fn amend(&self, id: Uuid, patch: AmendReservation) -> AppResult<Reservation> {
        patch.validate()?;
        let record = with_retry(self.max_retries, "amend_reservation", || {
            self.try_amend(id, &patch)
        })
        .await?;
        tracing::info!(reservation = %id, "Reservation amended");
        Ok(record)
    }

    async fn try_amend(&self, id: Uuid, patch: &AmendReservation) -> AppResult<Reservation> {
        let mut reservation = self.load(id).await?;
        if reservation.is_invoiced() {
            return Err(AppError::ResourceBusy(format!(
                "Reservation {} is invoiced and can no longer change",
                id
            )));
        }
        if reservation.status != reservation.kind.initial_status()
            || reservation.status.holds_inventory()
        {
            return Err(AppError::InvalidState(format!(
                "Reservation {} is {} and can no longer be amended",
                id, reservation.status
            )));
        }

        let window = TimeWindow::new(
            patch.start.unwrap_or(reservation.window.start),
            patch.end.unwrap_or(reservation.window.end),
        )?;
        validate_amounts(
            patch.base_rate,
            patch.additional_charges.as_deref().unwrap_or_default(),
            patch.discount,
        )?;

        if let Some(ref requested) = patch.line_items {
            validate_resources(reservation.kind, reservation.studio_id, requested)?;
            reservation.line_items = self.pricing.price_lines(reservation.kind, requested).await?;
        }
        self.check_studio(reservation.studio_id, &window, Some(id))
            .await?;
        self.check_lines(&reservation.line_items, &window, Some(id))
            .await?;

        reservation.window = window;
        if let Some(rate) = patch.base_rate {
            reservation.base_rate = rate;
        }
        if let Some(ref charges) = patch.additional_charges {
            reservation.additional_charges = charges.clone();
        }
        if let Some(discount) = patch.discount {
            reservation.discount = discount;
        }
        append_note(&mut reservation.notes, patch.notes.as_deref());
        reservation.pricing = compute_total(
            reservation.base_rate,
            duration_units(reservation.kind, &reservation.window),
            &reservation.line_items,
            &reservation.additional_charges,
            reservation.discount,
        )?;
        reservation.touch();

        let mut changes = ChangeSet::new();
        changes.push(Change::UpdateReservation(reservation));
        self.commit_and_reload(id, changes).await
    }

    /// Delete a reservation that never held anything, or is finished
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        with_retry(self.max_retries, "delete_reservation", || async {
            let reservation = self.load(id).await?;
            if reservation.is_invoiced() {
                return Err(AppError::ResourceBusy(format!(
                    "Reservation {} is referenced by an invoice",
                    id
                )));
            }
            let untouched = reservation.status == reservation.kind.initial_status()
                && !reservation.status.holds_inventory();
            if !untouched && !reservation.status.is_terminal() {
                return Err(AppError::ResourceBusy(format!(
                    "Reservation {} is {} and still holds resources",
                    id, reservation.status
                )));
            }
            let mut changes = ChangeSet::new();
            changes.push(Change::DeleteReservation {
                id,
                version: reservation.version,
            });
            self.repository.commit(changes).await
        })
        .await?;

        tracing::info!(reservation = %id, "Reservation deleted");
        Ok(())
    }
}
