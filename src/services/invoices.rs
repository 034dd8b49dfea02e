//! Auto-invoice trigger

use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Invoice, Reservation},
    repository::{Change, ChangeSet, Repository},
};

#[derive(Clone)]
pub struct InvoicesService {
    repository: Repository,
    number_prefix: String,
}

impl InvoicesService {
    pub fn new(repository: Repository, number_prefix: impl Into<String>) -> Self {
        Self {
            repository,
            number_prefix: number_prefix.into(),
        }
    }

    fn next_number(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            self.number_prefix,
            Utc::now().format("%Y%m%d"),
            &suffix[..8].to_uppercase()
        )
    }

    /// Invoice for a reservation, if one was issued
    pub async fn get_for_reservation(&self, reservation_id: Uuid) -> AppResult<Invoice> {
        self.repository.reservation_get(reservation_id).await?;
        self.repository
            .invoice_get_by_reservation(reservation_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No invoice for reservation {}", reservation_id))
            })
    }

    /// Issue the invoice for a confirmed reservation.
    ///
    /// Idempotent: a second call, or a call racing another one, returns the
    /// invoice that already exists.
    pub async fn ensure_invoice(&self, reservation_id: Uuid) -> AppResult<Invoice> {
        if let Some(existing) = self
            .repository
            .invoice_get_by_reservation(reservation_id)
            .await?
        {
            return Ok(existing);
        }

        let reservation = self.repository.reservation_get(reservation_id).await?;
        if !reservation.kind.invoices_on_confirm() {
            return Err(AppError::InvalidState(format!(
                "{} reservations are not invoiced automatically",
                reservation.kind
            )));
        }

        let invoice = self.build(&reservation);
        let mut linked = reservation;
        linked.invoice_id = Some(invoice.id);
        linked.touch();

        let mut changes = ChangeSet::new();
        changes
            .push(Change::InsertInvoice(invoice.clone()))
            .push(Change::UpdateReservation(linked));

        match self.repository.commit(changes).await {
            Ok(()) => {
                tracing::info!(
                    reservation = %reservation_id,
                    number = %invoice.number,
                    "Invoice issued"
                );
                Ok(invoice)
            }
            Err(AppError::Conflict(reason)) => {
                // Someone else touched the reservation; keep their invoice if they issued one
                match self
                    .repository
                    .invoice_get_by_reservation(reservation_id)
                    .await?
                {
                    Some(existing) => Ok(existing),
                    None => Err(AppError::Conflict(reason)),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn build(&self, reservation: &Reservation) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            number: self.next_number(),
            reservation_id: reservation.id,
            amount: reservation.pricing.total,
            created_at: Utc::now(),
        }
    }
}
