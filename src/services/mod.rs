//! Business logic services

pub mod availability;
pub mod documents;
pub mod inventory;
pub mod invoices;
pub mod notifications;
pub mod pricing;
pub mod reservations;

use std::{future::Future, sync::Arc};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    repository::Repository,
};

use documents::{DocumentRenderer, TextRenderer};
use notifications::{LogGateway, MessagingGateway, NotificationDispatcher, WebhookGateway};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub inventory: inventory::InventoryService,
    pub availability: availability::AvailabilityService,
    pub pricing: pricing::PricingService,
    pub invoices: invoices::InvoicesService,
    pub reservations: reservations::ReservationsService,
}

impl Services {
    /// Create all services with the given repository, picking the messaging
    /// gateway from the notification settings
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let gateway: Arc<dyn MessagingGateway> = match config.notifications.webhook_url {
            Some(ref url) => Arc::new(WebhookGateway::new(&config.notifications, url)?),
            None => Arc::new(LogGateway),
        };
        let renderer = Arc::new(TextRenderer::new(config.notifications.sender_name.clone()));
        Ok(Self::with_gateway(repository, config, gateway, renderer))
    }

    /// Same as [`Services::new`] with explicit gateway and renderer
    pub fn with_gateway(
        repository: Repository,
        config: &AppConfig,
        gateway: Arc<dyn MessagingGateway>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        let retries = config.reservations.max_commit_retries;
        let availability = availability::AvailabilityService::new(repository.clone());
        let pricing = pricing::PricingService::new(repository.clone());
        let invoices =
            invoices::InvoicesService::new(repository.clone(), config.invoices.number_prefix.clone());
        let notifier =
            NotificationDispatcher::new(gateway, renderer, config.notifications.enabled);

        Self {
            inventory: inventory::InventoryService::new(repository.clone(), retries),
            reservations: reservations::ReservationsService::new(
                repository.clone(),
                availability.clone(),
                pricing.clone(),
                invoices.clone(),
                notifier,
                retries,
            ),
            availability,
            pricing,
            invoices,
            repository,
        }
    }
}

/// Run `attempt` again while it fails with a stale-version `Conflict`.
///
/// Each attempt must re-read what it writes, so a retry validates against
/// the state that won the race.
pub(crate) async fn with_retry<T, F, Fut>(
    max_retries: u32,
    operation: &str,
    mut attempt: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(AppError::Conflict(reason)) if retries < max_retries => {
                retries += 1;
                tracing::debug!(operation, retries, "Retrying after conflict: {}", reason);
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_conflicts_then_gives_up() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_retry(2, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Conflict("stale".into()))
        })
        .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_retry(5, "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::ResourceBusy("busy".into()))
        })
        .await;
        assert!(matches!(result, Err(AppError::ResourceBusy(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_one_conflict() {
        let calls = AtomicU32::new(0);
        let result = with_retry(3, "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(AppError::Conflict("stale".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }
}
