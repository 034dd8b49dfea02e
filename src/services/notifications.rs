//! Requester notifications
//!
//! Lifecycle operations return their domain events; the dispatcher turns
//! them into messages after the commit. Delivery is best-effort: a failed
//! message is logged and never reaches the caller.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{
    config::NotificationsConfig,
    error::AppError,
    models::{DomainEvent, Reservation, ReservationStatus},
    services::{documents::DocumentRenderer, pricing::format_amount},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("gateway rejected message: {0}")]
    Rejected(String),

    #[error("document rendering failed: {0}")]
    Render(String),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError::ExternalService(e.to_string())
    }
}

/// File sent along with a message
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Deliver `text` to `recipient`, returning the gateway's delivery id
    async fn send_message(
        &self,
        recipient: &str,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<String, GatewayError>;
}

// ---------------------------------------------------------------------------
// Gateways
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WebhookAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    /// UTF-8 documents only; binary documents are not sent through the webhook
    content: String,
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    sender: &'a str,
    recipient: &'a str,
    text: &'a str,
    attachment: Option<WebhookAttachment<'a>>,
}

/// Posts messages as JSON to a messaging provider's webhook
#[derive(Clone)]
pub struct WebhookGateway {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    sender_name: String,
}

impl WebhookGateway {
    pub fn new(config: &NotificationsConfig, url: &str) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            token: config.webhook_token.clone(),
            sender_name: config.sender_name.clone(),
        })
    }
}

#[async_trait]
impl MessagingGateway for WebhookGateway {
    async fn send_message(
        &self,
        recipient: &str,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<String, GatewayError> {
        let attachment = attachment.as_ref().map(|a| WebhookAttachment {
            filename: &a.filename,
            content_type: &a.content_type,
            content: String::from_utf8_lossy(&a.bytes).into_owned(),
        });
        let payload = WebhookMessage {
            sender: &self.sender_name,
            recipient,
            text,
            attachment,
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(body
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

/// Writes messages to the log instead of delivering them
#[derive(Clone, Default)]
pub struct LogGateway;

#[async_trait]
impl MessagingGateway for LogGateway {
    async fn send_message(
        &self,
        recipient: &str,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<String, GatewayError> {
        tracing::info!(
            recipient,
            attachment = attachment.as_ref().map(|a| a.filename.as_str()),
            "Message (not delivered): {}",
            text
        );
        Ok(format!("log-{}", uuid::Uuid::new_v4()))
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

fn message_for(event: &DomainEvent, reservation: &Reservation) -> Option<(String, bool)> {
    let who = &reservation.requester.name;
    let what = reservation.kind.to_string().replace('_', " ");
    let text = match event {
        DomainEvent::Requested { .. } => (
            format!("Hi {}, we received your {} request ({}).", who, what, reservation.id),
            false,
        ),
        DomainEvent::Approved { .. } => (
            format!(
                "Hi {}, your {} {} is approved. Please return everything by {}.",
                who,
                what,
                reservation.id,
                reservation.window.end.format("%Y-%m-%d %H:%M")
            ),
            true,
        ),
        DomainEvent::Rejected { .. } => (
            format!("Hi {}, your {} {} could not be approved.", who, what, reservation.id),
            false,
        ),
        DomainEvent::StatusChanged { .. } => match reservation.status {
            ReservationStatus::Confirmed => (
                format!(
                    "Hi {}, your {} {} is confirmed. Total: {}.",
                    who,
                    what,
                    reservation.id,
                    format_amount(reservation.pricing.total)
                ),
                true,
            ),
            ReservationStatus::Cancelled => (
                format!("Hi {}, your {} {} was cancelled.", who, what, reservation.id),
                false,
            ),
            ReservationStatus::CheckedOut => (
                format!("Hi {}, the equipment for {} is now checked out.", who, reservation.id),
                false,
            ),
            _ => return None,
        },
        DomainEvent::ItemsReturned { fully_returned, .. } => {
            let text = if *fully_returned {
                format!("Hi {}, thanks! Everything for {} is back.", who, reservation.id)
            } else {
                format!(
                    "Hi {}, we logged a partial return for {}. Some items are still out.",
                    who, reservation.id
                )
            };
            (text, false)
        }
        DomainEvent::EquipmentDamaged { .. } | DomainEvent::InvoiceRequested { .. } => return None,
    };
    Some(text)
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    gateway: Arc<dyn MessagingGateway>,
    renderer: Arc<dyn DocumentRenderer>,
    enabled: bool,
}

impl NotificationDispatcher {
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        renderer: Arc<dyn DocumentRenderer>,
        enabled: bool,
    ) -> Self {
        Self {
            gateway,
            renderer,
            enabled,
        }
    }

    /// Send one message per notifiable event; returns how many were delivered
    pub async fn dispatch(&self, events: &[DomainEvent]) -> usize {
        let mut delivered = 0;
        for event in events {
            if let DomainEvent::EquipmentDamaged {
                code,
                reservation_id,
                ..
            } = event
            {
                tracing::warn!(equipment = %code, reservation = %reservation_id, "Equipment returned damaged");
                continue;
            }
            if !self.enabled {
                continue;
            }
            let Some(reservation) = event.reservation() else {
                continue;
            };
            let Some(recipient) = reservation.requester.phone.as_deref() else {
                tracing::debug!(reservation = %reservation.id, "No phone number, skipping {}", event.name());
                continue;
            };
            let Some((text, with_document)) = message_for(event, reservation) else {
                continue;
            };

            let attachment = if with_document {
                match self.renderer.generate_document(reservation) {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        tracing::warn!(reservation = %reservation.id, "Document generation failed: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            match self.gateway.send_message(recipient, &text, attachment).await {
                Ok(delivery_id) => {
                    delivered += 1;
                    tracing::debug!(reservation = %reservation.id, delivery_id, "Sent {} notification", event.name());
                }
                Err(e) => {
                    tracing::warn!(reservation = %reservation.id, "Failed to send {} notification: {}", event.name(), e);
                }
            }
        }
        delivered
    }
}
