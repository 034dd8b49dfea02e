//! Document generation for reservation confirmations

use std::fmt::Write;

use crate::{
    models::Reservation,
    services::{
        notifications::{Attachment, GatewayError},
        pricing::format_amount,
    },
};

/// Renders a reservation into a document that can be attached to a message
#[cfg_attr(test, mockall::automock)]
pub trait DocumentRenderer: Send + Sync {
    fn generate_document(&self, reservation: &Reservation) -> Result<Attachment, GatewayError>;
}

/// Plain-text confirmation slip
#[derive(Clone)]
pub struct TextRenderer {
    company_name: String,
}

impl TextRenderer {
    pub fn new(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
        }
    }
}

impl DocumentRenderer for TextRenderer {
    fn generate_document(&self, reservation: &Reservation) -> Result<Attachment, GatewayError> {
        let mut body = String::new();
        let render = |body: &mut String| -> std::fmt::Result {
            writeln!(body, "{}", self.company_name)?;
            writeln!(body, "{} {}", reservation.kind, reservation.id)?;
            writeln!(body, "Status: {}", reservation.status)?;
            writeln!(body, "Client: {}", reservation.requester.name)?;
            writeln!(
                body,
                "From {} to {}",
                reservation.window.start.format("%Y-%m-%d %H:%M"),
                reservation.window.end.format("%Y-%m-%d %H:%M")
            )?;
            for line in &reservation.line_items {
                writeln!(
                    body,
                    "  {} x{} @ {}",
                    line.equipment_id,
                    line.quantity,
                    format_amount(line.rate)
                )?;
            }
            for charge in &reservation.additional_charges {
                writeln!(body, "  {}: {}", charge.label, format_amount(charge.amount))?;
            }
            let pricing = &reservation.pricing;
            writeln!(body, "Subtotal: {}", format_amount(pricing.subtotal))?;
            writeln!(body, "Equipment: {}", format_amount(pricing.equipment_cost))?;
            writeln!(body, "Discount: {}", format_amount(pricing.discount))?;
            writeln!(body, "Total: {}", format_amount(pricing.total))
        };
        render(&mut body).map_err(|e| GatewayError::Render(e.to_string()))?;

        Ok(Attachment {
            filename: format!("{}-{}.txt", reservation.kind, reservation.id),
            content_type: "text/plain".to_string(),
            bytes: body.into_bytes(),
        })
    }
}
