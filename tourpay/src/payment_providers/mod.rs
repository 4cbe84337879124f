//! Payment provider abstraction layer
//!
//! This module defines the `PaymentProvider` trait which the HTTP layer talks to. Providers own
//! their credentials, build and sign requests with the payment core, dispatch them, and verify
//! inbound notifications.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::config::{Config, PaymentConfig};
use crate::events::PaymentEventSink;
use crate::payments::{GatewayError, PaymentIntent, PaymentStatus, ValidationError, VerifiedNotification, WebhookError};

pub mod dummy;
pub mod tinkoff;

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here. `events` is only used by providers
/// that produce their own notifications instead of receiving them over HTTP.
pub fn create_provider(config: &Config, events: Arc<dyn PaymentEventSink>) -> Result<Box<dyn PaymentProvider>> {
    let Some(payment) = &config.payment else {
        return Err(PaymentError::InvalidData("no payment provider configured".to_string()));
    };
    match payment {
        PaymentConfig::Tinkoff(tinkoff_config) => {
            let notification_url = tinkoff_config.notification_url.clone().or_else(|| config.webhook_url());
            Ok(Box::new(tinkoff::TinkoffProvider::new(tinkoff_config, notification_url)?))
        }
        PaymentConfig::Dummy(dummy_config) => Ok(Box::new(dummy::DummyProvider::from(dummy_config.clone()).with_events(events))),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Invalid payment request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid payment data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Failed to record payment event: {0:#}")]
    Events(anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation(ValidationError::Signature(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            PaymentError::Validation(_) | PaymentError::InvalidData(_) => StatusCode::BAD_REQUEST,
            PaymentError::Webhook(WebhookError::Malformed { .. }) => StatusCode::BAD_REQUEST,
            PaymentError::Webhook(WebhookError::InvalidSignature { .. }) => StatusCode::UNAUTHORIZED,
            PaymentError::Gateway(err) => match err {
                GatewayError::Rejected { .. } => StatusCode::PAYMENT_REQUIRED,
                GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                GatewayError::Transport(_) | GatewayError::Decode(_) => StatusCode::BAD_GATEWAY,
                GatewayError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                GatewayError::Signature(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            PaymentError::Events(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PaymentError> for StatusCode {
    fn from(err: PaymentError) -> Self {
        err.status_code()
    }
}

/// A payment created at the provider, awaiting the payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Checkout {
    pub order_id: String,
    pub payment_id: String,
    /// Hosted payment page to redirect the payer to
    pub payment_url: String,
    pub status: PaymentStatus,
}

/// Provider-reported state of an existing payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentState {
    pub payment_id: String,
    pub order_id: Option<String>,
    pub status: PaymentStatus,
    /// The provider's own status string
    pub gateway_status: String,
    /// Amount in major units, when reported
    #[schema(value_type = Option<String>)]
    pub amount: Option<Decimal>,
}

/// Abstract payment provider interface
///
/// Gateway calls take a [`CancellationToken`]; cancelling it abandons the call with
/// [`GatewayError::Cancelled`]. Nothing is retried by the provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Validate, sign and register a payment for a booking.
    async fn create_payment(&self, intent: PaymentIntent, cancel: &CancellationToken) -> Result<Checkout>;

    /// Poll the current state of a payment.
    async fn get_payment_state(&self, payment_id: &str, cancel: &CancellationToken) -> Result<PaymentState>;

    /// Cancel or refund a payment. `amount` in major units requests a partial refund.
    async fn cancel_payment(&self, payment_id: &str, amount: Option<Decimal>, cancel: &CancellationToken) -> Result<PaymentState>;

    /// Verify a raw notification body.
    ///
    /// Returns Err if the body is malformed or its token does not match; nothing in an
    /// unverified body may be acted on.
    fn validate_webhook(&self, body: &[u8]) -> Result<VerifiedNotification>;
}
