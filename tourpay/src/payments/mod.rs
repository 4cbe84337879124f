//! The payment core: signing, request building and notification verification for the
//! Tinkoff Acquiring API.
//!
//! ```text
//! PaymentIntent ──► PaymentRequestBuilder ──► PaymentRequest (signed) ──► TinkoffClient::init
//!                          │                                                     │
//!                          └──────────── signature::sign ◄───────────────────────┤
//!                                                                                ▼
//! gateway notification ──► WebhookVerifier ──► VerifiedNotification ──► PaymentEventSink
//! ```
//!
//! Everything except [`client`] is a pure function of its inputs and the immutable
//! [`GatewayCredentials`], so builders and verifiers can be shared freely across tasks.

use std::fmt;

use serde::Serialize;
use utoipa::ToSchema;

pub mod amount;
pub mod builder;
pub mod client;
pub mod receipt;
pub mod signature;
pub mod webhook;

pub use builder::{PaymentIntent, PaymentRequest, PaymentRequestBuilder, ValidationError};
pub use client::{GatewayError, GatewayResponse, TinkoffClient};
pub use signature::{FieldValue, SignOperation, SignatureError};
pub use webhook::{VerifiedNotification, WebhookError, WebhookVerifier};

/// Terminal identity and shared secret issued by the gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayCredentials {
    terminal_key: String,
    password: String,
}

impl GatewayCredentials {
    pub fn new(terminal_key: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            terminal_key: terminal_key.into(),
            password: password.into(),
        }
    }

    pub fn terminal_key(&self) -> &str {
        &self.terminal_key
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("terminal_key", &self.terminal_key)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Internal payment state a gateway status maps onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created, awaiting the payer or still being processed
    Pending,
    /// Funds held, awaiting confirmation
    Authorized,
    /// Funds captured
    Confirmed,
    /// Declined, cancelled, reversed or expired
    Rejected,
    /// Fully or partially refunded
    Refunded,
    /// A status this service does not recognise, carried verbatim
    Unknown(String),
}

impl PaymentStatus {
    /// Map a gateway `Status` string onto an internal state.
    pub fn from_gateway(status: &str) -> Self {
        match status {
            "NEW" | "FORM_SHOWED" | "AUTHORIZING" | "3DS_CHECKING" | "3DS_CHECKED" | "CONFIRMING" | "REVERSING" | "REFUNDING" => {
                PaymentStatus::Pending
            }
            "AUTHORIZED" => PaymentStatus::Authorized,
            "CONFIRMED" => PaymentStatus::Confirmed,
            "REJECTED" | "AUTH_FAIL" | "CANCELED" | "DEADLINE_EXPIRED" | "REVERSED" | "PARTIAL_REVERSED" => PaymentStatus::Rejected,
            "REFUNDED" | "PARTIAL_REFUNDED" => PaymentStatus::Refunded,
            other => PaymentStatus::Unknown(other.to_string()),
        }
    }

    /// Whether no further transitions are expected without merchant action.
    pub fn is_final(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed | PaymentStatus::Rejected | PaymentStatus::Refunded)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => f.write_str("pending"),
            PaymentStatus::Authorized => f.write_str("authorized"),
            PaymentStatus::Confirmed => f.write_str("confirmed"),
            PaymentStatus::Rejected => f.write_str("rejected"),
            PaymentStatus::Refunded => f.write_str("refunded"),
            PaymentStatus::Unknown(raw) => write!(f, "unknown({raw})"),
        }
    }
}

/// Truncate to at most `max` characters (not bytes; descriptions are usually Cyrillic).
pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
