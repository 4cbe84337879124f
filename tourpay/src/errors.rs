use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

use crate::payment_providers::PaymentError;
use crate::payments::{GatewayError, WebhookError};

#[derive(ThisError, Debug)]
pub enum Error {
    /// No payment provider configured
    #[error("Payment processing is not configured")]
    PaymentsDisabled,

    /// Payment provider failure, mapped per variant
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::PaymentsDisabled => StatusCode::NOT_IMPLEMENTED,
            Error::Payment(err) => err.status_code(),
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::PaymentsDisabled => "Payment processing is not configured".to_string(),
            Error::Payment(err) => match err {
                PaymentError::Validation(e) => e.to_string(),
                PaymentError::InvalidData(message) => message.clone(),
                PaymentError::Webhook(WebhookError::Malformed { .. }) => "Malformed notification".to_string(),
                PaymentError::Webhook(WebhookError::InvalidSignature { .. }) => "Invalid notification token".to_string(),
                PaymentError::Gateway(GatewayError::Rejected { message, .. }) => format!("Payment gateway declined the request: {message}"),
                PaymentError::Gateway(GatewayError::Timeout) => "Payment gateway did not respond in time".to_string(),
                PaymentError::Gateway(GatewayError::Cancelled) => "Request cancelled".to_string(),
                PaymentError::Gateway(_) => "Payment gateway unavailable".to_string(),
                PaymentError::Events(_) => "Internal server error".to_string(),
            },
            Error::Internal { .. } | Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Payment(err) if err.status_code().is_server_error() => {
                tracing::error!("Payment error: {}", self);
            }
            Error::Payment(PaymentError::Webhook(_)) => {
                // Already logged with the notification's fields by the verifier
                tracing::debug!("Webhook rejected: {}", self);
            }
            Error::Payment(_) => {
                tracing::warn!("Payment error: {}", self);
            }
            Error::PaymentsDisabled => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let status = self.status_code();

        match &self {
            // Surface the gateway's own code so callers can tell declines apart
            Error::Payment(PaymentError::Gateway(GatewayError::Rejected { code, .. })) => {
                let body = json!({
                    "message": self.user_message(),
                    "code": code,
                });
                (status, Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
