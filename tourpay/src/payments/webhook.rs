//! Verification of asynchronous payment notifications.
//!
//! The gateway POSTs a JSON object for every status change. A notification is only trusted
//! after its `Token` has been recomputed over the notification's scalar fields with the
//! terminal password and found to match. Anything else is rejected before it can reach
//! persistence or customer notifications.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::signature::{self, SignOperation, TOKEN_FIELD};
use super::{GatewayCredentials, PaymentStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("malformed notification: {reason}")]
    Malformed { reason: String },

    #[error("invalid signature on notification for order {order_id}, payment {payment_id}")]
    InvalidSignature { order_id: String, payment_id: String },
}

/// A notification whose token has been checked, ready to hand to persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct VerifiedNotification {
    pub order_id: String,
    pub payment_id: String,
    pub status: PaymentStatus,
    /// The gateway's own status string, e.g. `CONFIRMED`
    pub gateway_status: String,
    /// Amount in minor units, when the gateway reported one
    pub amount: Option<i64>,
    pub success: Option<bool>,
    pub error_code: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Checks notifications against one terminal's password.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    credentials: Arc<GatewayCredentials>,
}

impl WebhookVerifier {
    pub fn new(credentials: Arc<GatewayCredentials>) -> Self {
        Self { credentials }
    }

    /// Parse and verify a raw request body.
    pub fn verify_body(&self, body: &[u8]) -> Result<VerifiedNotification, WebhookError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| WebhookError::Malformed {
            reason: format!("body is not valid JSON: {e}"),
        })?;
        let Value::Object(object) = value else {
            return Err(WebhookError::Malformed {
                reason: "body is not a JSON object".to_string(),
            });
        };
        self.verify(&object)
    }

    /// Verify an already parsed notification.
    pub fn verify(&self, notification: &Map<String, Value>) -> Result<VerifiedNotification, WebhookError> {
        let required = |name: &str| {
            scalar_string(notification, name).ok_or_else(|| WebhookError::Malformed {
                reason: format!("missing required field {name}"),
            })
        };
        let payment_id = required("PaymentId")?;
        let order_id = required("OrderId")?;
        let gateway_status = required("Status")?;
        let token = required(TOKEN_FIELD)?;

        let expected = signature::sign_json(SignOperation::Notification, notification, self.credentials.password()).map_err(|e| {
            WebhookError::Malformed { reason: e.to_string() }
        })?;

        if !signature::tokens_match(&expected, &token) {
            tracing::warn!(
                order_id = %order_id,
                payment_id = %payment_id,
                status = %gateway_status,
                amount = ?notification.get("Amount"),
                terminal_key = ?notification.get("TerminalKey"),
                supplied_token = %token,
                "Rejected payment notification with invalid signature"
            );
            return Err(WebhookError::InvalidSignature { order_id, payment_id });
        }

        let status = PaymentStatus::from_gateway(&gateway_status);
        if let PaymentStatus::Unknown(raw) = &status {
            tracing::warn!(order_id = %order_id, payment_id = %payment_id, status = %raw, "Unrecognised gateway status");
        }

        tracing::info!(order_id = %order_id, payment_id = %payment_id, status = %status, "Verified payment notification");

        Ok(VerifiedNotification {
            amount: notification.get("Amount").and_then(Value::as_i64),
            success: notification.get("Success").and_then(Value::as_bool),
            error_code: scalar_string(notification, "ErrorCode"),
            order_id,
            payment_id,
            status,
            gateway_status,
            received_at: Utc::now(),
        })
    }
}

/// String form of a top-level scalar field; `None` for absent, null or nested values.
fn scalar_string(object: &Map<String, Value>, name: &str) -> Option<String> {
    match object.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
