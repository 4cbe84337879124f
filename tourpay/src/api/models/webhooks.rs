//! Acknowledgement returned to the gateway for a verified notification.

use serde::Serialize;
use utoipa::ToSchema;

use crate::payments::VerifiedNotification;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationAck {
    pub success: bool,
    pub order_id: String,
    pub payment_id: String,
    /// The gateway status that was accepted
    pub status: String,
}

impl From<&VerifiedNotification> for NotificationAck {
    fn from(notification: &VerifiedNotification) -> Self {
        Self {
            success: true,
            order_id: notification.order_id.clone(),
            payment_id: notification.payment_id.clone(),
            status: notification.gateway_status.clone(),
        }
    }
}
