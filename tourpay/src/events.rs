//! Hand-off of verified payment notifications to the rest of the business.
//!
//! The webhook handler calls [`PaymentEventSink::payment_updated`] once per verified
//! notification. Booking persistence and customer messaging plug in here; the gateway
//! redelivers any notification whose handler did not answer 200, so sinks must be idempotent
//! on `(payment_id, gateway_status)`.

use async_trait::async_trait;

use crate::payments::VerifiedNotification;

#[async_trait]
pub trait PaymentEventSink: Send + Sync {
    /// Record a status change. An error makes the webhook answer 500 so the gateway retries.
    async fn payment_updated(&self, notification: &VerifiedNotification) -> anyhow::Result<()>;
}

/// Default sink: one structured log line per notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventSink;

#[async_trait]
impl PaymentEventSink for LoggingEventSink {
    async fn payment_updated(&self, notification: &VerifiedNotification) -> anyhow::Result<()> {
        tracing::info!(
            order_id = %notification.order_id,
            payment_id = %notification.payment_id,
            status = %notification.status,
            gateway_status = %notification.gateway_status,
            amount = ?notification.amount,
            final_state = notification.status.is_final(),
            "Payment status updated"
        );
        Ok(())
    }
}
