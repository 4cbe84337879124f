//! Gateway notification intake.

use axum::{Json, body::Bytes, extract::State};
use tracing::instrument;

use crate::{
    AppState,
    api::handlers::payments::provider,
    api::models::webhooks::NotificationAck,
    errors::{Error, Result},
};

/// Receive a payment status notification from the gateway.
///
/// The body is verified against the terminal password before anything else happens. Only a
/// verified notification reaches the event sink, and only then is 200 returned; the gateway
/// keeps redelivering until it sees one.
#[utoipa::path(
    post,
    path = "/webhooks/payments",
    tag = "webhooks",
    summary = "Payment notification",
    request_body(content = String, description = "Notification JSON as sent by the gateway", content_type = "application/json"),
    responses(
        (status = 200, description = "Notification verified and recorded", body = NotificationAck),
        (status = 400, description = "Body is not a well-formed notification"),
        (status = 401, description = "Token does not match"),
        (status = 500, description = "Notification could not be recorded; the gateway will retry"),
        (status = 501, description = "No payment provider configured"),
    )
)]
#[instrument(skip_all)]
pub async fn payment_notification(State(state): State<AppState>, body: Bytes) -> Result<Json<NotificationAck>> {
    let provider = provider(&state)?;
    let notification = provider.validate_webhook(&body)?;

    state.events.payment_updated(&notification).await.map_err(|e| {
        Error::Other(e.context(format!(
            "record notification for order {} payment {}",
            notification.order_id, notification.payment_id
        )))
    })?;

    Ok(Json(NotificationAck::from(&notification)))
}
