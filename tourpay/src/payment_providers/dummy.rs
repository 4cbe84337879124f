//! Dummy payment provider implementation
//!
//! Payments are "paid" the moment they are created and nothing leaves the process. Requests
//! still go through the real builder, and the confirmation the gateway would send is signed,
//! run through the real verifier and handed to the event sink, so local development exercises
//! the whole notification path.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::DummyConfig;
use crate::events::{LoggingEventSink, PaymentEventSink};
use crate::payment_providers::{Checkout, PaymentError, PaymentProvider, PaymentState, Result};
use crate::payments::signature::{self, SignOperation};
use crate::payments::{GatewayCredentials, PaymentIntent, PaymentRequestBuilder, PaymentStatus, VerifiedNotification, WebhookVerifier};

const PAYMENT_ID_PREFIX: &str = "dummy";

/// Dummy payment provider that confirms every payment immediately
pub struct DummyProvider {
    credentials: Arc<GatewayCredentials>,
    builder: PaymentRequestBuilder,
    verifier: WebhookVerifier,
    checkout_url: Url,
    events: Arc<dyn PaymentEventSink>,
}

impl From<DummyConfig> for DummyProvider {
    fn from(config: DummyConfig) -> Self {
        let credentials = Arc::new(GatewayCredentials::new(config.terminal_key, config.password));
        Self {
            builder: PaymentRequestBuilder::new(credentials.clone()),
            verifier: WebhookVerifier::new(credentials.clone()),
            credentials,
            checkout_url: config.checkout_url,
            events: Arc::new(LoggingEventSink),
        }
    }
}

impl DummyProvider {
    /// Deliver the confirmations of created payments to `events`.
    pub fn with_events(mut self, events: Arc<dyn PaymentEventSink>) -> Self {
        self.events = events;
        self
    }

    /// A notification body for `payment_id`, signed the way the real gateway signs it.
    pub fn notification_for(&self, order_id: &str, payment_id: &str, gateway_status: &str, amount: i64) -> Result<Value> {
        let mut body = json!({
            "TerminalKey": self.credentials.terminal_key(),
            "OrderId": order_id,
            "Success": true,
            "Status": gateway_status,
            "PaymentId": payment_id,
            "ErrorCode": "0",
            "Amount": amount,
        });
        if let Value::Object(object) = &mut body {
            let token = signature::sign_json(SignOperation::Notification, object, self.credentials.password())
                .map_err(|e| PaymentError::InvalidData(e.to_string()))?;
            object.insert(signature::TOKEN_FIELD.to_string(), Value::String(token));
        }
        Ok(body)
    }
}

/// Payment ids have the form `dummy_{uuid}_{order_id}` so state can be recovered without storage.
fn parse_payment_id(payment_id: &str) -> Result<String> {
    let mut parts = payment_id.splitn(3, '_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(PAYMENT_ID_PREFIX), Some(_), Some(order_id)) if !order_id.is_empty() => Ok(order_id.to_string()),
        _ => Err(PaymentError::InvalidData(format!("Invalid dummy payment ID: {payment_id}"))),
    }
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    async fn create_payment(&self, intent: PaymentIntent, _cancel: &CancellationToken) -> Result<Checkout> {
        let request = self.builder.build(intent)?;
        let payment_id = format!("{PAYMENT_ID_PREFIX}_{}_{}", uuid::Uuid::new_v4().simple(), request.order_id());

        let mut payment_url = self.checkout_url.clone();
        payment_url.query_pairs_mut().append_pair("PaymentId", &payment_id);

        tracing::info!(order_id = %request.order_id(), payment_id = %payment_id, amount = request.amount(), "Dummy provider confirmed payment");
        let notification = self.notification_for(request.order_id(), &payment_id, "CONFIRMED", request.amount())?;
        let body = serde_json::to_vec(&notification).map_err(|e| PaymentError::InvalidData(e.to_string()))?;
        let verified = self.verifier.verify_body(&body)?;
        self.events.payment_updated(&verified).await.map_err(PaymentError::Events)?;

        Ok(Checkout {
            order_id: request.order_id().to_string(),
            payment_id,
            payment_url: payment_url.to_string(),
            status: PaymentStatus::Confirmed,
        })
    }

    async fn get_payment_state(&self, payment_id: &str, _cancel: &CancellationToken) -> Result<PaymentState> {
        let order_id = parse_payment_id(payment_id)?;
        Ok(PaymentState {
            payment_id: payment_id.to_string(),
            order_id: Some(order_id),
            status: PaymentStatus::Confirmed,
            gateway_status: "CONFIRMED".to_string(),
            amount: None,
        })
    }

    async fn cancel_payment(&self, payment_id: &str, amount: Option<Decimal>, _cancel: &CancellationToken) -> Result<PaymentState> {
        let order_id = parse_payment_id(payment_id)?;
        if amount.is_some_and(|a| a <= Decimal::ZERO) {
            return Err(PaymentError::InvalidData("refund amount must be positive".to_string()));
        }
        let gateway_status = if amount.is_some() { "PARTIAL_REFUNDED" } else { "REFUNDED" };

        tracing::info!(order_id = %order_id, payment_id = %payment_id, ?amount, "Dummy provider refunded payment");

        Ok(PaymentState {
            payment_id: payment_id.to_string(),
            order_id: Some(order_id),
            status: PaymentStatus::Refunded,
            gateway_status: gateway_status.to_string(),
            amount,
        })
    }

    fn validate_webhook(&self, body: &[u8]) -> Result<VerifiedNotification> {
        Ok(self.verifier.verify_body(body)?)
    }
}
