//! Tinkoff Acquiring provider: builder, client and verifier bound to one terminal.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::TinkoffConfig;
use crate::payment_providers::{Checkout, PaymentError, PaymentProvider, PaymentState, Result};
use crate::payments::builder::RedirectUrls;
use crate::payments::{
    GatewayCredentials, GatewayError, GatewayResponse, PaymentIntent, PaymentRequestBuilder, PaymentStatus, TinkoffClient,
    VerifiedNotification, WebhookVerifier, amount,
};

pub struct TinkoffProvider {
    builder: PaymentRequestBuilder,
    client: TinkoffClient,
    verifier: WebhookVerifier,
}

impl TinkoffProvider {
    /// `notification_url` is the default target for status notifications; intents may override it.
    pub fn new(config: &TinkoffConfig, notification_url: Option<Url>) -> std::result::Result<Self, GatewayError> {
        let credentials = Arc::new(GatewayCredentials::new(&config.terminal_key, &config.password));

        let builder = PaymentRequestBuilder::new(credentials.clone())
            .with_default_urls(RedirectUrls {
                success_url: config.success_url.as_ref().map(Url::to_string),
                fail_url: config.fail_url.as_ref().map(Url::to_string),
                notification_url: notification_url.map(String::from),
            })
            .with_receipt_defaults(config.receipt);
        let client = TinkoffClient::new(config.api_base.clone(), config.timeout, credentials.clone())?;

        tracing::info!(terminal_key = %config.terminal_key, api_base = %config.api_base, "Configured Tinkoff payment provider");

        Ok(Self {
            builder,
            client,
            verifier: WebhookVerifier::new(credentials),
        })
    }
}

/// Turn a gateway response for an existing payment into a [`PaymentState`].
fn payment_state(payment_id: &str, response: GatewayResponse) -> PaymentState {
    let gateway_status = response.status.unwrap_or_default();
    PaymentState {
        payment_id: response.payment_id.unwrap_or_else(|| payment_id.to_string()),
        order_id: response.order_id,
        status: PaymentStatus::from_gateway(&gateway_status),
        gateway_status,
        amount: response.amount.map(amount::to_major_units),
    }
}

#[async_trait]
impl PaymentProvider for TinkoffProvider {
    #[tracing::instrument(skip_all, fields(order_id = %intent.order_id))]
    async fn create_payment(&self, intent: PaymentIntent, cancel: &CancellationToken) -> Result<Checkout> {
        let request = self.builder.build(intent)?;
        let response = self.client.init(&request, cancel).await?;

        let payment_id = response
            .payment_id
            .ok_or_else(|| GatewayError::Decode("Init response has no PaymentId".to_string()))?;
        let payment_url = response
            .payment_url
            .ok_or_else(|| GatewayError::Decode("Init response has no PaymentURL".to_string()))?;
        let status = response.status.as_deref().map_or(PaymentStatus::Pending, PaymentStatus::from_gateway);

        Ok(Checkout {
            order_id: response.order_id.unwrap_or_else(|| request.order_id().to_string()),
            payment_id,
            payment_url,
            status,
        })
    }

    async fn get_payment_state(&self, payment_id: &str, cancel: &CancellationToken) -> Result<PaymentState> {
        let response = self.client.get_state(payment_id, cancel).await?;
        Ok(payment_state(payment_id, response))
    }

    async fn cancel_payment(&self, payment_id: &str, refund: Option<Decimal>, cancel: &CancellationToken) -> Result<PaymentState> {
        let minor = match refund {
            Some(value) if value <= Decimal::ZERO => {
                return Err(PaymentError::InvalidData(format!("refund amount must be positive, got {value}")));
            }
            Some(value) => Some(
                amount::to_minor_units(value)
                    .filter(|minor| *minor > 0)
                    .ok_or_else(|| PaymentError::InvalidData(format!("refund amount {value} is out of range")))?,
            ),
            None => None,
        };

        let response = self.client.cancel(payment_id, minor, cancel).await?;
        Ok(payment_state(payment_id, response))
    }

    fn validate_webhook(&self, body: &[u8]) -> Result<VerifiedNotification> {
        Ok(self.verifier.verify_body(body)?)
    }
}
