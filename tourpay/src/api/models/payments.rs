//! API request models for payment endpoints.

use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::payments::PaymentIntent;

/// Request to start paying for a booking.
///
/// Missing fields are reported by the request builder so that every validation failure
/// produces the same 400 response shape. There is no notification URL: the gateway always
/// notifies the URL from server configuration.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CreatePaymentRequest {
    /// Amount in rubles, e.g. `"1500.00"` or `1500`
    #[schema(value_type = String, example = "1500.00")]
    pub amount: Option<Decimal>,
    /// Booking identifier, unique per payment attempt
    #[schema(example = "tour-42")]
    pub order_id: String,
    #[schema(example = "City walk, 14 June")]
    pub description: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Customer identifier at the gateway; defaults to `order_id`
    pub customer_key: Option<String>,
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
}

impl From<CreatePaymentRequest> for PaymentIntent {
    fn from(request: CreatePaymentRequest) -> Self {
        PaymentIntent {
            amount: request.amount,
            order_id: request.order_id,
            description: request.description,
            full_name: request.full_name,
            email: request.email,
            phone: request.phone,
            customer_key: request.customer_key,
            success_url: request.success_url,
            fail_url: request.fail_url,
            notification_url: None,
        }
    }
}

/// Request to cancel or refund a payment.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CancelPaymentRequest {
    /// Partial refund in rubles; omit to cancel the whole payment
    #[schema(value_type = Option<String>, example = "500.00")]
    pub amount: Option<Decimal>,
}
