//! Assembly and signing of `Init` requests.
//!
//! The builder validates a [`PaymentIntent`], fixes the sign-relevant fields
//! (`TerminalKey`, `Amount`, `OrderId`, `Description`), computes the token and only then
//! attaches the pass-through fields (customer key, redirect URLs, payer data, receipt).
//! A [`PaymentRequest`] is immutable once built; changing anything means building again.

use std::sync::Arc;

use bon::Builder;
use rust_decimal::Decimal;
use serde::Serialize;
use url::Url;

use super::receipt::{ITEM_NAME_MAX_CHARS, Receipt, ReceiptDefaults, ReceiptItem};
use super::signature::{self, FieldValue, SignOperation, SignatureError};
use super::{GatewayCredentials, amount, truncate_chars};

/// Maximum `Description` length accepted by the gateway, in characters.
pub const DESCRIPTION_MAX_CHARS: usize = 250;

/// What the booking flow wants to charge for.
///
/// ```
/// use rust_decimal::Decimal;
/// use tourpay::payments::PaymentIntent;
///
/// let intent = PaymentIntent::builder()
///     .amount(Decimal::new(1500, 0))
///     .order_id("tour-42")
///     .description("City walk")
///     .email("guest@example.com")
///     .build();
/// assert_eq!(intent.order_id, "tour-42");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Builder)]
pub struct PaymentIntent {
    /// Amount in major units (rubles)
    pub amount: Option<Decimal>,
    #[builder(into, default)]
    pub order_id: String,
    #[builder(into, default)]
    pub description: String,
    /// Sent as `DATA.Name` and prefixed to the receipt item name; the signed `Description` is left as is
    #[builder(into)]
    pub full_name: Option<String>,
    #[builder(into)]
    pub email: Option<String>,
    #[builder(into)]
    pub phone: Option<String>,
    #[builder(into)]
    pub customer_key: Option<String>,
    #[builder(into)]
    pub success_url: Option<String>,
    #[builder(into)]
    pub fail_url: Option<String>,
    #[builder(into)]
    pub notification_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("amount {0} is out of range")]
    AmountOutOfRange(Decimal),

    #[error("{field} is not a valid URL: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

/// Redirect and notification targets used when an intent does not carry its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectUrls {
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub notification_url: Option<String>,
}

/// Payer details forwarded in the `DATA` block; never signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PayerData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A signed `Init` request, serialized exactly as the gateway expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentRequest {
    terminal_key: String,
    amount: i64,
    order_id: String,
    description: String,
    token: String,
    customer_key: String,
    #[serde(rename = "SuccessURL", skip_serializing_if = "Option::is_none")]
    success_url: Option<String>,
    #[serde(rename = "FailURL", skip_serializing_if = "Option::is_none")]
    fail_url: Option<String>,
    #[serde(rename = "NotificationURL", skip_serializing_if = "Option::is_none")]
    notification_url: Option<String>,
    #[serde(rename = "DATA", skip_serializing_if = "Option::is_none")]
    data: Option<PayerData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipt: Option<Receipt>,
}

impl PaymentRequest {
    pub fn terminal_key(&self) -> &str {
        &self.terminal_key
    }

    /// Amount in minor units
    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn customer_key(&self) -> &str {
        &self.customer_key
    }

    pub fn success_url(&self) -> Option<&str> {
        self.success_url.as_deref()
    }

    pub fn fail_url(&self) -> Option<&str> {
        self.fail_url.as_deref()
    }

    pub fn notification_url(&self) -> Option<&str> {
        self.notification_url.as_deref()
    }

    pub fn full_name(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.name.as_deref())
    }

    pub fn email(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.email.as_deref())
    }

    pub fn phone(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.phone.as_deref())
    }

    pub fn receipt(&self) -> Option<&Receipt> {
        self.receipt.as_ref()
    }
}

/// Turns [`PaymentIntent`]s into signed [`PaymentRequest`]s for one terminal.
#[derive(Debug, Clone)]
pub struct PaymentRequestBuilder {
    credentials: Arc<GatewayCredentials>,
    default_urls: RedirectUrls,
    receipt_defaults: ReceiptDefaults,
}

impl PaymentRequestBuilder {
    pub fn new(credentials: Arc<GatewayCredentials>) -> Self {
        Self {
            credentials,
            default_urls: RedirectUrls::default(),
            receipt_defaults: ReceiptDefaults::default(),
        }
    }

    pub fn with_default_urls(mut self, urls: RedirectUrls) -> Self {
        self.default_urls = urls;
        self
    }

    pub fn with_receipt_defaults(mut self, receipt_defaults: ReceiptDefaults) -> Self {
        self.receipt_defaults = receipt_defaults;
        self
    }

    /// Validate, normalize and sign.
    pub fn build(&self, intent: PaymentIntent) -> Result<PaymentRequest, ValidationError> {
        let ValidatedIntent {
            amount,
            order_id,
            description,
            success_url,
            fail_url,
            notification_url,
        } = self.validate(&intent)?;

        let description = truncate_chars(&description, DESCRIPTION_MAX_CHARS);
        let terminal_key = self.credentials.terminal_key().to_string();

        let token = signature::sign(
            SignOperation::Init,
            [
                ("TerminalKey", FieldValue::from(terminal_key.as_str())),
                ("Amount", FieldValue::from(amount)),
                ("OrderId", FieldValue::from(order_id.as_str())),
                ("Description", FieldValue::from(description.as_str())),
            ],
            self.credentials.password(),
        )?;

        // Everything below is pass-through and must not feed back into the token.
        let full_name = intent.full_name.as_deref().and_then(non_empty);
        let email = intent.email.as_deref().and_then(non_empty);
        let phone = intent.phone.as_deref().and_then(normalize_phone);
        let customer_key = intent.customer_key.as_deref().and_then(non_empty).unwrap_or_else(|| order_id.clone());

        let receipt = (email.is_some() || phone.is_some()).then(|| {
            let item_name = match &full_name {
                Some(name) => format!("{name}: {description}"),
                None => description.clone(),
            };
            Receipt {
                email: email.clone(),
                phone: phone.clone(),
                taxation: self.receipt_defaults.taxation,
                items: vec![ReceiptItem::single(
                    truncate_chars(&item_name, ITEM_NAME_MAX_CHARS),
                    amount,
                    &self.receipt_defaults,
                )],
            }
        });

        let data = (full_name.is_some() || email.is_some() || phone.is_some()).then(|| PayerData {
            name: full_name,
            email,
            phone,
        });

        tracing::debug!(order_id = %order_id, amount, has_receipt = receipt.is_some(), "Built payment request");

        Ok(PaymentRequest {
            terminal_key,
            amount,
            order_id,
            description,
            token,
            customer_key,
            success_url,
            fail_url,
            notification_url,
            data,
            receipt,
        })
    }

    /// Every check that can reject an intent. Runs to completion before anything is signed.
    fn validate(&self, intent: &PaymentIntent) -> Result<ValidatedIntent, ValidationError> {
        let amount_major = intent.amount.ok_or(ValidationError::MissingField("amount"))?;
        let order_id = non_empty(&intent.order_id).ok_or(ValidationError::MissingField("order_id"))?;
        let description = non_empty(&intent.description).ok_or(ValidationError::MissingField("description"))?;

        if amount_major <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(amount_major));
        }
        let amount = amount::to_minor_units(amount_major).ok_or(ValidationError::AmountOutOfRange(amount_major))?;
        if amount <= 0 {
            // Positive but below one kopeck
            return Err(ValidationError::NonPositiveAmount(amount_major));
        }

        Ok(ValidatedIntent {
            amount,
            order_id,
            description,
            success_url: pick_url("success_url", intent.success_url.as_deref(), &self.default_urls.success_url)?,
            fail_url: pick_url("fail_url", intent.fail_url.as_deref(), &self.default_urls.fail_url)?,
            notification_url: pick_url(
                "notification_url",
                intent.notification_url.as_deref(),
                &self.default_urls.notification_url,
            )?,
        })
    }
}

/// An intent that passed validation; amount already in minor units.
#[derive(Debug)]
struct ValidatedIntent {
    amount: i64,
    order_id: String,
    description: String,
    success_url: Option<String>,
    fail_url: Option<String>,
    notification_url: Option<String>,
}

/// Strip everything but digits from a phone number. Returns `None` if nothing is left.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    (!digits.is_empty()).then_some(digits)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn pick_url(field: &'static str, explicit: Option<&str>, fallback: &Option<String>) -> Result<Option<String>, ValidationError> {
    let Some(candidate) = explicit.and_then(non_empty).or_else(|| fallback.clone()) else {
        return Ok(None);
    };
    Url::parse(&candidate).map_err(|e| ValidationError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    Ok(Some(candidate))
}
