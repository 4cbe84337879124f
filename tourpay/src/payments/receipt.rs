//! Fiscal receipt (54-FZ) attached to payment initialization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum length of a receipt line item name, in characters.
pub const ITEM_NAME_MAX_CHARS: usize = 128;

/// Merchant's tax regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Taxation {
    /// General regime
    Osn,
    /// Simplified, income
    #[default]
    UsnIncome,
    /// Simplified, income minus expenses
    UsnIncomeOutcome,
    /// Unified agricultural tax
    Esn,
    /// Patent
    Patent,
}

/// VAT rate of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaxRate {
    #[default]
    None,
    Vat0,
    Vat5,
    Vat7,
    Vat10,
    Vat20,
    Vat105,
    Vat107,
    Vat110,
    Vat120,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    FullPrepayment,
    Prepayment,
    Advance,
    FullPayment,
    PartialPayment,
    Credit,
    CreditPayment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentObject {
    Commodity,
    Excise,
    Job,
    #[default]
    Service,
    GamblingBet,
    GamblingPrize,
    Lottery,
    LotteryPrize,
    IntellectualActivity,
    Payment,
    AgentCommission,
    Composite,
    Another,
}

/// Receipt settings applied to every line item the builder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiptDefaults {
    pub taxation: Taxation,
    pub tax: TaxRate,
    pub payment_method: PaymentMethod,
    pub payment_object: PaymentObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct Receipt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub taxation: Taxation,
    pub items: Vec<ReceiptItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiptItem {
    pub name: String,
    /// Unit price in minor units
    pub price: i64,
    pub quantity: u32,
    /// `price * quantity` in minor units
    pub amount: i64,
    pub tax: TaxRate,
    pub payment_method: PaymentMethod,
    pub payment_object: PaymentObject,
}

impl ReceiptItem {
    /// A single-unit line whose amount equals its price.
    pub fn single(name: String, price: i64, defaults: &ReceiptDefaults) -> Self {
        Self {
            name,
            price,
            quantity: 1,
            amount: price,
            tax: defaults.tax,
            payment_method: defaults.payment_method,
            payment_object: defaults.payment_object,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_receipt_wire_format() {
        let defaults = ReceiptDefaults::default();
        let receipt = Receipt {
            email: Some("guest@example.com".to_string()),
            phone: None,
            taxation: defaults.taxation,
            items: vec![ReceiptItem::single("City walk".to_string(), 150000, &defaults)],
        };

        assert_eq!(
            serde_json::to_value(&receipt).unwrap(),
            json!({
                "Email": "guest@example.com",
                "Taxation": "usn_income",
                "Items": [{
                    "Name": "City walk",
                    "Price": 150000,
                    "Quantity": 1,
                    "Amount": 150000,
                    "Tax": "none",
                    "PaymentMethod": "full_prepayment",
                    "PaymentObject": "service"
                }]
            })
        );
    }

    #[test]
    fn test_vat_rates_serialize_like_the_gateway_expects() {
        assert_eq!(serde_json::to_value(TaxRate::Vat20).unwrap(), json!("vat20"));
        assert_eq!(serde_json::to_value(TaxRate::Vat120).unwrap(), json!("vat120"));
    }
}
