use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One cart line in the shape the engine accepts. The variant is addressed
/// by (storage, condition) on the product; there is deliberately no price
/// field, pricing is always resolved server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CheckoutItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub storage: String,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShippingAddressInput {
    pub full_name: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    Standard,
    Express,
    Priority,
}

impl ShippingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ShippingMethod::Standard => "standard",
            ShippingMethod::Express => "express",
            ShippingMethod::Priority => "priority",
        }
    }

    /// Flat shipping rate shown in the wizard summary.
    pub fn cost(self) -> Decimal {
        match self {
            ShippingMethod::Standard => dec!(0),
            ShippingMethod::Express => dec!(15),
            ShippingMethod::Priority => dec!(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Credit,
    Bank,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Credit => "credit",
            PaymentMethod::Bank => "bank",
        }
    }
}

/// The complete submission the review step sends to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub items: Vec<CheckoutItem>,
    pub shipping_address: ShippingAddressInput,
    pub shipping_method: ShippingMethod,
    pub payment_method: PaymentMethod,
    pub order_reference: String,
}
