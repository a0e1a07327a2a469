//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, ShippingAddress};
use crate::domain::value_objects::{Discount, MAX_AMOUNT};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub order_number: String,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub order_items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub total_price: Decimal,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub status: FulfillmentStatus,
    pub coupon_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line item as submitted by the client. Name, description and price are a display snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(alias = "_id")]
    pub product: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub qty: u32,
    pub price: Decimal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FulfillmentStatus { #[default] NotProcessed, Processing, Dispatched, Delivered, Cancelled }

/// Payment state as reported by the gateway. Unknown gateway values are kept verbatim.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus { #[default] NotPaid, Paid, Other(String) }

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self { Self::NotPaid => "not paid", Self::Paid => "paid", Self::Other(s) => s }
    }
    pub fn is_paid(&self) -> bool { matches!(self, Self::Paid) }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "not paid" | "unpaid" => Self::NotPaid,
            "paid" => Self::Paid,
            _ => Self::Other(value),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self { status.as_str().to_string() }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Payment facts extracted from a completed checkout session.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentUpdate {
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub total_price: Decimal,
    pub currency: String,
}

impl Order {
    /// Builds a new unpaid order. The charged total is the requested total less the coupon discount.
    pub fn place(
        user_id: Uuid,
        order_items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        requested_total: Decimal,
        coupon: Option<&Coupon>,
        currency: &str,
    ) -> Result<Self, OrderError> {
        if order_items.is_empty() { return Err(OrderError::NoItems); }
        if let Some(item) = order_items.iter().find(|i| i.qty == 0) { return Err(OrderError::InvalidQuantity(item.product)); }
        for item in &order_items {
            if item.price < Decimal::ZERO { return Err(OrderError::NegativePrice(item.product)); }
            if item.price > MAX_AMOUNT { return Err(OrderError::PriceOutOfRange(item.product)); }
        }
        if requested_total < Decimal::ZERO { return Err(OrderError::NegativeTotal); }
        if requested_total > MAX_AMOUNT { return Err(OrderError::TotalOutOfRange); }
        let discount = coupon.map(|c| c.discount).unwrap_or(Discount::NONE);
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            order_number: format!("ORD-{:08}", rand::random::<u32>() % 100_000_000),
            user_id,
            order_items,
            shipping_address,
            total_price: discount.apply(requested_total),
            currency: currency.to_string(),
            payment_status: PaymentStatus::NotPaid,
            payment_method: None,
            status: FulfillmentStatus::NotProcessed,
            coupon_code: coupon.map(|c| c.code.to_string()),
            created_at: now,
            updated_at: now,
        })
    }

    /// Quantity ordered per product, summed when a product appears on several lines.
    pub fn quantities(&self) -> Vec<(Uuid, u32)> {
        let mut out: Vec<(Uuid, u32)> = Vec::new();
        for item in &self.order_items {
            match out.iter_mut().find(|(id, _)| *id == item.product) {
                Some((_, qty)) => *qty += item.qty,
                None => out.push((item.product, item.qty)),
            }
        }
        out
    }

    pub fn apply_payment(&mut self, update: &PaymentUpdate) {
        self.payment_status = update.payment_status.clone();
        self.payment_method = update.payment_method.clone();
        self.total_price = update.total_price;
        self.currency = update.currency.clone();
        self.touch();
    }

    pub fn set_status(&mut self, status: FulfillmentStatus) { self.status = status; self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError {
    NoItems,
    InvalidQuantity(Uuid),
    NegativePrice(Uuid),
    PriceOutOfRange(Uuid),
    NegativeTotal,
    TotalOutOfRange,
}
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "No order items"),
            Self::InvalidQuantity(p) => write!(f, "Quantity for product {p} must be at least 1"),
            Self::NegativePrice(p) => write!(f, "Price for product {p} must not be negative"),
            Self::PriceOutOfRange(p) => write!(f, "Price for product {p} exceeds {MAX_AMOUNT}"),
            Self::NegativeTotal => write!(f, "Total price must not be negative"),
            Self::TotalOutOfRange => write!(f, "Total price exceeds {MAX_AMOUNT}"),
        }
    }
}
