//! Persistence boundary.
//!
//! [`Store`] is the collection store every handler and the order workflow
//! talk to. [`PgStore`] backs it with PostgreSQL; [`MemoryStore`] keeps
//! everything in process for local runs without a database and for tests.
//!
//! Multi-document writes that belong together (`commit_order`,
//! `apply_payment`) are single trait calls so each backend can make them
//! atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::aggregates::{Coupon, FulfillmentStatus, Order, PaymentUpdate, Product, Review, ShippingAddress, User};
use crate::domain::stats::SalesStats;
use crate::domain::value_objects::CouponCode;
use crate::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn update_shipping_address(&self, id: Uuid, address: &ShippingAddress) -> Result<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> Result<bool>;

    async fn create_product(&self, product: &Product) -> Result<()>;
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>>;
    /// Batched lookup; ids without a product are simply absent from the result.
    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;
    /// Matching page, newest first, plus the total number of matches.
    async fn list_products(&self, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, u64)>;
    async fn update_product(&self, product: &Product) -> Result<bool>;
    async fn delete_product(&self, id: Uuid) -> Result<bool>;

    /// Fails with `Conflict` when the user already reviewed the product.
    async fn create_review(&self, review: &Review) -> Result<()>;
    async fn list_reviews(&self, product_id: Uuid) -> Result<Vec<Review>>;

    /// Fails with `Conflict` when the code is taken.
    async fn create_coupon(&self, coupon: &Coupon) -> Result<()>;
    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>>;
    async fn find_coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>>;
    async fn list_coupons(&self) -> Result<Vec<Coupon>>;
    async fn update_coupon(&self, coupon: &Coupon) -> Result<bool>;
    async fn delete_coupon(&self, id: Uuid) -> Result<bool>;

    /// Inserts the order, bumps each product's sold counter by the ordered
    /// quantity and links the order to its user, all or nothing.
    async fn commit_order(&self, order: &Order) -> Result<()>;
    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn list_orders(&self) -> Result<Vec<Order>>;
    async fn find_orders(&self, ids: &[Uuid]) -> Result<Vec<Order>>;
    async fn update_order_status(&self, id: Uuid, status: FulfillmentStatus) -> Result<Option<Order>>;
    /// Removes the order and unlinks it from its user.
    async fn delete_order(&self, id: Uuid) -> Result<bool>;

    /// Records `event_id` and applies the payment facts to the order, once per event.
    async fn apply_payment(&self, event_id: &str, order_id: Uuid, update: &PaymentUpdate) -> Result<PaymentOutcome>;
    async fn sales_stats(&self, today_start: DateTime<Utc>) -> Result<SalesStats>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum PaymentOutcome {
    Applied(Order),
    /// The event id was processed before.
    Duplicate,
    /// The order was already marked paid by an earlier event.
    AlreadyPaid,
    OrderNotFound,
}

/// Catalogue filters. Text filters are case-insensitive substring matches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle.as_ref().map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
        };
        let any = |values: &[String], needle: &Option<String>| {
            needle.is_none() || values.iter().any(|v| contains(v, needle))
        };
        contains(&product.name, &self.name)
            && contains(&product.brand, &self.brand)
            && contains(&product.category, &self.category)
            && any(&product.colors, &self.color)
            && any(&product.sizes, &self.size)
            && self.price_min.map_or(true, |min| product.price >= min)
            && self.price_max.map_or(true, |max| product.price <= max)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    /// Clamps to page >= 1 and 1 <= limit <= 100.
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page: page.max(1), limit: limit.clamp(1, Self::MAX_LIMIT) }
    }
    pub fn offset(&self) -> u64 { u64::from(self.page - 1) * u64::from(self.limit) }
}

impl Default for Page {
    fn default() -> Self { Self::new(1, 10) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ProductDraft;

    fn product() -> Product {
        Product::create(ProductDraft {
            name: "Classic Hoodie".into(), brand: "Acme".into(), category: "Men".into(),
            sizes: vec!["S".into(), "XL".into()], colors: vec!["Black".into()],
            price: Decimal::new(45, 0), total_qty: 3, ..Default::default()
        }, Uuid::now_v7()).unwrap()
    }

    #[test]
    fn test_filter_matches() {
        let p = product();
        assert!(ProductFilter::default().matches(&p));
        assert!(ProductFilter { name: Some("hood".into()), color: Some("BLACK".into()), ..Default::default() }.matches(&p));
        assert!(ProductFilter { size: Some("xl".into()), price_min: Some(Decimal::new(45, 0)), ..Default::default() }.matches(&p));
        assert!(!ProductFilter { brand: Some("nike".into()), ..Default::default() }.matches(&p));
        assert!(!ProductFilter { price_max: Some(Decimal::new(40, 0)), ..Default::default() }.matches(&p));
    }

    #[test]
    fn test_page_clamps() {
        assert_eq!(Page::new(0, 0), Page { page: 1, limit: 1 });
        assert_eq!(Page::new(3, 500).offset(), 200);
    }
}
