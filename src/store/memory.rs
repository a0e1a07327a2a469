//! In-process store. Every call takes one lock, so multi-document writes are atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Page, PaymentOutcome, ProductFilter, Store};
use crate::domain::aggregates::{Coupon, FulfillmentStatus, Order, PaymentUpdate, Product, Review, ShippingAddress, User};
use crate::domain::stats::SalesStats;
use crate::domain::value_objects::CouponCode;
use crate::{EcommerceError, Result};

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    products: HashMap<Uuid, Product>,
    reviews: Vec<Review>,
    coupons: HashMap<Uuid, Coupon>,
    orders: HashMap<Uuid, Order>,
    processed_events: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut db = self.inner.write().await;
        if db.users.values().any(|u| u.email == user.email) {
            return Err(EcommerceError::Conflict("User already exists".into()));
        }
        db.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_shipping_address(&self, id: Uuid, address: &ShippingAddress) -> Result<Option<User>> {
        let mut db = self.inner.write().await;
        Ok(db.users.get_mut(&id).map(|user| {
            user.set_shipping_address(address.clone());
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }

    async fn create_product(&self, product: &Product) -> Result<()> {
        let mut db = self.inner.write().await;
        if db.products.values().any(|p| p.name == product.name) {
            return Err(EcommerceError::Conflict("Product already exists".into()));
        }
        db.products.insert(product.id, product.clone());
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn find_product_by_name(&self, name: &str) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.values().find(|p| p.name == name).cloned())
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let db = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| db.products.get(id).cloned()).collect())
    }

    async fn list_products(&self, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, u64)> {
        let db = self.inner.read().await;
        let matching: Vec<Product> = db.products.values().filter(|p| filter.matches(p)).cloned().collect();
        let total = matching.len() as u64;
        let items = newest_first(matching, |p| p.created_at)
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok((items, total))
    }

    async fn update_product(&self, product: &Product) -> Result<bool> {
        let mut db = self.inner.write().await;
        if db.products.values().any(|p| p.id != product.id && p.name == product.name) {
            return Err(EcommerceError::Conflict("Product already exists".into()));
        }
        Ok(match db.products.get_mut(&product.id) {
            Some(existing) => {
                // sold counter is owned by order placement
                let total_sold = existing.total_sold;
                *existing = Product { total_sold, ..product.clone() };
                true
            }
            None => false,
        })
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let mut db = self.inner.write().await;
        db.reviews.retain(|r| r.product_id != id);
        Ok(db.products.remove(&id).is_some())
    }

    async fn create_review(&self, review: &Review) -> Result<()> {
        let mut db = self.inner.write().await;
        if !db.products.contains_key(&review.product_id) {
            return Err(EcommerceError::not_found("Product"));
        }
        if db.reviews.iter().any(|r| r.product_id == review.product_id && r.user_id == review.user_id) {
            return Err(EcommerceError::Conflict("You have already reviewed this product".into()));
        }
        db.reviews.push(review.clone());
        Ok(())
    }

    async fn list_reviews(&self, product_id: Uuid) -> Result<Vec<Review>> {
        let db = self.inner.read().await;
        Ok(db.reviews.iter().filter(|r| r.product_id == product_id).cloned().collect())
    }

    async fn create_coupon(&self, coupon: &Coupon) -> Result<()> {
        let mut db = self.inner.write().await;
        if db.coupons.values().any(|c| c.code == coupon.code) {
            return Err(EcommerceError::Conflict("Coupon already exists".into()));
        }
        db.coupons.insert(coupon.id, coupon.clone());
        Ok(())
    }

    async fn find_coupon(&self, id: Uuid) -> Result<Option<Coupon>> {
        Ok(self.inner.read().await.coupons.get(&id).cloned())
    }

    async fn find_coupon_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>> {
        Ok(self.inner.read().await.coupons.values().find(|c| &c.code == code).cloned())
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>> {
        let coupons: Vec<Coupon> = self.inner.read().await.coupons.values().cloned().collect();
        Ok(newest_first(coupons, |c: &Coupon| c.created_at))
    }

    async fn update_coupon(&self, coupon: &Coupon) -> Result<bool> {
        let mut db = self.inner.write().await;
        if db.coupons.values().any(|c| c.id != coupon.id && c.code == coupon.code) {
            return Err(EcommerceError::Conflict("Coupon already exists".into()));
        }
        Ok(match db.coupons.get_mut(&coupon.id) {
            Some(existing) => { *existing = coupon.clone(); true }
            None => false,
        })
    }

    async fn delete_coupon(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.write().await.coupons.remove(&id).is_some())
    }

    async fn commit_order(&self, order: &Order) -> Result<()> {
        let mut db = self.inner.write().await;
        let quantities = order.quantities();
        // validate everything before touching anything
        if let Some((missing, _)) = quantities.iter().find(|(id, _)| !db.products.contains_key(id)) {
            return Err(EcommerceError::Validation(format!("Product {missing} not found")));
        }
        if !db.users.contains_key(&order.user_id) {
            return Err(EcommerceError::not_found("User"));
        }
        for (product_id, qty) in quantities {
            if let Some(product) = db.products.get_mut(&product_id) {
                product.record_sale(qty);
            }
        }
        if let Some(user) = db.users.get_mut(&order.user_id) {
            user.add_order(order.id);
        }
        db.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let orders: Vec<Order> = self.inner.read().await.orders.values().cloned().collect();
        Ok(newest_first(orders, |o: &Order| o.created_at))
    }

    async fn find_orders(&self, ids: &[Uuid]) -> Result<Vec<Order>> {
        let db = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| db.orders.get(id).cloned()).collect())
    }

    async fn update_order_status(&self, id: Uuid, status: FulfillmentStatus) -> Result<Option<Order>> {
        let mut db = self.inner.write().await;
        Ok(db.orders.get_mut(&id).map(|order| {
            order.set_status(status);
            order.clone()
        }))
    }

    async fn delete_order(&self, id: Uuid) -> Result<bool> {
        let mut db = self.inner.write().await;
        let Some(order) = db.orders.remove(&id) else { return Ok(false) };
        if let Some(user) = db.users.get_mut(&order.user_id) {
            user.remove_order(id);
        }
        Ok(true)
    }

    async fn apply_payment(&self, event_id: &str, order_id: Uuid, update: &PaymentUpdate) -> Result<PaymentOutcome> {
        let mut db = self.inner.write().await;
        if !db.processed_events.insert(event_id.to_string()) {
            return Ok(PaymentOutcome::Duplicate);
        }
        let Some(order) = db.orders.get_mut(&order_id) else { return Ok(PaymentOutcome::OrderNotFound) };
        if order.payment_status.is_paid() {
            return Ok(PaymentOutcome::AlreadyPaid);
        }
        order.apply_payment(update);
        Ok(PaymentOutcome::Applied(order.clone()))
    }

    async fn sales_stats(&self, today_start: DateTime<Utc>) -> Result<SalesStats> {
        let db = self.inner.read().await;
        SalesStats::fold(db.orders.values().map(|o| (o.total_price, o.created_at)), today_start)
            .ok_or_else(|| EcommerceError::Internal("sales totals overflow".into()))
    }
}
