//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub brand: String,
    pub category: String,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub images: Vec<String>,
    pub price: Decimal,
    pub total_qty: i32,
    pub total_sold: i32,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable catalogue fields shared by create and update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub brand: String,
    pub category: String,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub images: Vec<String>,
    pub price: Decimal,
    pub total_qty: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)] pub struct Review {
    #[serde(rename = "_id")] pub id: Uuid,
    #[serde(rename = "product")] pub product_id: Uuid,
    #[serde(rename = "user")] pub user_id: Uuid,
    pub message: String,
    pub rating: u8,
    #[serde(rename = "createdAt")] pub created_at: DateTime<Utc>,
}

/// Product with its reviews and derived counters, as returned to clients.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub qty_left: i32,
    pub total_reviews: usize,
    pub average_rating: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<Review>>,
}

impl Product {
    pub fn create(draft: ProductDraft, user_id: Uuid) -> Result<Self, ProductError> {
        draft.check()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(), name: draft.name, description: draft.description, brand: draft.brand.to_lowercase(),
            category: draft.category, sizes: draft.sizes, colors: draft.colors, images: draft.images,
            price: draft.price, total_qty: draft.total_qty, total_sold: 0, user_id, created_at: now, updated_at: now,
        })
    }

    pub fn revise(&mut self, draft: ProductDraft) -> Result<(), ProductError> {
        draft.check()?;
        self.name = draft.name;
        self.description = draft.description;
        self.brand = draft.brand.to_lowercase();
        self.category = draft.category;
        self.sizes = draft.sizes;
        self.colors = draft.colors;
        self.images = draft.images;
        self.price = draft.price;
        self.total_qty = draft.total_qty;
        self.touch();
        Ok(())
    }

    pub fn qty_left(&self) -> i32 { self.total_qty - self.total_sold }

    pub fn record_sale(&mut self, qty: u32) {
        self.total_sold = self.total_sold.saturating_add(i32::try_from(qty).unwrap_or(i32::MAX));
        self.touch();
    }

    pub fn view(self, reviews: Vec<Review>, include_reviews: bool) -> ProductView {
        let average_rating = if reviews.is_empty() {
            None
        } else {
            let sum: u32 = reviews.iter().map(|r| u32::from(r.rating)).sum();
            Some((Decimal::from(sum) / Decimal::from(reviews.len())).round_dp(1))
        };
        ProductView {
            qty_left: self.qty_left(),
            total_reviews: reviews.len(),
            average_rating,
            reviews: include_reviews.then_some(reviews),
            product: self,
        }
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl ProductDraft {
    fn check(&self) -> Result<(), ProductError> {
        if self.name.trim().is_empty() { return Err(ProductError::MissingName); }
        if self.price < Decimal::ZERO { return Err(ProductError::NegativePrice); }
        if self.total_qty < 0 { return Err(ProductError::NegativeQuantity); }
        Ok(())
    }
}

impl Review {
    pub fn new(product_id: Uuid, user_id: Uuid, message: impl Into<String>, rating: u8) -> Self {
        Self { id: Uuid::now_v7(), product_id, user_id, message: message.into(), rating, created_at: Utc::now() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { MissingName, NegativePrice, NegativeQuantity }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Missing name"),
            Self::NegativePrice => write!(f, "Price must not be negative"),
            Self::NegativeQuantity => write!(f, "Quantity must not be negative"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft { name: "Hoodie".into(), brand: "Acme".into(), price: Decimal::new(4999, 2), total_qty: 10, ..Default::default() }
    }

    #[test]
    fn test_product_create() {
        let p = Product::create(draft(), Uuid::now_v7()).unwrap();
        assert_eq!(p.name, "Hoodie");
        assert_eq!(p.brand, "acme");
        assert_eq!(p.total_sold, 0);
    }

    #[test]
    fn test_record_sale() {
        let mut p = Product::create(draft(), Uuid::now_v7()).unwrap();
        p.record_sale(3);
        p.record_sale(2);
        assert_eq!(p.total_sold, 5);
        assert_eq!(p.qty_left(), 5);
    }

    #[test]
    fn test_rejects_bad_draft() {
        let bad = ProductDraft { name: " ".into(), ..draft() };
        assert_eq!(Product::create(bad, Uuid::now_v7()).unwrap_err(), ProductError::MissingName);
        let bad = ProductDraft { price: Decimal::NEGATIVE_ONE, ..draft() };
        assert_eq!(Product::create(bad, Uuid::now_v7()).unwrap_err(), ProductError::NegativePrice);
    }

    #[test]
    fn test_view_average_rating() {
        let p = Product::create(draft(), Uuid::now_v7()).unwrap();
        let reviews = vec![Review::new(p.id, Uuid::now_v7(), "ok", 4), Review::new(p.id, Uuid::now_v7(), "great", 5)];
        let view = p.view(reviews, false);
        assert_eq!(view.average_rating, Some(Decimal::new(45, 1)));
        assert_eq!(view.total_reviews, 2);
        assert!(view.reviews.is_none());
    }
}
