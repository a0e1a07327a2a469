//! Aggregates module
pub mod product;
pub mod order;
pub mod coupon;
pub mod user;

pub use product::{Product, ProductDraft, ProductError, ProductView, Review};
pub use order::{Order, OrderError, OrderItem, FulfillmentStatus, PaymentStatus, PaymentUpdate};
pub use coupon::{Coupon, CouponError, CouponView};
pub use user::{User, ShippingAddress};
