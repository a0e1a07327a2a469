//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub fullname: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_admin: bool,
    pub has_shipping_address: bool,
    pub shipping_address: Option<ShippingAddress>,
    pub orders: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 1, message = "first name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "postal code is required"))]
    pub postal_code: String,
    #[serde(default)]
    pub province: String,
    #[validate(length(min = 1, message = "country is required"))]
    pub country: String,
    #[serde(default)]
    pub phone: String,
}

impl User {
    pub fn register(fullname: impl Into<String>, email: &str, password_hash: String, is_admin: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), fullname: fullname.into(), email: normalize_email(email), password_hash, is_admin,
            has_shipping_address: false, shipping_address: None, orders: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn set_shipping_address(&mut self, address: ShippingAddress) {
        self.shipping_address = Some(address);
        self.has_shipping_address = true;
        self.touch();
    }

    /// Links an order to the user; linking the same order twice is a no-op.
    pub fn add_order(&mut self, order_id: Uuid) {
        if !self.orders.contains(&order_id) { self.orders.push(order_id); self.touch(); }
    }

    pub fn remove_order(&mut self, order_id: Uuid) { self.orders.retain(|id| *id != order_id); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_defaults() {
        let u = User::register("Ada", " Ada@Example.com ", "hash".into(), false);
        assert_eq!(u.email, "ada@example.com");
        assert!(!u.has_shipping_address);
        assert!(u.orders.is_empty());
    }

    #[test]
    fn test_add_order_once() {
        let mut u = User::register("Ada", "ada@example.com", "hash".into(), false);
        let id = Uuid::now_v7();
        u.add_order(id);
        u.add_order(id);
        assert_eq!(u.orders, vec![id]);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let u = User::register("Ada", "ada@example.com", "secret-hash".into(), true);
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["isAdmin"], true);
    }

    #[test]
    fn test_shipping_address_sets_flag() {
        let mut u = User::register("Ada", "ada@example.com", "hash".into(), false);
        u.set_shipping_address(ShippingAddress { first_name: "Ada".into(), city: "London".into(), ..Default::default() });
        assert!(u.has_shipping_address);
    }
}
