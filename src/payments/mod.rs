//! Hosted checkout integration.
//!
//! [`PaymentGateway`] creates checkout sessions; [`webhook`] verifies and
//! decodes the gateway's signed callbacks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::Order;
use crate::domain::value_objects::to_minor_units;
use crate::{EcommerceError, Result};

pub mod stripe;
pub mod webhook;

pub use stripe::StripeGateway;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutRequest {
    pub order_id: Uuid,
    pub currency: String,
    pub lines: Vec<CheckoutLine>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutLine {
    pub name: String,
    pub description: Option<String>,
    /// Price per unit in minor currency units.
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

impl CheckoutRequest {
    pub fn for_order(order: &Order, success_url: &str, cancel_url: &str) -> Result<Self> {
        let lines = order
            .order_items
            .iter()
            .map(|item| {
                let unit_amount = to_minor_units(item.price)
                    .ok_or_else(|| EcommerceError::Validation(format!("Price of {} is out of range", item.name)))?;
                Ok(CheckoutLine {
                    name: item.name.clone(),
                    description: item.description.clone().filter(|d| !d.trim().is_empty()),
                    unit_amount,
                    quantity: item.qty,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            order_id: order.id,
            currency: order.currency.clone(),
            lines,
            success_url: success_url.to_string(),
            cancel_url: cancel_url.to_string(),
        })
    }
}
