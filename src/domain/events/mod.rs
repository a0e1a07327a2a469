//! Domain events
use crate::domain::aggregates::{FulfillmentStatus, Order};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, user_id: Uuid, total: Decimal, currency: String },
    PaymentReconciled { order_id: Uuid, payment_status: String, total: Decimal, currency: String },
    StatusChanged { order_id: Uuid, status: FulfillmentStatus },
    Deleted { order_id: Uuid },
}

impl DomainEvent {
    pub fn order_placed(order: &Order) -> Self {
        Self::Order(OrderEvent::Placed { order_id: order.id, user_id: order.user_id, total: order.total_price, currency: order.currency.clone() })
    }

    pub fn payment_reconciled(order: &Order) -> Self {
        Self::Order(OrderEvent::PaymentReconciled {
            order_id: order.id, payment_status: order.payment_status.to_string(), total: order.total_price, currency: order.currency.clone(),
        })
    }

    /// Subject the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "ecommerce.orders.placed",
            Self::Order(OrderEvent::PaymentReconciled { .. }) => "ecommerce.orders.paid",
            Self::Order(OrderEvent::StatusChanged { .. }) => "ecommerce.orders.status_changed",
            Self::Order(OrderEvent::Deleted { .. }) => "ecommerce.orders.deleted",
        }
    }
}
