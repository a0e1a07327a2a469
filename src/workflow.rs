//! Order workflow: placement with coupon discount, hosted checkout, payment
//! reconciliation from signed webhooks, and order administration.

use chrono::{Local, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::config::{CheckoutConfig, Config};
use crate::domain::aggregates::{FulfillmentStatus, Order, OrderItem, ShippingAddress};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::stats::{start_of_local_day, SalesStats};
use crate::domain::value_objects::CouponCode;
use crate::payments::webhook::{self, WebhookEvent};
use crate::payments::{CheckoutRequest, PaymentGateway};
use crate::publisher::EventPublisher;
use crate::store::{PaymentOutcome, Store};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug)]
pub struct WorkflowSettings {
    pub checkout: CheckoutConfig,
    pub webhook_secret: String,
    pub webhook_tolerance: Duration,
}

impl From<&Config> for WorkflowSettings {
    fn from(config: &Config) -> Self {
        Self {
            checkout: config.checkout.clone(),
            webhook_secret: config.stripe.webhook_secret.clone(),
            webhook_tolerance: config.stripe.webhook_tolerance,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PlaceOrder {
    pub coupon: Option<String>,
    pub order_items: Vec<OrderItem>,
    /// Falls back to the user's stored address when absent.
    pub shipping_address: Option<ShippingAddress>,
    pub total_price: Decimal,
}

#[derive(Clone, Debug)]
pub struct PlacedOrder {
    pub order: Order,
    pub checkout_url: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReconcileOutcome {
    Applied(Order),
    Duplicate,
    AlreadyPaid,
    OrderNotFound(Uuid),
    /// Event types other than a completed checkout.
    Ignored(String),
    /// Signed, but unreadable or missing required fields.
    Malformed,
}

pub struct OrderWorkflow {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    publisher: EventPublisher,
    settings: WorkflowSettings,
}

impl OrderWorkflow {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>, publisher: EventPublisher, settings: WorkflowSettings) -> Self {
        Self { store, gateway, publisher, settings }
    }

    #[tracing::instrument(skip(self, input), fields(coupon = input.coupon.as_deref()))]
    pub async fn place_order(&self, user_id: Uuid, input: PlaceOrder) -> Result<PlacedOrder> {
        let coupon = match input.coupon.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(raw) => {
                let code = CouponCode::new(raw).map_err(|_| EcommerceError::CouponNotFound)?;
                let coupon = self.store.find_coupon_by_code(&code).await?.ok_or(EcommerceError::CouponNotFound)?;
                if coupon.is_expired(Utc::now()) {
                    return Err(EcommerceError::CouponExpired);
                }
                Some(coupon)
            }
            None => None,
        };

        let user = self.store.find_user(user_id).await?.ok_or_else(|| EcommerceError::not_found("User"))?;
        let stored_address = match (user.has_shipping_address, user.shipping_address) {
            (true, Some(address)) => address,
            _ => return Err(EcommerceError::MissingShippingAddress),
        };

        let shipping_address = match input.shipping_address {
            Some(address) => {
                address.validate()?;
                address
            }
            None => stored_address,
        };

        let order = Order::place(
            user_id,
            input.order_items,
            shipping_address,
            input.total_price,
            coupon.as_ref(),
            &self.settings.checkout.currency,
        )?;

        let wanted: Vec<Uuid> = order.quantities().into_iter().map(|(id, _)| id).collect();
        let found = self.store.find_products(&wanted).await?;
        if let Some(missing) = wanted.iter().find(|id| !found.iter().any(|p| p.id == **id)) {
            return Err(EcommerceError::Validation(format!("Product {missing} not found")));
        }
        // priced before commit so every stored order can be checked out
        let request = self.checkout_request(&order)?;

        self.store.commit_order(&order).await?;
        tracing::info!(order_id = %order.id, total = %order.total_price, "order placed");
        self.publisher.publish(&DomainEvent::order_placed(&order)).await;

        let checkout_url = self.open_checkout(&request).await?;
        Ok(PlacedOrder { order, checkout_url })
    }

    /// New checkout session for an unpaid order owned by `user_id`.
    #[tracing::instrument(skip(self))]
    pub async fn retry_checkout(&self, user_id: Uuid, order_id: Uuid) -> Result<PlacedOrder> {
        let order = self
            .store
            .find_order(order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or_else(|| EcommerceError::not_found("Order"))?;
        if order.payment_status.is_paid() {
            return Err(EcommerceError::Conflict("Order is already paid".to_string()));
        }
        let request = self.checkout_request(&order)?;
        let checkout_url = self.open_checkout(&request).await?;
        Ok(PlacedOrder { order, checkout_url })
    }

    fn checkout_request(&self, order: &Order) -> Result<CheckoutRequest> {
        let checkout = &self.settings.checkout;
        CheckoutRequest::for_order(order, &checkout.success_url, &checkout.cancel_url)
    }

    async fn open_checkout(&self, request: &CheckoutRequest) -> Result<String> {
        match self.gateway.create_checkout_session(request).await {
            Ok(session) => Ok(session.url),
            Err(e) => {
                tracing::warn!(order_id = %request.order_id, error = %e, "checkout session failed, order kept for retry");
                Err(e)
            }
        }
    }

    /// Verifies and applies a gateway callback. Only a bad signature or a
    /// store failure is an error; everything else is acknowledged.
    #[tracing::instrument(skip_all)]
    pub async fn reconcile_payment(&self, payload: &[u8], signature: Option<&str>) -> Result<ReconcileOutcome> {
        webhook::verify_signature(
            payload,
            signature,
            &self.settings.webhook_secret,
            self.settings.webhook_tolerance,
            Utc::now().timestamp(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "webhook signature rejected");
            EcommerceError::InvalidSignature(e.to_string())
        })?;

        let event = match WebhookEvent::parse(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable webhook payload");
                return Ok(ReconcileOutcome::Malformed);
            }
        };
        if event.event_type != webhook::CHECKOUT_COMPLETED {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "ignoring webhook event");
            return Ok(ReconcileOutcome::Ignored(event.event_type));
        }
        let completed = match event.checkout_completed() {
            Ok(c) => c,
            Err(reason) => {
                tracing::warn!(event_id = %event.id, %reason, "incomplete checkout session");
                return Ok(ReconcileOutcome::Malformed);
            }
        };

        let outcome = self.store.apply_payment(&event.id, completed.order_id, &completed.payment_update()).await?;
        Ok(match outcome {
            PaymentOutcome::Applied(order) => {
                tracing::info!(event_id = %event.id, order_id = %order.id, status = %order.payment_status, "payment reconciled");
                self.publisher.publish(&DomainEvent::payment_reconciled(&order)).await;
                ReconcileOutcome::Applied(order)
            }
            PaymentOutcome::Duplicate => {
                tracing::info!(event_id = %event.id, "webhook event already processed");
                ReconcileOutcome::Duplicate
            }
            PaymentOutcome::AlreadyPaid => {
                tracing::info!(event_id = %event.id, order_id = %completed.order_id, "order already paid");
                ReconcileOutcome::AlreadyPaid
            }
            PaymentOutcome::OrderNotFound => {
                tracing::warn!(event_id = %event.id, order_id = %completed.order_id, "webhook for unknown order");
                ReconcileOutcome::OrderNotFound(completed.order_id)
            }
        })
    }

    pub async fn update_status(&self, order_id: Uuid, status: FulfillmentStatus) -> Result<Order> {
        let order = self
            .store
            .update_order_status(order_id, status)
            .await?
            .ok_or_else(|| EcommerceError::not_found("Order"))?;
        self.publisher.publish(&DomainEvent::Order(OrderEvent::StatusChanged { order_id, status })).await;
        Ok(order)
    }

    pub async fn delete_order(&self, order_id: Uuid) -> Result<()> {
        if !self.store.delete_order(order_id).await? {
            return Err(EcommerceError::not_found("Order"));
        }
        self.publisher.publish(&DomainEvent::Order(OrderEvent::Deleted { order_id })).await;
        Ok(())
    }

    pub async fn sales_stats(&self) -> Result<SalesStats> {
        self.store.sales_stats(start_of_local_day(Local::now())).await
    }
}
