//! HTTP surface.

use axum::{routing::{delete, get, post, put}, Json, Router};

use crate::AppState;

pub mod coupons;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;
pub mod webhook;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/profile", get(users::profile))
        .route("/users/update/shipping", put(users::update_shipping_address))
        .route("/users/delete/:id", delete(users::delete_user))
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/:id", get(products::get_product))
        .route("/products/update/:id", put(products::update_product))
        .route("/products/delete/:id", delete(products::delete_product))
        .route("/coupons", get(coupons::list_coupons).post(coupons::create_coupon))
        .route("/coupons/:id", get(coupons::get_coupon))
        .route("/coupons/update/:id", put(coupons::update_coupon))
        .route("/coupons/delete/:id", delete(coupons::delete_coupon))
        .route("/reviews/:product_id", post(reviews::create_review))
        .route("/orders", get(orders::list_orders).post(orders::place_order))
        .route("/orders/sales/stats", get(orders::sales_stats))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/checkout", post(orders::retry_checkout))
        .route("/orders/update/:id", put(orders::update_order))
        .route("/orders/:id/delete", delete(orders::delete_order));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "ecommerce-api"})) }))
        .route("/webhook", post(webhook::payment_webhook))
        .nest("/api/v1", api)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::{hash_password, TokenKeys};
    use crate::config::Config;
    use crate::domain::aggregates::User;
    use crate::publisher::EventPublisher;
    use crate::store::{MemoryStore, Store};
    use crate::workflow::tests::{settings, FakeGateway};
    use crate::workflow::OrderWorkflow;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    pub(crate) struct TestApp {
        pub state: AppState,
        pub store: Arc<MemoryStore>,
        pub gateway: Arc<FakeGateway>,
    }

    pub(crate) fn test_app() -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::default());
        let config = Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test-secret".into()),
            "STRIPE_KEY" => Some("sk_test".into()),
            "STRIPE_WEBHOOK_SECRET" => Some(crate::workflow::tests::WEBHOOK_SECRET.into()),
            "ADMIN_EMAIL" => Some("admin@example.com".into()),
            _ => None,
        })
        .unwrap();
        let workflow = OrderWorkflow::new(store.clone(), gateway.clone(), EventPublisher::disabled(), settings());
        let state = AppState {
            store: store.clone(),
            workflow: Arc::new(workflow),
            tokens: Arc::new(TokenKeys::new("test-secret", Duration::from_secs(3600))),
            config: Arc::new(config),
        };
        TestApp { state, store, gateway }
    }

    impl TestApp {
        /// Registers a user directly in the store and returns it with a bearer token.
        pub async fn user(&self, email: &str, admin: bool) -> (User, String) {
            let user = User::register("Test User", email, hash_password("password1").unwrap(), admin);
            self.store.create_user(&user).await.unwrap();
            let token = self.state.tokens.issue(user.id).unwrap();
            (user, token)
        }

        pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let req = match body {
                Some(json) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(json.to_string())),
                None => req.body(Body::empty()),
            }
            .unwrap();
            let resp = router(self.state.clone()).oneshot(req).await.unwrap();
            let status = resp.status();
            let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
            (status, json)
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let (status, body) = app.send(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_auth_gates() {
        let app = test_app();
        let (_, token) = app.user("ada@example.com", false).await;

        let (status, body) = app.send(Method::GET, "/api/v1/orders", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");

        let (status, _) = app.send(Method::GET, "/api/v1/orders", Some("junk"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = app.send(Method::GET, "/api/v1/orders", Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Access denied, admin only");
    }
}
