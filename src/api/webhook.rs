use axum::{body::Bytes, extract::State, http::{HeaderMap, StatusCode}};

use crate::payments::webhook::SIGNATURE_HEADER;
use crate::{AppState, Result};

/// Gateway callback. Takes the raw body; the signature covers the exact bytes.
pub async fn payment_webhook(State(s): State<AppState>, headers: HeaderMap, body: Bytes) -> Result<StatusCode> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    s.workflow.reconcile_payment(&body, signature).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::tests::test_app;
    use crate::domain::aggregates::{Order, OrderItem, PaymentStatus, Product, ProductDraft, ShippingAddress, User};
    use crate::payments::webhook::tests::{completed_event, sign};
    use crate::store::Store;
    use crate::workflow::tests::WEBHOOK_SECRET;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn webhook_request(payload: Vec<u8>, signature: Option<String>) -> Request<Body> {
        let mut req = Request::post("/webhook").header("content-type", "application/json");
        if let Some(sig) = signature {
            req = req.header("Stripe-Signature", sig);
        }
        req.body(Body::from(payload)).unwrap()
    }

    #[tokio::test]
    async fn test_webhook_marks_order_paid() {
        let app = test_app();
        let user = User::register("Ada", "ada@example.com", "hash".into(), false);
        app.store.create_user(&user).await.unwrap();
        let product = Product::create(ProductDraft { name: "Gift".into(), price: Decimal::TEN, ..Default::default() }, user.id).unwrap();
        app.store.create_product(&product).await.unwrap();
        let item = OrderItem { product: product.id, name: "Gift".into(), description: None, qty: 1, price: Decimal::TEN };
        let order = Order::place(user.id, vec![item], ShippingAddress::default(), Decimal::TEN, None, "eur").unwrap();
        app.store.commit_order(&order).await.unwrap();

        let payload = completed_event("evt_http_1", &order.id.to_string());
        let header = sign(&payload, WEBHOOK_SECRET, Utc::now().timestamp());

        let resp = router(app.state.clone()).oneshot(webhook_request(payload.clone(), Some(header.clone()))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(to_bytes(resp.into_body(), usize::MAX).await.unwrap().is_empty());

        let paid = app.store.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.total_price, Decimal::new(4999, 2));

        let again = router(app.state.clone()).oneshot(webhook_request(payload, Some(header))).await.unwrap();
        assert_eq!(again.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_rejects_unsigned() {
        let app = test_app();
        let payload = completed_event("evt_http_2", &Uuid::now_v7().to_string());

        let resp = router(app.state.clone()).oneshot(webhook_request(payload.clone(), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert!(body["message"].as_str().unwrap().starts_with("Webhook Error: "));

        let forged = sign(&payload, "whsec_wrong", Utc::now().timestamp());
        let resp = router(app.state.clone()).oneshot(webhook_request(payload, Some(forged))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
