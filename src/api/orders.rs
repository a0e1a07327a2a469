use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::domain::aggregates::{FulfillmentStatus, OrderItem, ShippingAddress};
use crate::workflow::PlaceOrder;
use crate::{AppState, EcommerceError, Result};

#[derive(Debug, Default, Deserialize)] pub struct CouponParams { pub coupon: Option<String> }

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub order_items: Vec<OrderItem>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    pub total_price: Decimal,
}

#[derive(Debug, Deserialize)] pub struct UpdateOrderRequest { pub status: FulfillmentStatus }

pub async fn place_order(State(s): State<AppState>, AuthUser(user_id): AuthUser, Query(q): Query<CouponParams>, Json(r): Json<PlaceOrderRequest>) -> Result<(StatusCode, Json<Value>)> {
    let input = PlaceOrder { coupon: q.coupon, order_items: r.order_items, shipping_address: r.shipping_address, total_price: r.total_price };
    let placed = s.workflow.place_order(user_id, input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "url": placed.checkout_url, "orderId": placed.order.id }))))
}

pub async fn retry_checkout(State(s): State<AppState>, AuthUser(user_id): AuthUser, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let placed = s.workflow.retry_checkout(user_id, id).await?;
    Ok(Json(json!({ "url": placed.checkout_url, "orderId": placed.order.id })))
}

pub async fn list_orders(State(s): State<AppState>, AdminUser(_): AdminUser) -> Result<Json<Value>> {
    let orders = s.store.list_orders().await?;
    Ok(Json(json!({ "status": "success", "message": "All orders", "orders": orders })))
}

pub async fn get_order(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let order = s.store.find_order(id).await?.ok_or_else(|| EcommerceError::not_found("Order"))?;
    Ok(Json(json!({ "status": "success", "message": "Single order", "order": order })))
}

pub async fn update_order(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>, Json(r): Json<UpdateOrderRequest>) -> Result<Json<Value>> {
    let order = s.workflow.update_status(id, r.status).await?;
    Ok(Json(json!({ "status": "success", "message": "Order updated", "updatedOrder": order })))
}

pub async fn delete_order(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    s.workflow.delete_order(id).await?;
    Ok(Json(json!({ "status": "success", "message": "Order deleted successfully" })))
}

pub async fn sales_stats(State(s): State<AppState>, AdminUser(_): AdminUser) -> Result<Json<Value>> {
    let stats = s.workflow.sales_stats().await?;
    Ok(Json(json!({ "status": "success", "message": "Sales stats", "stats": stats })))
}

#[cfg(test)]
mod tests {
    use crate::api::tests::{test_app, TestApp};
    use crate::domain::aggregates::{Product, ProductDraft, ShippingAddress, User};
    use crate::store::Store;
    use axum::http::{Method, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    async fn shopper(app: &TestApp) -> (User, String, Product) {
        let (mut user, token) = app.user("ada@example.com", false).await;
        let address = ShippingAddress { first_name: "Ada".into(), city: "London".into(), ..Default::default() };
        user = app.store.update_shipping_address(user.id, &address).await.unwrap().unwrap();
        let product = Product::create(ProductDraft { name: "Hoodie".into(), price: Decimal::new(45, 0), total_qty: 9, ..Default::default() }, user.id).unwrap();
        app.store.create_product(&product).await.unwrap();
        (user, token, product)
    }

    fn order_body(product: &Product, qty: u32, total: i64) -> Value {
        json!({
            "orderItems": [{ "_id": product.id, "name": product.name, "qty": qty, "price": 45 }],
            "totalPrice": total
        })
    }

    #[tokio::test]
    async fn test_place_order_returns_checkout_url() {
        let app = test_app();
        let (user, token, product) = shopper(&app).await;

        let (status, resp) = app.send(Method::POST, "/api/v1/orders", Some(&token), Some(order_body(&product, 2, 90))).await;
        assert_eq!(status, StatusCode::CREATED);
        let order_id = resp["orderId"].as_str().unwrap();
        assert_eq!(resp["url"], format!("https://checkout.test/{order_id}"));

        assert_eq!(app.store.find_product(product.id).await.unwrap().unwrap().total_sold, 2);
        assert_eq!(app.store.find_user(user.id).await.unwrap().unwrap().orders.len(), 1);
        assert_eq!(app.gateway.requests.lock().unwrap().len(), 1);

        let (status, resp) = app.send(Method::POST, &format!("/api/v1/orders/{order_id}/checkout"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["orderId"], order_id);
    }

    #[tokio::test]
    async fn test_place_order_errors() {
        let app = test_app();
        let (_, token, product) = shopper(&app).await;

        let (status, resp) = app.send(Method::POST, "/api/v1/orders?coupon=GHOST", Some(&token), Some(order_body(&product, 1, 45))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "Coupon does not exist");

        let (status, resp) = app.send(Method::POST, "/api/v1/orders", Some(&token), Some(json!({ "orderItems": [], "totalPrice": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "No order items");

        let (_, newcomer) = app.user("bob@example.com", false).await;
        let (status, resp) = app.send(Method::POST, "/api/v1/orders", Some(&newcomer), Some(order_body(&product, 1, 45))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "Please provide shipping address");

        let (status, _) = app.send(Method::POST, "/api/v1/orders", None, Some(order_body(&product, 1, 45))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_order_administration() {
        let app = test_app();
        let (_, token, product) = shopper(&app).await;
        let (_, admin) = app.user("admin@example.com", true).await;
        for total in [10, 20, 30] {
            app.send(Method::POST, "/api/v1/orders", Some(&token), Some(order_body(&product, 1, total))).await;
        }

        let (status, resp) = app.send(Method::GET, "/api/v1/orders/sales/stats", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["stats"]["orderCount"], 3);

        let (_, resp) = app.send(Method::GET, "/api/v1/orders", Some(&admin), None).await;
        let id = resp["orders"][0]["_id"].as_str().unwrap().to_string();

        let (status, resp) = app.send(Method::PUT, &format!("/api/v1/orders/update/{id}"), Some(&admin), Some(json!({ "status": "delivered" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["updatedOrder"]["status"], "delivered");

        let (status, _) = app.send(Method::DELETE, &format!("/api/v1/orders/{id}/delete"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, resp) = app.send(Method::GET, &format!("/api/v1/orders/{id}"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(resp["message"], "Order not found");
    }
}
