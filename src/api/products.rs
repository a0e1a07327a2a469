use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::domain::aggregates::{Product, ProductDraft};
use crate::store::{Page, ProductFilter};
use crate::{AppState, EcommerceError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)] pub description: String,
    #[serde(default)] pub brand: String,
    #[serde(default)] pub category: String,
    #[serde(default)] pub sizes: Vec<String>,
    #[serde(default)] pub colors: Vec<String>,
    #[serde(default)] pub images: Vec<String>,
    pub price: Decimal,
    #[serde(default)] pub total_qty: i32,
}

impl From<ProductRequest> for ProductDraft {
    fn from(r: ProductRequest) -> Self {
        Self {
            name: r.name.trim().to_string(), description: r.description, brand: r.brand, category: r.category,
            sizes: r.sizes, colors: r.colors, images: r.images, price: r.price, total_qty: r.total_qty,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub name: Option<String>, pub brand: Option<String>, pub category: Option<String>,
    pub color: Option<String>, pub size: Option<String>,
    /// `min-max`, either bound may be left empty.
    pub price: Option<String>,
    pub page: Option<u32>, pub limit: Option<u32>,
}

fn parse_price_range(raw: &str) -> Result<(Option<Decimal>, Option<Decimal>)> {
    let invalid = || EcommerceError::Validation(format!("Invalid price range {raw:?}, expected min-max"));
    let (min, max) = raw.split_once('-').ok_or_else(invalid)?;
    let bound = |s: &str| -> Result<Option<Decimal>> {
        let s = s.trim();
        if s.is_empty() { Ok(None) } else { s.parse().map(Some).map_err(|_| invalid()) }
    };
    Ok((bound(min)?, bound(max)?))
}

impl ListParams {
    fn filter(&self) -> Result<ProductFilter> {
        let text = |v: &Option<String>| v.as_ref().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let (price_min, price_max) = match self.price.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(raw) => parse_price_range(raw)?,
            None => (None, None),
        };
        Ok(ProductFilter {
            name: text(&self.name), brand: text(&self.brand), category: text(&self.category),
            color: text(&self.color), size: text(&self.size), price_min, price_max,
        })
    }
}

pub async fn create_product(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<ProductRequest>) -> Result<(StatusCode, Json<Value>)> {
    let draft = ProductDraft::from(r);
    if s.store.find_product_by_name(&draft.name).await?.is_some() {
        return Err(EcommerceError::Conflict("Product already exists".to_string()));
    }
    let product = Product::create(draft, admin.id)?;
    s.store.create_product(&product).await?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "success", "message": "Product created successfully", "product": product }))))
}

pub async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<Value>> {
    let filter = p.filter()?;
    let page = Page::new(p.page.unwrap_or(1), p.limit.unwrap_or(10));
    let (products, total) = s.store.list_products(&filter, page).await?;

    let end = page.offset() + u64::from(page.limit);
    let mut pagination = serde_json::Map::new();
    if end < total {
        pagination.insert("next".into(), json!({ "page": page.page.saturating_add(1), "limit": page.limit }));
    }
    if page.offset() > 0 {
        pagination.insert("prev".into(), json!({ "page": page.page - 1, "limit": page.limit }));
    }
    Ok(Json(json!({
        "status": "success", "total": total, "results": products.len(), "pagination": pagination,
        "message": "Products fetched successfully", "products": products,
    })))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let product = s.store.find_product(id).await?.ok_or_else(|| EcommerceError::not_found("Product"))?;
    let reviews = s.store.list_reviews(id).await?;
    Ok(Json(json!({ "status": "success", "message": "Product fetched successfully", "product": product.view(reviews, true) })))
}

pub async fn update_product(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>, Json(r): Json<ProductRequest>) -> Result<Json<Value>> {
    let mut product = s.store.find_product(id).await?.ok_or_else(|| EcommerceError::not_found("Product"))?;
    product.revise(r.into())?;
    if !s.store.update_product(&product).await? {
        return Err(EcommerceError::not_found("Product"));
    }
    Ok(Json(json!({ "status": "success", "message": "Product updated successfully", "product": product })))
}

pub async fn delete_product(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    if !s.store.delete_product(id).await? {
        return Err(EcommerceError::not_found("Product"));
    }
    Ok(Json(json!({ "status": "success", "message": "Product deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::test_app;
    use axum::http::Method;

    #[test]
    fn test_parse_price_range() {
        assert_eq!(parse_price_range("10-50").unwrap(), (Some(Decimal::from(10)), Some(Decimal::from(50))));
        assert_eq!(parse_price_range("10-").unwrap(), (Some(Decimal::from(10)), None));
        assert!(parse_price_range("cheap").is_err());
        assert!(parse_price_range("1-x").is_err());
    }

    #[tokio::test]
    async fn test_product_crud() {
        let app = test_app();
        let (_, admin) = app.user("admin@example.com", true).await;
        let (_, user) = app.user("ada@example.com", false).await;
        let body = json!({ "name": "Hoodie", "brand": "Acme", "colors": ["Black"], "sizes": ["M"], "price": 45, "totalQty": 5 });

        let (status, _) = app.send(Method::POST, "/api/v1/products", Some(&user), Some(body.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, resp) = app.send(Method::POST, "/api/v1/products", Some(&admin), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(resp["product"]["brand"], "acme");
        let id = resp["product"]["_id"].as_str().unwrap().to_string();

        let (status, resp) = app.send(Method::POST, "/api/v1/products", Some(&admin), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(resp["message"], "Product already exists");

        let (status, resp) = app.send(Method::GET, &format!("/api/v1/products/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["product"]["qtyLeft"], 5);
        assert_eq!(resp["product"]["reviews"], json!([]));

        let update = json!({ "name": "Hoodie v2", "price": 50, "totalQty": 8 });
        let (status, resp) = app.send(Method::PUT, &format!("/api/v1/products/update/{id}"), Some(&admin), Some(update)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["product"]["name"], "Hoodie v2");

        let (status, _) = app.send(Method::DELETE, &format!("/api/v1/products/delete/{id}"), Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, resp) = app.send(Method::GET, &format!("/api/v1/products/{id}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(resp["message"], "Product not found");
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let app = test_app();
        let (_, admin) = app.user("admin@example.com", true).await;
        for (name, price) in [("Red Shirt", 10), ("Blue Shirt", 20), ("Red Cap", 30)] {
            let body = json!({ "name": name, "price": price, "colors": [name.split(' ').next().unwrap()] });
            app.send(Method::POST, "/api/v1/products", Some(&admin), Some(body)).await;
        }

        let (_, resp) = app.send(Method::GET, "/api/v1/products?color=red&price=5-25", None, None).await;
        assert_eq!(resp["total"], 1);
        assert_eq!(resp["products"][0]["name"], "Red Shirt");

        let (_, resp) = app.send(Method::GET, "/api/v1/products?page=1&limit=2", None, None).await;
        assert_eq!(resp["results"], 2);
        assert_eq!(resp["pagination"]["next"]["page"], 2);
        assert!(resp["pagination"].get("prev").is_none());

        let (_, resp) = app.send(Method::GET, "/api/v1/products?page=2&limit=2", None, None).await;
        assert_eq!(resp["results"], 1);
        assert_eq!(resp["pagination"]["prev"]["page"], 1);

        let (status, resp) = app.send(Method::GET, &format!("/api/v1/products?page={}&limit=2", u32::MAX), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["results"], 0);
        assert!(resp["pagination"].get("next").is_none());
        assert_eq!(resp["pagination"]["prev"]["page"], u32::MAX - 1);

        let (status, _) = app.send(Method::GET, "/api/v1/products?price=abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
