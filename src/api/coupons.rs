use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::domain::aggregates::Coupon;
use crate::domain::value_objects::{CouponCode, Discount};
use crate::{AppState, EcommerceError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRequest {
    pub code: String,
    pub discount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl CouponRequest {
    fn parts(&self) -> Result<(CouponCode, Discount)> {
        Ok((CouponCode::new(self.code.as_str())?, Discount::new(self.discount)?))
    }
}

pub async fn create_coupon(State(s): State<AppState>, AdminUser(admin): AdminUser, Json(r): Json<CouponRequest>) -> Result<(StatusCode, Json<Value>)> {
    let (code, discount) = r.parts()?;
    if s.store.find_coupon_by_code(&code).await?.is_some() {
        return Err(EcommerceError::Conflict("Coupon already exists".to_string()));
    }
    let coupon = Coupon::new(code, discount, r.start_date, r.end_date, admin.id)?;
    s.store.create_coupon(&coupon).await?;
    let view = coupon.view(Utc::now());
    Ok((StatusCode::CREATED, Json(json!({ "status": "success", "message": "Coupon created successfully", "coupon": view }))))
}

pub async fn list_coupons(State(s): State<AppState>, AdminUser(_): AdminUser) -> Result<Json<Value>> {
    let now = Utc::now();
    let coupons: Vec<_> = s.store.list_coupons().await?.into_iter().map(|c| c.view(now)).collect();
    Ok(Json(json!({ "status": "success", "message": "All coupons", "coupons": coupons })))
}

pub async fn get_coupon(State(s): State<AppState>, AuthUser(_): AuthUser, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    let coupon = s.store.find_coupon(id).await?.ok_or_else(|| EcommerceError::not_found("Coupon"))?;
    Ok(Json(json!({ "status": "success", "message": "Coupon fetched", "coupon": coupon.view(Utc::now()) })))
}

pub async fn update_coupon(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>, Json(r): Json<CouponRequest>) -> Result<Json<Value>> {
    let (code, discount) = r.parts()?;
    let mut coupon = s.store.find_coupon(id).await?.ok_or_else(|| EcommerceError::not_found("Coupon"))?;
    if code != coupon.code {
        if let Some(other) = s.store.find_coupon_by_code(&code).await? {
            if other.id != id {
                return Err(EcommerceError::Conflict("Coupon already exists".to_string()));
            }
        }
    }
    coupon.revise(code, discount, r.start_date, r.end_date)?;
    if !s.store.update_coupon(&coupon).await? {
        return Err(EcommerceError::not_found("Coupon"));
    }
    Ok(Json(json!({ "status": "success", "message": "Coupon updated successfully", "coupon": coupon.view(Utc::now()) })))
}

pub async fn delete_coupon(State(s): State<AppState>, AdminUser(_): AdminUser, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    if !s.store.delete_coupon(id).await? {
        return Err(EcommerceError::not_found("Coupon"));
    }
    Ok(Json(json!({ "status": "success", "message": "Coupon deleted successfully" })))
}
