use axum::{extract::{Path, State}, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{hash_password, verify_password, AdminUser, AuthUser};
use crate::domain::aggregates::{user::normalize_email, ShippingAddress, User};
use crate::{AppState, EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "fullname is required"))]
    pub fullname: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)] pub struct LoginRequest { pub email: String, pub password: String }

pub async fn register(State(s): State<AppState>, Json(r): Json<RegisterRequest>) -> Result<(StatusCode, Json<Value>)> {
    r.validate()?;
    let email = normalize_email(&r.email);
    if s.store.find_user_by_email(&email).await?.is_some() {
        return Err(EcommerceError::Conflict("User already exists".to_string()));
    }
    let is_admin = s.config.admin_email.as_deref() == Some(email.as_str());
    let user = User::register(r.fullname.trim(), &email, hash_password(&r.password)?, is_admin);
    s.store.create_user(&user).await?;
    tracing::info!(user_id = %user.id, is_admin, "user registered");
    Ok((StatusCode::CREATED, Json(json!({ "status": "success", "message": "User Registered Successfully", "data": user }))))
}

pub async fn login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> Result<Json<Value>> {
    let invalid = || EcommerceError::Unauthorized("Invalid login credentials".to_string());
    let user = s.store.find_user_by_email(&normalize_email(&r.email)).await?.ok_or_else(invalid)?;
    if !verify_password(&r.password, &user.password_hash) {
        return Err(invalid());
    }
    let token = s.tokens.issue(user.id)?;
    Ok(Json(json!({ "status": "success", "message": "User logged in successfully", "userFound": user, "token": token })))
}

pub async fn profile(State(s): State<AppState>, AuthUser(user_id): AuthUser) -> Result<Json<Value>> {
    let user = s.store.find_user(user_id).await?.ok_or_else(|| EcommerceError::not_found("User"))?;
    let orders = s.store.find_orders(&user.orders).await?;
    Ok(Json(json!({ "status": "success", "message": "Welcome Profile page", "user": user, "orders": orders })))
}

pub async fn update_shipping_address(State(s): State<AppState>, AuthUser(user_id): AuthUser, Json(address): Json<ShippingAddress>) -> Result<Json<Value>> {
    address.validate()?;
    let user = s.store.update_shipping_address(user_id, &address).await?.ok_or_else(|| EcommerceError::not_found("User"))?;
    Ok(Json(json!({ "status": "success", "message": "User shipping address updated successfully", "user": user })))
}

pub async fn delete_user(State(s): State<AppState>, AdminUser(admin): AdminUser, Path(id): Path<Uuid>) -> Result<Json<Value>> {
    if !s.store.delete_user(id).await? {
        return Err(EcommerceError::not_found("User"));
    }
    tracing::info!(user_id = %id, admin_id = %admin.id, "user deleted");
    Ok(Json(json!({ "status": "success", "message": "User deleted successfully" })))
}
