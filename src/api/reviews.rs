use axum::{extract::{Path, State}, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::domain::aggregates::Review;
use crate::{AppState, EcommerceError, Result};

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: u8,
}

pub async fn create_review(State(s): State<AppState>, AuthUser(user_id): AuthUser, Path(product_id): Path<Uuid>, Json(r): Json<ReviewRequest>) -> Result<(StatusCode, Json<Value>)> {
    r.validate()?;
    if s.store.find_product(product_id).await?.is_none() {
        return Err(EcommerceError::not_found("Product"));
    }
    let review = Review::new(product_id, user_id, r.message.trim(), r.rating);
    s.store.create_review(&review).await?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "success", "message": "Review created successfully", "review": review }))))
}
