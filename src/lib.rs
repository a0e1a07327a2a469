//! E-commerce REST backend
//!
//! Users, products, coupons, reviews and orders over a persistent store, with
//! bearer-token authentication and a hosted checkout payment integration.
//!
//! ## Features
//! - Product catalogue with filtering and pagination
//! - Coupon-aware order placement and hosted checkout
//! - Signed, idempotent payment webhook reconciliation
//! - Sales statistics for administrators

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use std::sync::Arc;
use thiserror::Error;

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod payments;
pub mod publisher;
pub mod store;
pub mod workflow;

use crate::auth::TokenKeys;
use crate::config::Config;
use crate::domain::aggregates::{CouponError, OrderError, ProductError};
use crate::domain::value_objects::{CouponCodeError, DiscountError};
use crate::store::Store;
use crate::workflow::OrderWorkflow;

// =============================================================================
// Application State
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub workflow: Arc<OrderWorkflow>,
    pub tokens: Arc<TokenKeys>,
    pub config: Arc<Config>,
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("Coupon does not exist")]
    CouponNotFound,

    #[error("Coupon is expired")]
    CouponExpired,

    #[error("Please provide shipping address")]
    MissingShippingAddress,

    #[error("No order items")]
    EmptyOrder,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Webhook Error: {0}")]
    InvalidSignature(String),

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EcommerceError>;

impl EcommerceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CouponNotFound | Self::CouponExpired | Self::MissingShippingAddress | Self::EmptyOrder
            | Self::Validation(_) | Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PaymentGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::StorageError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller; server-side failures are not described.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::StorageError(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn not_found(what: &str) -> Self { Self::NotFound(format!("{what} not found")) }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        let body = Json(serde_json::json!({ "status": "error", "message": self.public_message() }));
        (status, body).into_response()
    }
}

impl From<OrderError> for EcommerceError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NoItems => Self::EmptyOrder,
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<CouponError> for EcommerceError {
    fn from(err: CouponError) -> Self { Self::Validation(err.to_string()) }
}

impl From<ProductError> for EcommerceError {
    fn from(err: ProductError) -> Self { Self::Validation(err.to_string()) }
}

impl From<CouponCodeError> for EcommerceError {
    fn from(err: CouponCodeError) -> Self { Self::Validation(err.to_string()) }
}

impl From<DiscountError> for EcommerceError {
    fn from(err: DiscountError) -> Self { Self::Validation(err.to_string()) }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(err: validator::ValidationErrors) -> Self { Self::Validation(err.to_string()) }
}
