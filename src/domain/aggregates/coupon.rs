//! Coupon Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::{CouponCode, Discount};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub code: CouponCode,
    pub discount: Discount,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coupon with its time-derived flags, as returned to clients.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponView {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub is_expired: bool,
    pub days_left: i64,
}

impl Coupon {
    pub fn new(code: CouponCode, discount: Discount, start_date: DateTime<Utc>, end_date: DateTime<Utc>, user_id: Uuid) -> Result<Self, CouponError> {
        if end_date < start_date { return Err(CouponError::EndsBeforeStart); }
        let now = Utc::now();
        Ok(Self { id: Uuid::now_v7(), code, discount, start_date, end_date, user_id, created_at: now, updated_at: now })
    }

    pub fn revise(&mut self, code: CouponCode, discount: Discount, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<(), CouponError> {
        if end_date < start_date { return Err(CouponError::EndsBeforeStart); }
        self.code = code;
        self.discount = discount;
        self.start_date = start_date;
        self.end_date = end_date;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Expired once `now` is strictly past the end date.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool { self.end_date < now }

    pub fn days_left(&self, now: DateTime<Utc>) -> i64 { (self.end_date - now).num_days().max(0) }

    pub fn view(self, now: DateTime<Utc>) -> CouponView {
        CouponView { is_expired: self.is_expired(now), days_left: self.days_left(now), coupon: self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CouponError { EndsBeforeStart }
impl std::error::Error for CouponError {}
impl std::fmt::Display for CouponError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "End date must not be before start date") }
}
