//! Value Objects for E-commerce

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coupon code value object, stored and matched upper-cased
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() { return Err(CouponCodeError::Empty); }
        if value.len() > 50 { return Err(CouponCodeError::TooLong); }
        if value.chars().any(char::is_whitespace) { return Err(CouponCodeError::Whitespace); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CouponCodeError { Empty, TooLong, Whitespace }
impl std::error::Error for CouponCodeError {}
impl fmt::Display for CouponCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Coupon code is empty"),
            Self::TooLong => write!(f, "Coupon code is too long"),
            Self::Whitespace => write!(f, "Coupon code must not contain spaces"),
        }
    }
}

/// Percentage discount in the closed range 0..=100
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Discount(Decimal);

impl Discount {
    pub const NONE: Discount = Discount(Decimal::ZERO);

    pub fn new(percent: Decimal) -> Result<Self, DiscountError> {
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(DiscountError::OutOfRange(percent));
        }
        Ok(Self(percent))
    }
    pub fn percent(&self) -> Decimal { self.0 }
    pub fn fraction(&self) -> Decimal { self.0 / Decimal::ONE_HUNDRED }

    /// `total - total * fraction`, the amount charged after the discount.
    pub fn apply(&self, total: Decimal) -> Decimal { total - total * self.fraction() }
}

impl TryFrom<Decimal> for Discount {
    type Error = DiscountError;
    fn try_from(value: Decimal) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<Discount> for Decimal {
    fn from(d: Discount) -> Self { d.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum DiscountError { OutOfRange(Decimal) }
impl std::error::Error for DiscountError {}
impl fmt::Display for DiscountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::OutOfRange(p) => write!(f, "Discount {p} must be between 0 and 100") }
    }
}

/// Largest amount accepted for a line price or an order total: 999,999.99,
/// the gateway's eight-digit limit in minor units.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

/// Converts a major-unit amount to the gateway's minor units (cents), rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub fn from_minor_units(minor: i64) -> Decimal { Decimal::new(minor, 2) }
