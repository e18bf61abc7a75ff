//! Coupons
//!
//! Discount terms confirmed by the cart service. Several coupons may be
//! applied at once and their contributions are summed; no exclusivity is
//! enforced between kinds, so two percentage coupons both apply. Whether that
//! stacking is an intended "stackable offers" policy is still undecided, and
//! the behaviour is kept additive until it is.

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::prices::Price;

/// Reasons a coupon cannot currently be used.
#[derive(Debug, Error, PartialEq)]
pub enum CouponError {
    /// The coupon expired before the given instant.
    #[error("coupon {0} has expired")]
    Expired(String),

    /// The cart subtotal is below the coupon's minimum purchase.
    #[error("coupon {code} requires a minimum purchase of {minimum}")]
    BelowMinimumPurchase {
        /// Coupon code
        code: String,

        /// Required subtotal
        minimum: Decimal,
    },
}

/// How a coupon discounts the cart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CouponKind {
    /// A percentage of the subtotal (e.g. "10% off"), capped by
    /// [`Coupon::maximum_discount`].
    Percentage(Percentage),

    /// A fixed amount off the subtotal (e.g. "£5 off").
    Fixed(Price),

    /// Waives the selected shipping method's price.
    FreeShipping,
}

/// A coupon applied to the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon {
    /// Server-issued id
    pub id: String,

    /// Code the shopper typed
    pub code: String,

    /// Discount terms
    pub kind: CouponKind,

    /// Subtotal required before the coupon is eligible
    pub minimum_purchase: Option<Price>,

    /// Upper bound on a percentage coupon's contribution
    pub maximum_discount: Option<Price>,

    /// Instant after which the coupon no longer applies
    pub expires_at: Option<Timestamp>,
}

impl Coupon {
    /// Creates a coupon with no bounds and no expiry.
    pub fn new(id: impl Into<String>, code: impl Into<String>, kind: CouponKind) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            kind,
            minimum_purchase: None,
            maximum_discount: None,
            expires_at: None,
        }
    }

    /// Sets the minimum purchase bound.
    #[must_use]
    pub fn with_minimum_purchase(mut self, minimum: Price) -> Self {
        self.minimum_purchase = Some(minimum);
        self
    }

    /// Sets the maximum discount bound.
    #[must_use]
    pub fn with_maximum_discount(mut self, maximum: Price) -> Self {
        self.maximum_discount = Some(maximum);
        self
    }

    /// Sets the expiry.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the coupon has expired at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether the coupon waives shipping.
    pub fn grants_free_shipping(&self) -> bool {
        matches!(self.kind, CouponKind::FreeShipping)
    }

    /// Checks expiry and minimum purchase against a subtotal.
    ///
    /// # Errors
    ///
    /// - [`CouponError::Expired`]: the coupon expired at or before `now`.
    /// - [`CouponError::BelowMinimumPurchase`]: `subtotal` is under the minimum.
    pub fn check_eligibility(&self, subtotal: Decimal, now: Timestamp) -> Result<(), CouponError> {
        if self.is_expired(now) {
            return Err(CouponError::Expired(self.code.clone()));
        }

        match self.minimum_purchase {
            Some(minimum) if subtotal < *minimum => Err(CouponError::BelowMinimumPurchase {
                code: self.code.clone(),
                minimum: *minimum,
            }),
            _ => Ok(()),
        }
    }

    /// The amount this coupon takes off a subtotal, before the cart-wide clamp.
    pub fn discount_on(&self, subtotal: Decimal) -> Decimal {
        match self.kind {
            CouponKind::Percentage(percent) => {
                let amount = percent * subtotal;

                self.maximum_discount
                    .map_or(amount, |maximum| amount.min(*maximum))
            }
            CouponKind::Fixed(value) => *value,
            CouponKind::FreeShipping => Decimal::ZERO,
        }
    }
}
