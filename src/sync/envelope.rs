//! Wire format
//!
//! JSON bodies exchanged with the cart service. Responses carry
//! `{ items, appliedCoupons?, shippingMethod? }`; coupon percentages are sent
//! as whole percents (`10` for 10%).

use std::fmt;

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::ServerCart,
    coupons::{Coupon, CouponKind},
    items::CartItem,
    prices::Price,
    shipping::ShippingMethod,
    sync::RemoteError,
};

/// A cart response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEnvelope {
    /// Confirmed items
    pub items: Vec<CartItem>,

    /// Confirmed coupons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_coupons: Option<Vec<CouponPayload>>,

    /// Confirmed shipping method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_method: Option<ShippingMethod>,
}

/// Discount type tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percent off
    Percentage,
    /// Amount off
    Fixed,
    /// Free shipping
    FreeShipping,
}

/// A coupon on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPayload {
    /// Server id
    pub id: String,

    /// Shopper-facing code
    pub code: String,

    /// Discount type
    pub discount_type: DiscountType,

    /// Percent (0-100) or amount, depending on the type
    #[serde(default)]
    pub value: Decimal,

    /// Minimum subtotal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_purchase: Option<Decimal>,

    /// Cap on a percentage discount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_discount: Option<Decimal>,

    /// Expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

impl TryFrom<CouponPayload> for Coupon {
    type Error = RemoteError;

    fn try_from(payload: CouponPayload) -> Result<Self, Self::Error> {
        let invalid = |reason: &dyn fmt::Display| {
            RemoteError::InvalidPayload(format!("coupon {}: {reason}", payload.code))
        };

        let kind = match payload.discount_type {
            DiscountType::Percentage => {
                if payload.value < Decimal::ZERO || payload.value > Decimal::ONE_HUNDRED {
                    return Err(invalid(&"percentage out of range"));
                }

                CouponKind::Percentage(Percentage::from(payload.value / Decimal::ONE_HUNDRED))
            }
            DiscountType::Fixed => {
                CouponKind::Fixed(Price::new(payload.value).map_err(|error| invalid(&error))?)
            }
            DiscountType::FreeShipping => CouponKind::FreeShipping,
        };

        let bound = |amount: Option<Decimal>| {
            amount
                .map(Price::new)
                .transpose()
                .map_err(|error| invalid(&error))
        };

        let minimum_purchase = bound(payload.minimum_purchase)?;
        let maximum_discount = bound(payload.maximum_discount)?;

        Ok(Coupon {
            id: payload.id,
            code: payload.code,
            kind,
            minimum_purchase,
            maximum_discount,
            expires_at: payload.expires_at,
        })
    }
}

impl From<&Coupon> for CouponPayload {
    fn from(coupon: &Coupon) -> Self {
        let (discount_type, value) = match coupon.kind {
            CouponKind::Percentage(percent) => (
                DiscountType::Percentage,
                percent * Decimal::ONE_HUNDRED,
            ),
            CouponKind::Fixed(amount) => (DiscountType::Fixed, *amount),
            CouponKind::FreeShipping => (DiscountType::FreeShipping, Decimal::ZERO),
        };

        Self {
            id: coupon.id.clone(),
            code: coupon.code.clone(),
            discount_type,
            value,
            minimum_purchase: coupon.minimum_purchase.map(|price| *price),
            maximum_discount: coupon.maximum_discount.map(|price| *price),
            expires_at: coupon.expires_at,
        }
    }
}

impl TryFrom<CartEnvelope> for ServerCart {
    type Error = RemoteError;

    fn try_from(envelope: CartEnvelope) -> Result<Self, Self::Error> {
        let applied_coupons = envelope
            .applied_coupons
            .map(|coupons| {
                coupons
                    .into_iter()
                    .map(Coupon::try_from)
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(ServerCart {
            items: envelope.items,
            applied_coupons,
            shipping_method: envelope.shipping_method,
        })
    }
}

impl From<&ServerCart> for CartEnvelope {
    fn from(cart: &ServerCart) -> Self {
        Self {
            items: cart.items.clone(),
            applied_coupons: cart
                .applied_coupons
                .as_ref()
                .map(|coupons| coupons.iter().map(CouponPayload::from).collect()),
            shipping_method: cart.shipping_method.clone(),
        }
    }
}

/// Body of `POST /cart/coupons`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ApplyCouponRequest<'a> {
    pub code: &'a str,
}

/// Body of `PUT /cart/items/{id}`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct UpdateQuantityRequest {
    pub quantity: u32,
}

/// Body of `POST /cart/calculate-shipping`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CalculateShippingRequest<'a> {
    pub shipping_method_id: &'a str,
}
