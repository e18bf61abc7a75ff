//! Prices
//!
//! Money and quantity primitives. Amounts are carried as unrounded
//! [`Decimal`]s and only rounded to the currency's minor unit when they are
//! turned into [`Money`] for display.

use std::{num::NonZeroU32, ops::Deref};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, INR, USD},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by price construction and display conversion.
#[derive(Debug, Error, PartialEq)]
pub enum PriceError {
    /// Prices can never be negative.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),

    /// The amount does not fit in the currency's minor units.
    #[error("amount {0} overflows minor units")]
    Overflow(Decimal),
}

/// A non-negative monetary amount in major units (e.g. `12.50`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price {
    value: Decimal,
}

impl Price {
    /// A zero price.
    pub const ZERO: Price = Price {
        value: Decimal::ZERO,
    };

    /// Creates a new price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if `value` is below zero.
    pub fn new(value: Decimal) -> Result<Self, PriceError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(PriceError::Negative(value));
        }

        Ok(Price { value })
    }

    /// Returns the amount multiplied by a quantity.
    pub fn times(self, quantity: Quantity) -> Decimal {
        self.value * Decimal::from(quantity.get())
    }
}

impl Deref for Price {
    type Target = Decimal;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Price::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.value
    }
}

/// A line item quantity. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A quantity of one.
    pub const ONE: Quantity = Quantity(NonZeroU32::MIN);

    /// Creates a quantity, returning `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Quantity)
    }

    /// Creates a quantity from a signed request. Anything at or below zero
    /// yields `None`, which callers treat as a removal. Requests above
    /// `u32::MAX` saturate.
    pub fn from_signed(value: i64) -> Option<Self> {
        if value <= 0 {
            return None;
        }

        Quantity::new(u32::try_from(value).unwrap_or(u32::MAX))
    }

    /// Returns the raw count.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Adds another quantity, saturating at `u32::MAX`.
    #[must_use]
    pub fn saturating_add(self, other: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(other.get()))
    }

    /// Subtracts another quantity, returning `None` if nothing would remain.
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        self.get()
            .checked_sub(other.get())
            .and_then(Quantity::new)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Quantity::new(value).ok_or_else(|| "quantity must be at least 1".to_string())
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

/// Looks up a supported currency by ISO code, ignoring case.
pub fn currency_from_code(code: &str) -> Option<&'static Currency> {
    match code.to_ascii_uppercase().as_str() {
        "GBP" => Some(GBP),
        "USD" => Some(USD),
        "EUR" => Some(EUR),
        "INR" => Some(INR),
        _ => None,
    }
}

/// Clamps an amount so it never drops below zero.
pub fn non_negative(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}

/// Rounds an unrounded amount to the currency's minor unit and wraps it as
/// [`Money`] for display.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] if the rounded amount does not fit in
/// `i64` minor units.
pub fn to_money(
    amount: Decimal,
    currency: &'static Currency,
) -> Result<Money<'static, Currency>, PriceError> {
    let scale = 10_i64
        .checked_pow(currency.exponent)
        .ok_or(PriceError::Overflow(amount))?;

    let minor = amount
        .round_dp_with_strategy(currency.exponent, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::from(scale))
        .and_then(|scaled| scaled.to_i64())
        .ok_or(PriceError::Overflow(amount))?;

    Ok(Money::from_minor(minor, currency))
}
