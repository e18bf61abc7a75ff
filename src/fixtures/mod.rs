//! Fixtures
//!
//! YAML cart fixtures: items, coupons and shipping methods priced in a single
//! currency. Prices are written as `"<amount> <ISO code>"`, e.g. `"4.99 GBP"`.

use std::{fs, path::PathBuf, str::FromStr, sync::Arc};

use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    cart::CartAggregate,
    clock::Clock,
    config::{CartConfig, ConfigError},
    coupons::{Coupon, CouponKind},
    items::NewCartItem,
    prices::{Price, PriceError, Quantity, currency_from_code},
    shipping::ShippingMethod,
};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price format
    #[error("Invalid price format: {0}")]
    InvalidPrice(String),

    /// Negative price
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Zero quantity
    #[error("Quantity must be at least one for product {0}")]
    ZeroQuantity(String),

    /// Unknown currency code
    #[error("Unknown currency code: {0}")]
    UnknownCurrency(String),

    /// Currency mismatch between prices, or between the fixture and config
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),

    /// The cart could not be built from configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Cart fixture from YAML
#[derive(Debug, Deserialize)]
pub struct CartFixture {
    /// ISO code every price must use
    pub currency: String,

    /// Line items in cart order
    #[serde(default)]
    pub items: Vec<ItemFixture>,

    /// Offered shipping methods
    #[serde(default)]
    pub shipping_methods: Vec<ShippingFixture>,

    /// Applied coupons
    #[serde(default)]
    pub coupons: Vec<CouponFixture>,

    /// Selected shipping method id, when not the default
    #[serde(default)]
    pub selected_shipping: Option<String>,

    /// Whether stock has been confirmed
    #[serde(default)]
    pub inventory_checked: bool,
}

/// Line item fixture
#[derive(Debug, Deserialize)]
pub struct ItemFixture {
    /// Product id
    pub product_id: String,

    /// Variant id
    #[serde(default)]
    pub variant_id: Option<String>,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Units
    pub quantity: u32,

    /// Unit price (e.g., "4.99 GBP")
    pub unit_price: String,

    /// Per-unit gift wrap price
    #[serde(default)]
    pub gift_wrap: Option<String>,
}

/// Shipping method fixture
#[derive(Debug, Deserialize)]
pub struct ShippingFixture {
    /// Method id
    pub id: String,

    /// Display name
    pub name: String,

    /// Price (e.g., "3.50 GBP")
    pub price: String,

    /// Transit days
    #[serde(default)]
    pub estimated_days: Option<u32>,

    /// Default flag
    #[serde(default)]
    pub default: bool,
}

/// Coupon discount terms from YAML
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountFixture {
    /// Percentage discount
    Percentage {
        /// Discount as a fraction (e.g., 0.1 for 10%)
        value: Decimal,

        /// Cap (e.g., "10.00 GBP")
        #[serde(default)]
        maximum_discount: Option<String>,
    },

    /// Fixed amount off
    Fixed {
        /// Amount (e.g., "5.00 GBP")
        value: String,
    },

    /// Free shipping
    FreeShipping,
}

/// Coupon fixture
#[derive(Debug, Deserialize)]
pub struct CouponFixture {
    /// Coupon id
    pub id: String,

    /// Code
    pub code: String,

    /// Discount terms
    pub discount: DiscountFixture,

    /// Minimum subtotal (e.g., "20.00 GBP")
    #[serde(default)]
    pub minimum_purchase: Option<String>,

    /// Expiry
    #[serde(default)]
    pub expires_at: Option<Timestamp>,
}

impl CartFixture {
    /// Loads `<base>/carts/<name>.yml` from the default `./fixtures` base.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        Self::load(PathBuf::from("./fixtures").join("carts").join(format!("{name}.yml")))
    }

    /// Loads a fixture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path.into())?;

        Self::from_yaml_str(&contents)
    }

    /// Parses fixture YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FixtureError> {
        Ok(serde_norway::from_str(yaml)?)
    }

    /// The fixture's currency.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::UnknownCurrency`] for unsupported codes.
    pub fn currency(&self) -> Result<&'static Currency, FixtureError> {
        parse_currency(&self.currency)
    }

    /// Builds a cart holding the fixture's contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture currency differs from the configured
    /// one, or if any price, quantity or code is invalid.
    pub fn cart(
        &self,
        config: &CartConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<CartAggregate, FixtureError> {
        let currency = self.currency()?;
        let configured = config.currency()?;

        if currency != configured {
            return Err(FixtureError::CurrencyMismatch(
                configured.iso_alpha_code.to_string(),
                currency.iso_alpha_code.to_string(),
            ));
        }

        let mut cart = CartAggregate::from_config(config, clock)?;

        let methods = self
            .shipping_methods
            .iter()
            .map(|method| self.shipping_method(method))
            .collect::<Result<Vec<_>, _>>()?;

        cart.set_shipping_methods(methods);

        if let Some(selected) = &self.selected_shipping {
            cart.select_shipping_method(selected);
        }

        for item in &self.items {
            cart.add_or_increment(self.item(item)?);
        }

        for coupon in &self.coupons {
            cart.apply_coupon(self.coupon(coupon)?);
        }

        cart.set_inventory_checked(self.inventory_checked);

        Ok(cart)
    }

    fn price(&self, value: &str) -> Result<Price, FixtureError> {
        let (amount, currency) = parse_price(value)?;

        if currency.iso_alpha_code != self.currency.to_ascii_uppercase() {
            return Err(FixtureError::CurrencyMismatch(
                self.currency.clone(),
                currency.iso_alpha_code.to_string(),
            ));
        }

        Ok(Price::new(amount)?)
    }

    fn optional_price(&self, value: Option<&str>) -> Result<Option<Price>, FixtureError> {
        value.map(|value| self.price(value)).transpose()
    }

    fn item(&self, fixture: &ItemFixture) -> Result<NewCartItem, FixtureError> {
        let quantity = Quantity::new(fixture.quantity)
            .ok_or_else(|| FixtureError::ZeroQuantity(fixture.product_id.clone()))?;

        let mut item = NewCartItem::new(
            fixture.product_id.clone(),
            quantity,
            self.price(&fixture.unit_price)?,
        )
        .with_name(fixture.name.clone());

        if let Some(variant) = &fixture.variant_id {
            item = item.with_variant(variant.clone());
        }

        if let Some(cost) = self.optional_price(fixture.gift_wrap.as_deref())? {
            item = item.with_gift_wrap(cost);
        }

        Ok(item)
    }

    fn shipping_method(&self, fixture: &ShippingFixture) -> Result<ShippingMethod, FixtureError> {
        Ok(ShippingMethod {
            id: fixture.id.clone(),
            name: fixture.name.clone(),
            price: self.price(&fixture.price)?,
            estimated_days: fixture.estimated_days,
            is_default: fixture.default,
        })
    }

    fn coupon(&self, fixture: &CouponFixture) -> Result<Coupon, FixtureError> {
        let (kind, maximum_discount) = match &fixture.discount {
            DiscountFixture::Percentage {
                value,
                maximum_discount,
            } => (
                CouponKind::Percentage((*value).into()),
                self.optional_price(maximum_discount.as_deref())?,
            ),
            DiscountFixture::Fixed { value } => (CouponKind::Fixed(self.price(value)?), None),
            DiscountFixture::FreeShipping => (CouponKind::FreeShipping, None),
        };

        Ok(Coupon {
            id: fixture.id.clone(),
            code: fixture.code.clone(),
            kind,
            minimum_purchase: self.optional_price(fixture.minimum_purchase.as_deref())?,
            maximum_discount,
            expires_at: fixture.expires_at,
        })
    }
}

/// Parses a price string such as `"4.99 GBP"`.
///
/// # Errors
///
/// Returns [`FixtureError::InvalidPrice`] for malformed strings and
/// [`FixtureError::UnknownCurrency`] for unsupported codes.
pub fn parse_price(value: &str) -> Result<(Decimal, &'static Currency), FixtureError> {
    let mut parts = value.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(FixtureError::InvalidPrice(value.to_string()));
    };

    let amount = Decimal::from_str(amount)
        .map_err(|error| FixtureError::InvalidPrice(format!("{value}: {error}")))?;

    Ok((amount, parse_currency(code)?))
}

fn parse_currency(code: &str) -> Result<&'static Currency, FixtureError> {
    currency_from_code(code).ok_or_else(|| FixtureError::UnknownCurrency(code.to_string()))
}

#[cfg(test)]
mod tests {
    use decimal_percentage::Percentage;
    use rusty_money::iso::GBP;
    use testresult::TestResult;

    use crate::clock::SystemClock;

    use super::*;

    #[test]
    fn parse_price_reads_amount_and_currency() -> TestResult {
        let (amount, currency) = parse_price("4.99 GBP")?;

        assert_eq!(amount, Decimal::new(499, 2));
        assert_eq!(currency, GBP);

        Ok(())
    }

    #[test]
    fn parse_price_rejects_malformed_values() {
        assert!(matches!(parse_price("4.99"), Err(FixtureError::InvalidPrice(_))));
        assert!(matches!(parse_price("abc GBP"), Err(FixtureError::InvalidPrice(_))));
        assert!(matches!(
            parse_price("4.99 XYZ"),
            Err(FixtureError::UnknownCurrency(_))
        ));
    }

    #[test]
    fn basic_set_builds_cart() -> TestResult {
        let fixture = CartFixture::from_set("basic")?;
        let cart = fixture.cart(&CartConfig::default(), Arc::new(SystemClock))?;

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.applied_coupons().len(), 1);
        assert!(cart.selected_shipping().is_some());
        assert!(cart.checkout_validation().is_ready());

        Ok(())
    }

    #[test]
    fn inline_fixture_applies_coupon_terms() -> TestResult {
        let fixture = CartFixture::from_yaml_str(
            r#"
currency: USD
items:
  - product_id: tee
    quantity: 2
    unit_price: "500.00 USD"
coupons:
  - id: ten
    code: TEN
    discount:
      type: percentage
      value: 0.1
      maximum_discount: "100.00 USD"
"#,
        )?;

        let cart = fixture.cart(&CartConfig::default(), Arc::new(SystemClock))?;
        let coupon = cart.applied_coupons().first().ok_or("missing coupon")?;

        assert_eq!(
            coupon.kind,
            CouponKind::Percentage(Percentage::from(Decimal::new(1, 1)))
        );
        assert_eq!(cart.summary().discount(), Decimal::new(100, 0));

        Ok(())
    }

    #[test]
    fn mixed_currencies_are_rejected() -> TestResult {
        let fixture = CartFixture::from_yaml_str(
            r#"
currency: USD
items:
  - product_id: tee
    quantity: 1
    unit_price: "5.00 GBP"
"#,
        )?;

        let result = fixture.cart(&CartConfig::default(), Arc::new(SystemClock));

        assert!(matches!(result, Err(FixtureError::CurrencyMismatch(_, _))));

        Ok(())
    }

    #[test]
    fn fixture_currency_must_match_config() -> TestResult {
        let fixture = CartFixture::from_yaml_str("currency: GBP")?;
        let result = fixture.cart(&CartConfig::default(), Arc::new(SystemClock));

        assert!(matches!(result, Err(FixtureError::CurrencyMismatch(_, _))));

        Ok(())
    }
}
