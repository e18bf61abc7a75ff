//! Cart Summary
//!
//! [`SummaryCalculator::compute`] turns items, applied coupons and the selected
//! shipping method into a [`CartSummary`]. It is a pure function of its
//! inputs: the summary is always rebuilt from scratch and never patched.

use std::{fmt, sync::Arc};

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::Decimal;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;

use crate::{
    coupons::Coupon,
    items::CartItem,
    prices::{PriceError, non_negative, to_money},
    shipping::ShippingMethod,
};

mod render;

pub use render::RenderError;

/// Source of the tax owed on a discounted subtotal.
///
/// The flat rate from configuration is the default; a pricing or
/// jurisdiction service can supply its own implementation.
pub trait TaxPolicy: fmt::Debug + Send + Sync {
    /// Tax owed on `taxable`, which is already clamped at zero.
    fn tax_on(&self, taxable: Decimal) -> Decimal;
}

/// Applies a single rate to the whole taxable amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatRateTax {
    rate: Percentage,
}

impl FlatRateTax {
    /// Creates a flat rate policy (e.g. `0.18` for 18%).
    pub fn new(rate: Percentage) -> Self {
        Self { rate }
    }
}

impl TaxPolicy for FlatRateTax {
    fn tax_on(&self, taxable: Decimal) -> Decimal {
        self.rate * taxable
    }
}

/// Computes cart summaries.
#[derive(Debug, Clone)]
pub struct SummaryCalculator {
    tax: Arc<dyn TaxPolicy>,
    currency: &'static Currency,
}

impl SummaryCalculator {
    /// Creates a calculator using a flat tax rate.
    pub fn new(currency: &'static Currency, tax_rate: Percentage) -> Self {
        Self::with_tax_policy(currency, Arc::new(FlatRateTax::new(tax_rate)))
    }

    /// Creates a calculator with a custom tax policy.
    pub fn with_tax_policy(currency: &'static Currency, tax: Arc<dyn TaxPolicy>) -> Self {
        Self { tax, currency }
    }

    /// The currency summaries are reported in.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Computes the summary for a cart.
    ///
    /// Coupons that have expired at `now` are skipped. Coupon contributions
    /// are summed without any exclusivity rules, and the combined discount is
    /// clamped to the subtotal.
    pub fn compute(
        &self,
        items: &[CartItem],
        coupons: &[Coupon],
        shipping: Option<&ShippingMethod>,
        now: Timestamp,
    ) -> CartSummary {
        if items.is_empty() {
            return CartSummary::empty(self.currency);
        }

        let subtotal: Decimal = items.iter().map(CartItem::line_subtotal).sum();
        let gift_wrap_cost: Decimal = items.iter().map(CartItem::gift_wrap_cost).sum();
        let item_count = items
            .iter()
            .map(|item| u64::from(item.quantity.get()))
            .sum();

        let mut discount = Decimal::ZERO;
        let mut free_shipping_applied = false;
        let mut applied_coupons = SmallVec::new();

        for coupon in coupons.iter().filter(|coupon| !coupon.is_expired(now)) {
            discount += coupon.discount_on(subtotal);
            free_shipping_applied |= coupon.grants_free_shipping();
            applied_coupons.push(coupon.id.clone());
        }

        let discount = discount.min(subtotal);
        let discounted = non_negative(subtotal - discount);

        let nominal_shipping = shipping.map_or(Decimal::ZERO, |method| *method.price);
        let shipping = if free_shipping_applied {
            Decimal::ZERO
        } else {
            nominal_shipping
        };

        let tax = non_negative(self.tax.tax_on(discounted));
        let total = discounted + shipping + tax + gift_wrap_cost;
        let savings = subtotal + nominal_shipping + tax + gift_wrap_cost - total;

        CartSummary {
            subtotal,
            discount,
            shipping,
            tax,
            gift_wrap_cost,
            total,
            savings,
            item_count,
            applied_coupons,
            free_shipping_applied,
            currency: self.currency,
        }
    }
}

/// A named amount on the summary, used for display and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLine {
    /// Sum of line subtotals
    Subtotal,
    /// Combined coupon discount
    Discount,
    /// Charged shipping
    Shipping,
    /// Tax on the discounted subtotal
    Tax,
    /// Gift wrap charges
    GiftWrap,
    /// Amount payable
    Total,
    /// Difference between the undiscounted and payable amounts
    Savings,
}

impl SummaryLine {
    /// All lines in display order.
    pub const ALL: [SummaryLine; 7] = [
        SummaryLine::Subtotal,
        SummaryLine::Discount,
        SummaryLine::Shipping,
        SummaryLine::Tax,
        SummaryLine::GiftWrap,
        SummaryLine::Total,
        SummaryLine::Savings,
    ];

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            SummaryLine::Subtotal => "Subtotal",
            SummaryLine::Discount => "Discount",
            SummaryLine::Shipping => "Shipping",
            SummaryLine::Tax => "Tax",
            SummaryLine::GiftWrap => "Gift wrap",
            SummaryLine::Total => "Total",
            SummaryLine::Savings => "Savings",
        }
    }
}

/// Financial summary of a cart. Amounts are unrounded.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSummary {
    subtotal: Decimal,
    discount: Decimal,
    shipping: Decimal,
    tax: Decimal,
    gift_wrap_cost: Decimal,
    total: Decimal,
    savings: Decimal,
    item_count: u64,
    applied_coupons: SmallVec<[String; 4]>,
    free_shipping_applied: bool,
    currency: &'static Currency,
}

impl CartSummary {
    /// The summary of an empty cart.
    pub fn empty(currency: &'static Currency) -> Self {
        Self {
            subtotal: Decimal::ZERO,
            discount: Decimal::ZERO,
            shipping: Decimal::ZERO,
            tax: Decimal::ZERO,
            gift_wrap_cost: Decimal::ZERO,
            total: Decimal::ZERO,
            savings: Decimal::ZERO,
            item_count: 0,
            applied_coupons: SmallVec::new(),
            free_shipping_applied: false,
            currency,
        }
    }

    /// Sum of unit price times quantity over all lines.
    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    /// Combined coupon discount, never more than the subtotal.
    pub fn discount(&self) -> Decimal {
        self.discount
    }

    /// Charged shipping; zero when a free-shipping coupon applies.
    pub fn shipping(&self) -> Decimal {
        self.shipping
    }

    /// Tax on the discounted subtotal.
    pub fn tax(&self) -> Decimal {
        self.tax
    }

    /// Gift wrap charges.
    pub fn gift_wrap_cost(&self) -> Decimal {
        self.gift_wrap_cost
    }

    /// Amount payable.
    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Undiscounted amount minus the payable amount.
    pub fn savings(&self) -> Decimal {
        self.savings
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Ids of the coupons that contributed to this summary.
    pub fn applied_coupons(&self) -> &[String] {
        &self.applied_coupons
    }

    /// Whether a free-shipping coupon waived the shipping price.
    pub fn free_shipping_applied(&self) -> bool {
        self.free_shipping_applied
    }

    /// Currency of all amounts.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// The unrounded amount for a line.
    pub fn amount(&self, line: SummaryLine) -> Decimal {
        match line {
            SummaryLine::Subtotal => self.subtotal,
            SummaryLine::Discount => self.discount,
            SummaryLine::Shipping => self.shipping,
            SummaryLine::Tax => self.tax,
            SummaryLine::GiftWrap => self.gift_wrap_cost,
            SummaryLine::Total => self.total,
            SummaryLine::Savings => self.savings,
        }
    }

    /// The amount for a line rounded to the currency's minor unit.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] if the amount does not fit in minor units.
    pub fn money(&self, line: SummaryLine) -> Result<Money<'static, Currency>, PriceError> {
        to_money(self.amount(line), self.currency)
    }
}

#[cfg(test)]
mod tests {
    use decimal_percentage::Percentage;
    use jiff::{SignedDuration, Timestamp};
    use rust_decimal::Decimal;
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        coupons::CouponKind,
        items::{ItemId, NewCartItem},
        prices::{Price, Quantity},
    };

    use super::*;

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    fn price(value: i64) -> Result<Price, PriceError> {
        Price::new(dec(value))
    }

    fn calculator() -> SummaryCalculator {
        SummaryCalculator::new(USD, Percentage::from(Decimal::new(18, 2)))
    }

    fn item(product: &str, unit: i64, qty: u32) -> Result<CartItem, Box<dyn std::error::Error>> {
        let quantity = Quantity::new(qty).ok_or("zero quantity")?;

        Ok(CartItem::from_new(
            ItemId::local(),
            NewCartItem::new(product, quantity, price(unit)?),
        ))
    }

    fn standard_shipping() -> Result<ShippingMethod, PriceError> {
        Ok(ShippingMethod {
            id: "standard".to_string(),
            name: "Standard".to_string(),
            price: price(50)?,
            estimated_days: Some(5),
            is_default: true,
        })
    }

    fn ten_percent_capped() -> Result<Coupon, PriceError> {
        Ok(Coupon::new(
            "ten",
            "TEN",
            CouponKind::Percentage(Percentage::from(Decimal::new(10, 2))),
        )
        .with_maximum_discount(price(100)?))
    }

    #[test]
    fn empty_cart_is_all_zero() -> TestResult {
        let shipping = standard_shipping()?;
        let summary = calculator().compute(&[], &[], Some(&shipping), Timestamp::UNIX_EPOCH);

        assert_eq!(summary, CartSummary::empty(USD));
        assert_eq!(summary.item_count(), 0);
        assert_eq!(summary.total(), Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn single_item_with_shipping_and_tax() -> TestResult {
        let items = [item("tee", 500, 2)?];
        let shipping = standard_shipping()?;

        let summary = calculator().compute(&items, &[], Some(&shipping), Timestamp::UNIX_EPOCH);

        assert_eq!(summary.subtotal(), dec(1000));
        assert_eq!(summary.tax(), dec(180));
        assert_eq!(summary.shipping(), dec(50));
        assert_eq!(summary.total(), dec(1230));
        assert_eq!(summary.savings(), Decimal::ZERO);
        assert_eq!(summary.item_count(), 2);

        Ok(())
    }

    #[test]
    fn capped_percentage_coupon_reduces_taxable_amount() -> TestResult {
        let items = [item("tee", 500, 2)?];
        let shipping = standard_shipping()?;
        let coupons = [ten_percent_capped()?];

        let summary =
            calculator().compute(&items, &coupons, Some(&shipping), Timestamp::UNIX_EPOCH);

        assert_eq!(summary.discount(), dec(100));
        assert_eq!(summary.tax(), dec(162));
        assert_eq!(summary.total(), dec(1112));
        assert_eq!(summary.savings(), dec(100));
        assert_eq!(summary.applied_coupons(), ["ten".to_string()]);

        Ok(())
    }

    #[test]
    fn oversized_fixed_coupons_are_clamped_to_subtotal() -> TestResult {
        let items = [item("mug", 10, 1)?];
        let coupons = [
            Coupon::new("a", "A", CouponKind::Fixed(price(8)?)),
            Coupon::new("b", "B", CouponKind::Fixed(price(8)?)),
        ];

        let summary = calculator().compute(&items, &coupons, None, Timestamp::UNIX_EPOCH);

        assert_eq!(summary.discount(), dec(10));
        assert_eq!(summary.subtotal() - summary.discount(), Decimal::ZERO);
        assert_eq!(summary.tax(), Decimal::ZERO);
        assert_eq!(summary.total(), Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn percentage_coupons_stack_additively() -> TestResult {
        let items = [item("tee", 100, 1)?];
        let twenty = Percentage::from(Decimal::new(20, 2));
        let coupons = [
            Coupon::new("a", "A", CouponKind::Percentage(twenty)),
            Coupon::new("b", "B", CouponKind::Percentage(twenty)),
        ];

        let summary = calculator().compute(&items, &coupons, None, Timestamp::UNIX_EPOCH);

        assert_eq!(summary.discount(), dec(40));

        Ok(())
    }

    #[test]
    fn free_shipping_waives_price_and_counts_as_savings() -> TestResult {
        let items = [item("tee", 500, 2)?];
        let shipping = standard_shipping()?;
        let coupons = [Coupon::new("ship", "SHIP", CouponKind::FreeShipping)];

        let summary =
            calculator().compute(&items, &coupons, Some(&shipping), Timestamp::UNIX_EPOCH);

        assert!(summary.free_shipping_applied());
        assert_eq!(summary.shipping(), Decimal::ZERO);
        assert_eq!(summary.discount(), Decimal::ZERO);
        assert_eq!(summary.total(), dec(1180));
        assert_eq!(summary.savings(), dec(50));

        Ok(())
    }

    #[test]
    fn expired_coupons_are_ignored() -> TestResult {
        let items = [item("tee", 500, 2)?];
        let now = Timestamp::UNIX_EPOCH.checked_add(SignedDuration::from_hours(1))?;
        let coupons = [ten_percent_capped()?.with_expiry(Timestamp::UNIX_EPOCH)];

        let summary = calculator().compute(&items, &coupons, None, now);

        assert_eq!(summary.discount(), Decimal::ZERO);
        assert!(summary.applied_coupons().is_empty());

        Ok(())
    }

    #[test]
    fn gift_wrap_is_added_after_tax() -> TestResult {
        let quantity = Quantity::new(2).ok_or("zero quantity")?;
        let items = [CartItem::from_new(
            ItemId::local(),
            NewCartItem::new("mug", quantity, price(100)?).with_gift_wrap(price(5)?),
        )];

        let summary = calculator().compute(&items, &[], None, Timestamp::UNIX_EPOCH);

        assert_eq!(summary.gift_wrap_cost(), dec(10));
        assert_eq!(summary.tax(), dec(36));
        assert_eq!(summary.total(), dec(246));

        Ok(())
    }

    #[test]
    fn custom_tax_policy_is_used() -> TestResult {
        #[derive(Debug)]
        struct NoTax;

        impl TaxPolicy for NoTax {
            fn tax_on(&self, _taxable: Decimal) -> Decimal {
                Decimal::ZERO
            }
        }

        let items = [item("tee", 500, 2)?];
        let summary = SummaryCalculator::with_tax_policy(USD, Arc::new(NoTax)).compute(
            &items,
            &[],
            None,
            Timestamp::UNIX_EPOCH,
        );

        assert_eq!(summary.total(), dec(1000));

        Ok(())
    }

    #[test]
    fn money_rounds_for_display_only() -> TestResult {
        let items = [item("pen", 1, 1)?];
        let calculator = SummaryCalculator::new(USD, Percentage::from(Decimal::new(333, 4)));
        let summary = calculator.compute(&items, &[], None, Timestamp::UNIX_EPOCH);

        assert_eq!(summary.tax(), Decimal::new(333, 4));
        assert_eq!(summary.money(SummaryLine::Tax)?.to_minor_units(), 3);
        assert_eq!(summary.money(SummaryLine::Total)?.to_minor_units(), 103);

        Ok(())
    }
}
