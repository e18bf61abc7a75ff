//! Summary rendering

use std::io;

use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    items::CartItem,
    prices::{PriceError, to_money},
    summary::{CartSummary, SummaryLine},
};

/// Errors that can occur while rendering a summary.
#[derive(Debug, Error)]
pub enum RenderError {
    /// An amount could not be converted for display.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Writing to the output failed.
    #[error("failed to write summary: {0}")]
    Io(#[from] io::Error),
}

impl CartSummary {
    /// Writes the item lines and summary amounts as tables.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] if an amount overflows minor units or the
    /// output cannot be written.
    pub fn write_to(&self, mut out: impl io::Write, items: &[CartItem]) -> Result<(), RenderError> {
        let mut builder = Builder::default();

        builder.push_record(["Item", "Qty", "Unit Price", "Line Total", "Gift Wrap"]);

        for item in items {
            let name = if item.name.is_empty() {
                item.product_id.clone()
            } else {
                item.name.clone()
            };

            builder.push_record([
                name,
                item.quantity.get().to_string(),
                to_money(*item.unit_price, self.currency)?.to_string(),
                to_money(item.line_subtotal(), self.currency)?.to_string(),
                to_money(item.gift_wrap_cost(), self.currency)?.to_string(),
            ]);
        }

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(1..5), Alignment::right());

        writeln!(out, "\n{table}")?;

        let mut totals = Builder::default();

        for line in SummaryLine::ALL {
            totals.push_record([line.label().to_string(), self.money(line)?.to_string()]);
        }

        let mut totals = totals.build();

        totals.with(Style::blank());
        totals.modify(Columns::new(1..2), Alignment::right());

        writeln!(out, "{totals}")?;

        if !self.applied_coupons.is_empty() {
            writeln!(out, " Coupons: {}", self.applied_coupons.join(", "))?;
        }

        writeln!(out, " Items: {}", self.item_count)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use decimal_percentage::Percentage;
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use crate::{
        items::{ItemId, NewCartItem},
        prices::{Price, Quantity},
        summary::SummaryCalculator,
    };

    use super::*;

    #[test]
    fn write_to_renders_items_and_totals() -> TestResult {
        let quantity = Quantity::new(2).ok_or("zero quantity")?;
        let items = [CartItem::from_new(
            ItemId::server("line-1"),
            NewCartItem::new("tee", quantity, Price::new(Decimal::new(500, 0))?)
                .with_name("Plain Tee"),
        )];

        let summary = SummaryCalculator::new(USD, Percentage::from(Decimal::new(18, 2))).compute(
            &items,
            &[],
            None,
            Timestamp::UNIX_EPOCH,
        );

        let mut out = Vec::new();
        summary.write_to(&mut out, &items)?;

        let rendered = String::from_utf8(out)?;

        assert!(rendered.contains("Plain Tee"), "missing item name: {rendered}");
        assert!(rendered.contains("Subtotal"), "missing subtotal: {rendered}");
        assert!(rendered.contains("1,180.00"), "missing total: {rendered}");
        assert!(rendered.contains("Items: 2"), "missing count: {rendered}");

        Ok(())
    }
}
