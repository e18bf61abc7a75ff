//! Integration tests for local cart behaviour: pricing without coupons, the
//! undo window and quantity edits.

use std::sync::Arc;

use decimal_percentage::Percentage;
use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use rusty_money::iso::USD;
use testresult::TestResult;

use carton::{
    cart::CartAggregate,
    clock::ManualClock,
    config::CartConfig,
    fixtures::CartFixture,
    items::{CartItem, NewCartItem},
    prices::{Price, Quantity},
    shipping::ShippingMethod,
    summary::SummaryCalculator,
};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Timestamp::UNIX_EPOCH))
}

fn mug(quantity: u32) -> TestResult<NewCartItem> {
    Ok(NewCartItem::new(
        "enamel-mug",
        Quantity::new(quantity).ok_or("zero quantity")?,
        Price::new(Decimal::new(2500, 2))?,
    )
    .with_gift_wrap(Price::new(Decimal::new(500, 2))?))
}

#[test]
fn total_without_coupons_adds_every_component() -> TestResult {
    let cart = CartFixture::from_set("basic")?.cart(&CartConfig::default(), clock())?;

    let items = cart.items();
    let method = cart.selected_shipping().ok_or("no shipping selected")?;
    let calculator = SummaryCalculator::new(USD, Percentage::from(Decimal::new(18, 2)));

    let summary = calculator.compute(items, &[], Some(method), Timestamp::UNIX_EPOCH);

    let subtotal: Decimal = items.iter().map(CartItem::line_subtotal).sum();
    let wrap: Decimal = items.iter().map(CartItem::gift_wrap_cost).sum();
    let tax = subtotal * Decimal::new(18, 2);

    assert_eq!(summary.total(), subtotal + wrap + *method.price + tax);

    Ok(())
}

#[test]
fn removal_can_be_undone_within_the_window() -> TestResult {
    let clock = clock();
    let mut cart = CartAggregate::from_config(&CartConfig::default(), Arc::<ManualClock>::clone(&clock))?;

    let added = cart.add_or_increment(mug(2)?.with_customization("glaze", "teal"));
    let before = cart.summary().clone();
    let removed = cart.remove(added.id()).ok_or("not removed")?;

    clock.advance(SignedDuration::from_secs(299));

    assert!(cart.restore(added.id()), "restored inside the window");
    assert_eq!(cart.items(), [removed]);
    assert_eq!(cart.summary(), &before);

    Ok(())
}

#[test]
fn restore_after_the_window_does_nothing() -> TestResult {
    let clock = clock();
    let mut cart = CartAggregate::from_config(&CartConfig::default(), Arc::<ManualClock>::clone(&clock))?;

    let added = cart.add_or_increment(mug(1)?);
    cart.remove(added.id());

    clock.advance(SignedDuration::from_mins(5));

    assert!(!cart.restore(added.id()), "window has closed");
    assert!(cart.items().is_empty());
    assert_eq!(cart.recently_removed().count(), 0);

    Ok(())
}

#[test]
fn zero_quantity_is_a_removal() -> TestResult {
    let config = CartConfig::default();
    let mut by_quantity = CartAggregate::from_config(&config, clock())?;
    let mut by_remove = CartAggregate::from_config(&config, clock())?;

    let shipping = vec![ShippingMethod {
        id: "standard".to_string(),
        name: "Standard".to_string(),
        price: Price::new(Decimal::new(50, 0))?,
        estimated_days: Some(5),
        is_default: true,
    }];

    for cart in [&mut by_quantity, &mut by_remove] {
        cart.set_shipping_methods(shipping.clone());
    }

    let a = by_quantity.add_or_increment(mug(3)?);
    let b = by_remove.add_or_increment(mug(3)?);

    assert!(by_quantity.set_quantity(a.id(), 0));
    assert!(by_remove.remove(b.id()).is_some());

    assert_eq!(by_quantity.items(), by_remove.items());
    assert_eq!(by_quantity.summary(), by_remove.summary());
    assert_eq!(
        by_quantity.recently_removed().count(),
        by_remove.recently_removed().count()
    );

    Ok(())
}
