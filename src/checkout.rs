//! Checkout readiness

/// Derived checks gating checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckoutValidation {
    /// The cart has at least one line
    pub has_items: bool,

    /// A shipping method from the known list is selected
    pub has_valid_shipping: bool,

    /// Stock has been confirmed since the item list last changed
    pub inventory_checked: bool,
}

impl CheckoutValidation {
    /// Whether every check passes.
    pub fn is_ready(&self) -> bool {
        self.has_items && self.has_valid_shipping && self.inventory_checked
    }
}
