//! Cart Aggregate
//!
//! [`CartAggregate`] is the only mutator of cart state. Every operation is
//! applied locally and synchronously, the summary and checkout validation are
//! recomputed from scratch, and subscribers are notified. Server truth only
//! enters through [`CartAggregate::replace_all`].

use std::{fmt, sync::Arc};

use slotmap::{SlotMap, new_key_type};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    checkout::CheckoutValidation,
    clock::{Clock, SystemClock},
    config::{CartConfig, ConfigError},
    coupons::Coupon,
    items::{CartItem, ItemId, NewCartItem},
    prices::Quantity,
    shipping::{ShippingMethod, default_method, find_method},
    summary::{CartSummary, SummaryCalculator},
    undo::{RecentlyRemoved, UndoBuffer},
};

mod status;

pub use status::{Operation, SyncFailure, SyncStatus};

new_key_type! {
    /// Handle returned by [`CartAggregate::subscribe`].
    pub struct SubscriptionId;
}

/// A cart shared between the presentation layer and the sync controller.
pub type SharedCart = Arc<Mutex<CartAggregate>>;

type Listener = Box<dyn Fn(&CartAggregate) + Send + Sync>;

/// What an add-to-cart did to the item list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was appended.
    Inserted {
        /// Id of the new line
        id: ItemId,
    },

    /// An existing line with the same product and variant grew.
    Incremented {
        /// Id of the existing line
        id: ItemId,

        /// Units added
        by: Quantity,
    },
}

impl AddOutcome {
    /// Id of the affected line.
    pub fn id(&self) -> &ItemId {
        match self {
            AddOutcome::Inserted { id } | AddOutcome::Incremented { id, .. } => id,
        }
    }
}

/// Cart state as confirmed by the cart service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerCart {
    /// Confirmed items
    pub items: Vec<CartItem>,

    /// Confirmed coupons, when the response carries them
    pub applied_coupons: Option<Vec<Coupon>>,

    /// Confirmed shipping method, when the response carries one
    pub shipping_method: Option<ShippingMethod>,
}

impl ServerCart {
    /// A confirmation carrying only items.
    pub fn with_items(items: Vec<CartItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }
}

/// The in-memory cart.
pub struct CartAggregate {
    items: Vec<CartItem>,
    coupons: Vec<Coupon>,
    shipping_methods: Vec<ShippingMethod>,
    selected_shipping: Option<String>,
    undo: UndoBuffer,
    summary: CartSummary,
    validation: CheckoutValidation,
    inventory_checked: bool,
    sync: SyncStatus,
    calculator: SummaryCalculator,
    clock: Arc<dyn Clock>,
    listeners: SlotMap<SubscriptionId, Listener>,
}

impl CartAggregate {
    /// Creates an empty cart reading the system clock.
    pub fn new(calculator: SummaryCalculator) -> Self {
        Self {
            items: Vec::new(),
            coupons: Vec::new(),
            shipping_methods: Vec::new(),
            selected_shipping: None,
            undo: UndoBuffer::default(),
            summary: CartSummary::empty(calculator.currency()),
            validation: CheckoutValidation::default(),
            inventory_checked: false,
            sync: SyncStatus::default(),
            calculator,
            clock: Arc::new(SystemClock),
            listeners: SlotMap::with_key(),
        }
    }

    /// Creates an empty cart from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCurrency`] if the configured currency is
    /// not supported.
    pub fn from_config(config: &CartConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let calculator = SummaryCalculator::new(config.currency()?, config.tax_rate());

        Ok(Self::new(calculator)
            .with_clock(clock)
            .with_undo_buffer(UndoBuffer::new(config.undo_capacity, config.undo_window())))
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the undo buffer.
    #[must_use]
    pub fn with_undo_buffer(mut self, undo: UndoBuffer) -> Self {
        self.undo = undo;
        self
    }

    /// Wraps the cart for sharing with a sync controller.
    pub fn into_shared(self) -> SharedCart {
        Arc::new(Mutex::new(self))
    }

    /// Adds a request to the cart, merging with an existing line for the same
    /// product and variant.
    pub fn add_or_increment(&mut self, request: NewCartItem) -> AddOutcome {
        let key = request.key();

        let outcome = if let Some(existing) = self.items.iter_mut().find(|item| item.matches(&key))
        {
            existing.quantity = existing.quantity.saturating_add(request.quantity);

            debug!(
                item_id = %existing.id,
                quantity = existing.quantity.get(),
                "incremented cart item"
            );

            AddOutcome::Incremented {
                id: existing.id.clone(),
                by: request.quantity,
            }
        } else {
            let item = CartItem::from_new(ItemId::local(), request);
            let id = item.id.clone();

            debug!(item_id = %id, product_id = %item.product_id, "inserted cart item");

            self.items.push(item);

            AddOutcome::Inserted { id }
        };

        self.items_changed();

        outcome
    }

    /// Undoes an optimistic addition without touching the undo buffer.
    ///
    /// Returns `false` if the line is no longer present.
    pub fn revert_add(&mut self, outcome: &AddOutcome) -> bool {
        let Some(position) = self.position(outcome.id()) else {
            return false;
        };

        match outcome {
            AddOutcome::Inserted { .. } => {
                self.items.remove(position);
            }
            AddOutcome::Incremented { by, .. } => {
                let Some(item) = self.items.get_mut(position) else {
                    return false;
                };

                match item.quantity.checked_sub(*by) {
                    Some(quantity) => item.quantity = quantity,
                    None => {
                        self.items.remove(position);
                    }
                }
            }
        }

        debug!(item_id = %outcome.id(), "reverted cart addition");

        self.items_changed();

        true
    }

    /// Sets a line's quantity. Zero or less removes the line.
    ///
    /// Returns `false` if no line has `id`.
    pub fn set_quantity(&mut self, id: &ItemId, quantity: i64) -> bool {
        let Some(quantity) = Quantity::from_signed(quantity) else {
            return self.remove(id).is_some();
        };

        let Some(item) = self.items.iter_mut().find(|item| &item.id == id) else {
            return false;
        };

        item.quantity = quantity;

        debug!(item_id = %id, quantity = quantity.get(), "updated cart item quantity");

        self.items_changed();

        true
    }

    /// Removes a line, keeping it in the undo buffer.
    pub fn remove(&mut self, id: &ItemId) -> Option<CartItem> {
        let position = self.position(id)?;
        let item = self.items.remove(position);

        self.undo.push(item.clone(), self.clock.now());

        debug!(item_id = %id, "removed cart item");

        self.items_changed();

        Some(item)
    }

    /// Re-inserts a removed line if it is still inside the undo window.
    ///
    /// If the same product and variant was added again after the removal, the
    /// restored units are merged into that line, which keeps its id.
    pub fn restore(&mut self, id: &ItemId) -> bool {
        let Some(item) = self.undo.take(id, self.clock.now()) else {
            return false;
        };

        let key = item.key();

        if let Some(existing) = self.items.iter_mut().find(|line| line.matches(&key)) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);

            debug!(
                item_id = %id,
                merged_into = %existing.id,
                quantity = existing.quantity.get(),
                "restored cart item into existing line"
            );
        } else {
            debug!(item_id = %id, "restored cart item");

            self.items.push(item);
        }

        self.items_changed();

        true
    }

    /// Applies a server-confirmed coupon, replacing one with the same id.
    pub fn apply_coupon(&mut self, coupon: Coupon) {
        debug!(coupon_id = %coupon.id, code = %coupon.code, "applied coupon");

        match self.coupons.iter_mut().find(|applied| applied.id == coupon.id) {
            Some(applied) => *applied = coupon,
            None => self.coupons.push(coupon),
        }

        self.recompute();
    }

    /// Removes an applied coupon. Returns `false` if it was not applied.
    pub fn remove_coupon(&mut self, id: &str) -> bool {
        let before = self.coupons.len();

        self.coupons.retain(|coupon| coupon.id != id);

        if self.coupons.len() == before {
            return false;
        }

        debug!(coupon_id = %id, "removed coupon");

        self.recompute();

        true
    }

    /// Replaces the known shipping methods.
    ///
    /// The default method is selected when nothing is selected yet or the
    /// current selection is no longer offered.
    pub fn set_shipping_methods(&mut self, methods: Vec<ShippingMethod>) {
        self.shipping_methods = methods;

        let still_offered = self
            .selected_shipping
            .as_deref()
            .is_some_and(|id| find_method(&self.shipping_methods, id).is_some());

        if !still_offered {
            self.selected_shipping =
                default_method(&self.shipping_methods).map(|method| method.id.clone());
        }

        self.recompute();
    }

    /// Selects a known shipping method. Unknown ids are ignored.
    pub fn select_shipping_method(&mut self, id: &str) -> bool {
        if find_method(&self.shipping_methods, id).is_none() {
            debug!(shipping_method = %id, "ignored unknown shipping method");

            return false;
        }

        self.selected_shipping = Some(id.to_string());
        self.recompute();

        true
    }

    /// Overwrites local state with a server confirmation.
    ///
    /// Items are always replaced; coupons and shipping only when present.
    pub fn replace_all(&mut self, cart: ServerCart) {
        info!(
            items = cart.items.len(),
            coupons = cart.applied_coupons.as_ref().map(Vec::len),
            "reconciling cart with server state"
        );

        self.items = cart.items;

        if let Some(coupons) = cart.applied_coupons {
            self.coupons = coupons;
        }

        if let Some(method) = cart.shipping_method {
            self.selected_shipping = Some(method.id.clone());

            match self
                .shipping_methods
                .iter_mut()
                .find(|known| known.id == method.id)
            {
                Some(known) => *known = method,
                None => self.shipping_methods.push(method),
            }
        }

        self.items_changed();
    }

    /// Records the result of an external inventory check.
    pub fn set_inventory_checked(&mut self, checked: bool) {
        self.inventory_checked = checked;
        self.recompute();
    }

    /// Marks a remote call as in flight.
    pub fn begin_sync(&mut self, operation: Operation) {
        debug!(%operation, "sync started");

        self.sync.begin();
        self.notify();
    }

    /// Marks a remote call as confirmed.
    pub fn record_success(&mut self, operation: Operation) {
        debug!(%operation, "sync succeeded");

        self.sync.succeed(self.clock.now());
        self.notify();
    }

    /// Marks a remote call as failed.
    pub fn record_failure(&mut self, operation: Operation, message: impl Into<String>) {
        self.sync.fail(SyncFailure {
            operation,
            message: message.into(),
            at: self.clock.now(),
        });
        self.notify();
    }

    /// Current items in insertion order.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Looks up a line.
    pub fn item(&self, id: &ItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    /// Current summary.
    pub fn summary(&self) -> &CartSummary {
        &self.summary
    }

    /// Current checkout readiness.
    pub fn checkout_validation(&self) -> CheckoutValidation {
        self.validation
    }

    /// Applied, unexpired coupons.
    pub fn applied_coupons(&self) -> &[Coupon] {
        &self.coupons
    }

    /// Known shipping methods.
    pub fn shipping_methods(&self) -> &[ShippingMethod] {
        &self.shipping_methods
    }

    /// The selected shipping method, if it is known.
    pub fn selected_shipping(&self) -> Option<&ShippingMethod> {
        self.selected_shipping
            .as_deref()
            .and_then(|id| find_method(&self.shipping_methods, id))
    }

    /// Removed items still inside the undo window, oldest first.
    pub fn recently_removed(&mut self) -> impl Iterator<Item = &RecentlyRemoved> {
        let now = self.clock.now();

        self.undo.entries(now)
    }

    /// Remote synchronisation state.
    pub fn sync_status(&self) -> &SyncStatus {
        &self.sync
    }

    /// The clock the cart reads.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Registers a callback invoked after every committed change.
    pub fn subscribe(
        &mut self,
        listener: impl Fn(&CartAggregate) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.listeners.insert(Box::new(listener))
    }

    /// Removes a callback. Returns `false` if it was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(id).is_some()
    }

    fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| &item.id == id)
    }

    fn items_changed(&mut self) {
        self.inventory_checked = false;
        self.recompute();
    }

    fn recompute(&mut self) {
        let now = self.clock.now();

        self.coupons.retain(|coupon| {
            let expired = coupon.is_expired(now);

            if expired {
                debug!(coupon_id = %coupon.id, "dropped expired coupon");
            }

            !expired
        });

        let selected = self.selected_shipping();

        let summary = self
            .calculator
            .compute(&self.items, &self.coupons, selected, now);

        let validation = CheckoutValidation {
            has_items: !self.items.is_empty(),
            has_valid_shipping: selected.is_some(),
            inventory_checked: self.inventory_checked,
        };

        self.summary = summary;
        self.validation = validation;

        self.notify();
    }

    fn notify(&self) {
        for listener in self.listeners.values() {
            listener(self);
        }
    }
}

impl fmt::Debug for CartAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartAggregate")
            .field("items", &self.items)
            .field("coupons", &self.coupons)
            .field("selected_shipping", &self.selected_shipping)
            .field("summary", &self.summary)
            .field("validation", &self.validation)
            .field("sync", &self.sync)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
