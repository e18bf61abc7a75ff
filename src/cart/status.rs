//! Sync status

use std::fmt;

use jiff::Timestamp;

/// A cart operation that talks to the cart service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Add-to-cart
    AddItem,
    /// Quantity change
    UpdateQuantity,
    /// Line removal
    RemoveItem,
    /// Coupon application
    ApplyCoupon,
    /// Coupon removal
    RemoveCoupon,
    /// Shipping method selection
    SelectShipping,
    /// Full cart refresh
    Resync,
}

impl Operation {
    /// Stable name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::AddItem => "add_item",
            Operation::UpdateQuantity => "update_quantity",
            Operation::RemoveItem => "remove_item",
            Operation::ApplyCoupon => "apply_coupon",
            Operation::RemoveCoupon => "remove_coupon",
            Operation::SelectShipping => "select_shipping",
            Operation::Resync => "resync",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The most recent remote failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Operation that failed
    pub operation: Operation,

    /// Error description
    pub message: String,

    /// When the failure was recorded
    pub at: Timestamp,
}

/// Remote synchronisation state kept on the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pending: u32,
    last_error: Option<SyncFailure>,
    last_synced_at: Option<Timestamp>,
}

impl SyncStatus {
    /// Number of remote calls in flight.
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Whether any remote call is in flight.
    pub fn is_syncing(&self) -> bool {
        self.pending > 0
    }

    /// The last recorded failure, cleared by the next success.
    pub fn last_error(&self) -> Option<&SyncFailure> {
        self.last_error.as_ref()
    }

    /// When the server last confirmed the cart.
    pub fn last_synced_at(&self) -> Option<Timestamp> {
        self.last_synced_at
    }

    pub(crate) fn begin(&mut self) {
        self.pending = self.pending.saturating_add(1);
    }

    pub(crate) fn succeed(&mut self, at: Timestamp) {
        self.pending = self.pending.saturating_sub(1);
        self.last_error = None;
        self.last_synced_at = Some(at);
    }

    pub(crate) fn fail(&mut self, failure: SyncFailure) {
        self.pending = self.pending.saturating_sub(1);
        self.last_error = Some(failure);
    }
}
