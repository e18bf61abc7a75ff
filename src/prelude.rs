//! Carton prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{
        AddOutcome, CartAggregate, Operation, ServerCart, SharedCart, SubscriptionId, SyncFailure,
        SyncStatus,
    },
    checkout::CheckoutValidation,
    clock::{Clock, ManualClock, SystemClock},
    config::{CartConfig, ConfigError},
    coupons::{Coupon, CouponError, CouponKind},
    items::{CartItem, GiftWrap, ItemId, ItemKey, NewCartItem},
    persistence::{FileStore, KeyValueStore, MemoryStore, PersistenceAdapter, StorageError},
    prices::{Price, PriceError, Quantity},
    shipping::ShippingMethod,
    summary::{CartSummary, FlatRateTax, SummaryCalculator, SummaryLine, TaxPolicy},
    sync::{
        CouponApplied, HttpCartService, RemoteCartService, RemoteError, ResyncHandle,
        SyncController, SyncError,
    },
    undo::{RecentlyRemoved, UndoBuffer},
};
