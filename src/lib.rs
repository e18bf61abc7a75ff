//! Carton
//!
//! Carton is a client-side shopping cart engine: an item aggregate with coupon and shipping
//! aware pricing, a short-lived undo buffer for removals, debounced local persistence and
//! optimistic synchronisation with a remote cart service.

pub mod cart;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod coupons;
pub mod fixtures;
pub mod items;
pub mod persistence;
pub mod prelude;
pub mod prices;
pub mod scheduler;
pub mod shipping;
pub mod summary;
pub mod sync;
pub mod undo;
