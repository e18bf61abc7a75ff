//! Synchronisation
//!
//! Reconciles the local cart with the remote cart service.

mod controller;
pub mod envelope;
mod http;
mod service;

pub use controller::{ResyncHandle, SyncController, SyncError};
pub use http::HttpCartService;
pub use service::{CouponApplied, MockRemoteCartService, RemoteCartService, RemoteError};
