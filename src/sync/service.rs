//! Remote cart service

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::{
    cart::ServerCart,
    coupons::Coupon,
    items::{ItemId, NewCartItem},
    prices::Quantity,
};

/// Errors returned by a [`RemoteCartService`].
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport failure, including timeouts.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("cart service returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,

        /// Response body or reason
        message: String,
    },

    /// The service refused the request (unknown coupon, out of stock, ...).
    #[error("rejected by cart service: {0}")]
    Rejected(String),

    /// The base URL cannot have request paths appended to it.
    #[error("invalid cart service url: {0}")]
    InvalidUrl(String),

    /// The response body could not be turned into cart state.
    #[error("invalid cart payload: {0}")]
    InvalidPayload(String),
}

/// A coupon accepted by the service, with the cart it now applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct CouponApplied {
    /// Confirmed coupon terms
    pub coupon: Coupon,

    /// Updated cart, when the service returns one
    pub cart: Option<ServerCart>,
}

/// The remote cart API.
///
/// Every mutation answers with the full confirmed cart.
#[automock]
#[async_trait]
pub trait RemoteCartService: Send + Sync {
    /// Adds an item.
    async fn add_item(&self, item: NewCartItem) -> Result<ServerCart, RemoteError>;

    /// Sets an item's quantity.
    async fn update_item(&self, id: ItemId, quantity: Quantity) -> Result<ServerCart, RemoteError>;

    /// Removes an item.
    async fn remove_item(&self, id: ItemId) -> Result<ServerCart, RemoteError>;

    /// Validates and applies a coupon code.
    async fn apply_coupon(&self, code: String) -> Result<CouponApplied, RemoteError>;

    /// Removes an applied coupon.
    async fn remove_coupon(&self, id: String) -> Result<ServerCart, RemoteError>;

    /// Selects a shipping method and prices it.
    async fn calculate_shipping(&self, method_id: String) -> Result<ServerCart, RemoteError>;

    /// Fetches the current cart.
    async fn get_cart(&self) -> Result<ServerCart, RemoteError>;
}
