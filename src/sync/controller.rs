//! Sync controller
//!
//! Pairs each local cart operation with its remote call. The local change is
//! applied first and the lock released before the call is awaited; when the
//! response arrives the server's cart replaces local state. Calls are not
//! queued, so when several are in flight the last response to arrive wins.
//!
//! On failure an optimistic addition is reverted. Every other operation keeps
//! its optimistic state and the failure is recorded on the cart until the
//! next successful sync or periodic resync corrects it.

use std::{fmt, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    cart::{AddOutcome, CartAggregate, Operation, ServerCart, SharedCart},
    items::{ItemId, NewCartItem},
    prices::Quantity,
    sync::{RemoteCartService, RemoteError},
};

/// A remote operation that failed.
#[derive(Debug, Error)]
#[error("{operation} failed: {source}")]
pub struct SyncError {
    /// The operation that failed
    pub operation: Operation,

    /// The remote error
    pub source: RemoteError,
}

/// Drives a shared cart against a [`RemoteCartService`].
#[derive(Clone)]
pub struct SyncController {
    cart: SharedCart,
    remote: Arc<dyn RemoteCartService>,
}

impl SyncController {
    /// Creates a controller for `cart`.
    pub fn new(cart: SharedCart, remote: Arc<dyn RemoteCartService>) -> Self {
        Self { cart, remote }
    }

    /// The cart this controller drives.
    pub fn cart(&self) -> &SharedCart {
        &self.cart
    }

    /// Adds an item locally, then confirms it remotely.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the service fails; the addition is reverted.
    #[tracing::instrument(
        name = "cart.sync.add_item",
        skip(self, item),
        fields(product_id = %item.product_id),
        err
    )]
    pub async fn add_item(&self, item: NewCartItem) -> Result<AddOutcome, SyncError> {
        let operation = Operation::AddItem;

        let outcome = {
            let mut cart = self.cart.lock().await;
            let outcome = cart.add_or_increment(item.clone());

            cart.begin_sync(operation);

            outcome
        };

        let result = self.remote.add_item(item).await;

        self.settle(operation, result, |cart| {
            cart.revert_add(&outcome);
        })
        .await?;

        Ok(outcome)
    }

    /// Sets a quantity locally, then confirms it remotely. A quantity of zero
    /// or less is a removal.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the service fails; the local quantity stays.
    #[tracing::instrument(
        name = "cart.sync.update_quantity",
        skip(self, id),
        fields(item_id = %id),
        err
    )]
    pub async fn update_quantity(&self, id: &ItemId, quantity: i64) -> Result<(), SyncError> {
        let Some(quantity) = Quantity::from_signed(quantity) else {
            return self.remove_item(id).await;
        };

        let operation = Operation::UpdateQuantity;

        {
            let mut cart = self.cart.lock().await;

            if !cart.set_quantity(id, i64::from(quantity.get())) {
                debug!("ignored quantity update for unknown item");
                return Ok(());
            }

            cart.begin_sync(operation);
        }

        let result = self.remote.update_item(id.clone(), quantity).await;

        self.settle(operation, result, |_| {}).await
    }

    /// Removes an item locally, then confirms it remotely.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the service fails; the item stays removed
    /// and can still be restored from the undo buffer.
    #[tracing::instrument(
        name = "cart.sync.remove_item",
        skip(self, id),
        fields(item_id = %id),
        err
    )]
    pub async fn remove_item(&self, id: &ItemId) -> Result<(), SyncError> {
        let operation = Operation::RemoveItem;

        {
            let mut cart = self.cart.lock().await;

            if cart.remove(id).is_none() {
                debug!("ignored removal of unknown item");
                return Ok(());
            }

            cart.begin_sync(operation);
        }

        let result = self.remote.remove_item(id.clone()).await;

        self.settle(operation, result, |_| {}).await
    }

    /// Applies a coupon code. The coupon only reaches the cart once the
    /// service has validated it.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the service rejects the code or returns an
    /// already expired coupon.
    #[tracing::instrument(name = "cart.sync.apply_coupon", skip(self), err)]
    pub async fn apply_coupon(&self, code: &str) -> Result<(), SyncError> {
        let operation = Operation::ApplyCoupon;

        self.cart.lock().await.begin_sync(operation);

        let result = self.remote.apply_coupon(code.to_string()).await;

        let mut cart = self.cart.lock().await;

        let applied = result.and_then(|applied| {
            if applied.coupon.is_expired(cart.clock().now()) {
                Err(RemoteError::Rejected(format!(
                    "coupon {} has expired",
                    applied.coupon.code
                )))
            } else {
                Ok(applied)
            }
        });

        match applied {
            Ok(applied) => {
                if let Some(server) = applied.cart {
                    cart.replace_all(server);
                }

                info!(coupon_id = %applied.coupon.id, "coupon confirmed");

                cart.apply_coupon(applied.coupon);
                cart.record_success(operation);

                Ok(())
            }
            Err(source) => Err(fail(&mut *cart, operation, source)),
        }
    }

    /// Removes a coupon locally, then confirms it remotely.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the service fails; the coupon stays removed.
    #[tracing::instrument(name = "cart.sync.remove_coupon", skip(self), err)]
    pub async fn remove_coupon(&self, id: &str) -> Result<(), SyncError> {
        let operation = Operation::RemoveCoupon;

        {
            let mut cart = self.cart.lock().await;

            cart.remove_coupon(id);
            cart.begin_sync(operation);
        }

        let result = self.remote.remove_coupon(id.to_string()).await;

        self.settle(operation, result, |_| {}).await
    }

    /// Selects a shipping method locally, then prices it remotely. Unknown
    /// methods are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the service fails; the selection stays.
    #[tracing::instrument(name = "cart.sync.select_shipping", skip(self), err)]
    pub async fn select_shipping(&self, method_id: &str) -> Result<(), SyncError> {
        let operation = Operation::SelectShipping;

        {
            let mut cart = self.cart.lock().await;

            if !cart.select_shipping_method(method_id) {
                return Ok(());
            }

            cart.begin_sync(operation);
        }

        let result = self.remote.calculate_shipping(method_id.to_string()).await;

        self.settle(operation, result, |_| {}).await
    }

    /// Replaces local state with the service's current cart.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] if the cart cannot be fetched.
    #[tracing::instrument(name = "cart.sync.sync_cart", skip(self), err)]
    pub async fn sync_cart(&self) -> Result<(), SyncError> {
        let operation = Operation::Resync;

        self.cart.lock().await.begin_sync(operation);

        let result = self.remote.get_cart().await;

        self.settle(operation, result, |_| {}).await
    }

    /// Runs [`SyncController::sync_cart`] every `interval`, starting one
    /// interval from now, until the handle is stopped or dropped.
    pub fn spawn_resync(&self, interval: Duration) -> ResyncHandle {
        let controller = self.clone();
        let (stop, mut stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);

            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        if let Err(error) = controller.sync_cart().await {
                            warn!(%error, "periodic resync failed");
                        }
                    }
                }
            }

            debug!("periodic resync stopped");
        });

        ResyncHandle { stop, task }
    }

    async fn settle(
        &self,
        operation: Operation,
        result: Result<ServerCart, RemoteError>,
        revert: impl FnOnce(&mut CartAggregate),
    ) -> Result<(), SyncError> {
        let mut cart = self.cart.lock().await;

        match result {
            Ok(server) => {
                cart.replace_all(server);
                cart.record_success(operation);

                Ok(())
            }
            Err(source) => {
                revert(&mut *cart);

                Err(fail(&mut *cart, operation, source))
            }
        }
    }
}

impl fmt::Debug for SyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController").finish_non_exhaustive()
    }
}

/// Stops a periodic resync when stopped or dropped.
#[derive(Debug)]
pub struct ResyncHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ResyncHandle {
    /// Stops the resync loop and waits for it to finish. A resync already in
    /// flight completes first.
    pub async fn stop(self) {
        let ResyncHandle { stop, task } = self;

        drop(stop);

        if let Err(error) = task.await {
            warn!(%error, "periodic resync task ended abnormally");
        }
    }
}

fn fail(cart: &mut CartAggregate, operation: Operation, source: RemoteError) -> SyncError {
    warn!(%operation, error = %source, "cart sync failed");

    cart.record_failure(operation, source.to_string());

    SyncError { operation, source }
}
