//! Integration tests for driving a shared cart against a remote service.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use jiff::Timestamp;
use rustc_hash::FxHashMap;
use testresult::TestResult;
use tokio::sync::oneshot;

use carton::{
    cart::{CartAggregate, Operation, ServerCart, SharedCart},
    clock::ManualClock,
    config::CartConfig,
    items::{CartItem, ItemId, NewCartItem},
    prices::{Price, Quantity},
    sync::{CouponApplied, MockRemoteCartService, RemoteCartService, RemoteError, SyncController},
};

/// Answers quantity updates from channels the test controls, so responses can
/// be released in any order.
#[derive(Debug, Default)]
struct ScriptedService {
    replies: Mutex<FxHashMap<u32, oneshot::Receiver<ServerCart>>>,
}

impl ScriptedService {
    fn expect_update(&self, quantity: u32) -> oneshot::Sender<ServerCart> {
        let (reply, receiver) = oneshot::channel();

        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(quantity, receiver);

        reply
    }
}

fn unsupported() -> RemoteError {
    RemoteError::Rejected("unsupported".to_string())
}

#[async_trait]
impl RemoteCartService for ScriptedService {
    async fn add_item(&self, _item: NewCartItem) -> Result<ServerCart, RemoteError> {
        Err(unsupported())
    }

    async fn update_item(&self, _id: ItemId, quantity: Quantity) -> Result<ServerCart, RemoteError> {
        let receiver = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&quantity.get())
            .ok_or_else(unsupported)?;

        receiver
            .await
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))
    }

    async fn remove_item(&self, _id: ItemId) -> Result<ServerCart, RemoteError> {
        Err(unsupported())
    }

    async fn apply_coupon(&self, _code: String) -> Result<CouponApplied, RemoteError> {
        Err(unsupported())
    }

    async fn remove_coupon(&self, _id: String) -> Result<ServerCart, RemoteError> {
        Err(unsupported())
    }

    async fn calculate_shipping(&self, _method_id: String) -> Result<ServerCart, RemoteError> {
        Err(unsupported())
    }

    async fn get_cart(&self) -> Result<ServerCart, RemoteError> {
        Err(unsupported())
    }
}

fn shared_cart() -> TestResult<SharedCart> {
    let clock = Arc::new(ManualClock::new(Timestamp::UNIX_EPOCH));

    Ok(CartAggregate::from_config(&CartConfig::default(), clock)?.into_shared())
}

fn tee() -> TestResult<NewCartItem> {
    Ok(NewCartItem::new("tee", Quantity::ONE, Price::new("500".parse()?)?))
}

fn mug() -> TestResult<NewCartItem> {
    Ok(NewCartItem::new("mug", Quantity::ONE, Price::new("25".parse()?)?))
}

fn with_quantity(item: &CartItem, quantity: u32) -> TestResult<CartItem> {
    let mut item = item.clone();
    item.quantity = Quantity::new(quantity).ok_or("zero quantity")?;

    Ok(item)
}

async fn quantity_of(cart: &SharedCart, id: &ItemId) -> Option<u32> {
    cart.lock().await.item(id).map(|item| item.quantity.get())
}

#[tokio::test]
async fn last_response_to_arrive_wins() -> TestResult {
    let cart = shared_cart()?;

    let (tee, mug) = {
        let mut cart = cart.lock().await;

        let tee_id = cart.add_or_increment(tee()?).id().clone();
        let mug_id = cart.add_or_increment(mug()?).id().clone();

        (
            cart.item(&tee_id).cloned().ok_or("tee not added")?,
            cart.item(&mug_id).cloned().ok_or("mug not added")?,
        )
    };

    let service = Arc::new(ScriptedService::default());
    let tee_reply = service.expect_update(2);
    let mug_reply = service.expect_update(3);

    let controller = SyncController::new(Arc::clone(&cart), service);

    let tee_update = tokio::spawn({
        let controller = controller.clone();
        let id = tee.id.clone();

        async move { controller.update_quantity(&id, 2).await }
    });

    let mug_update = tokio::spawn({
        let controller = controller.clone();
        let id = mug.id.clone();

        async move { controller.update_quantity(&id, 3).await }
    });

    // The mug update was issued second but is answered first, with both
    // changes applied.
    let both = vec![with_quantity(&tee, 2)?, with_quantity(&mug, 3)?];

    mug_reply
        .send(ServerCart::with_items(both.clone()))
        .map_err(|cart| format!("{cart:?}"))?;
    mug_update.await??;

    assert_eq!(cart.lock().await.items(), both.as_slice());
    assert!(cart.lock().await.sync_status().is_syncing(), "tee update still in flight");

    // The tee response was produced before the mug change reached the server.
    let stale = vec![with_quantity(&tee, 2)?, mug.clone()];

    tee_reply
        .send(ServerCart::with_items(stale.clone()))
        .map_err(|cart| format!("{cart:?}"))?;
    tee_update.await??;

    assert_eq!(
        cart.lock().await.items(),
        stale.as_slice(),
        "the last response to complete replaces the item list"
    );
    assert_eq!(quantity_of(&cart, &mug.id).await, Some(1));
    assert!(!cart.lock().await.sync_status().is_syncing());

    Ok(())
}

#[tokio::test]
async fn resync_corrects_a_failed_removal() -> TestResult {
    let cart = shared_cart()?;

    let id = cart.lock().await.add_or_increment(tee()?).id().clone();
    let item = cart.lock().await.item(&id).cloned().ok_or("not added")?;

    let mut remote = MockRemoteCartService::new();

    remote
        .expect_remove_item()
        .once()
        .return_once(|_| Err(RemoteError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }));

    let server = ServerCart::with_items(vec![item.clone()]);

    remote
        .expect_get_cart()
        .once()
        .return_once(move || Ok(server));

    let controller = SyncController::new(Arc::clone(&cart), Arc::new(remote));

    let error = controller.remove_item(&id).await.err().ok_or("removal succeeded")?;

    assert_eq!(error.operation, Operation::RemoveItem);

    {
        let cart = cart.lock().await;

        assert!(cart.items().is_empty(), "removal is kept after failure");
        assert_eq!(
            cart.sync_status().last_error().map(|failure| failure.operation),
            Some(Operation::RemoveItem)
        );
    }

    controller.sync_cart().await?;

    let cart = cart.lock().await;

    assert_eq!(cart.items(), [item]);
    assert!(cart.sync_status().last_error().is_none(), "success clears the error");

    Ok(())
}
