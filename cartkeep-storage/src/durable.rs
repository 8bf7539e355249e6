//! Cart store persisted in a remote hash-field store.
//!
//! Each user's cart is one encoded record at key `user_id`, field
//! [`CART_FIELD`]. `add_item` is a read-merge-write with an unconditional
//! overwrite and no compare-and-set, so two concurrent adds for the same user
//! can race: both read the same record and the later write drops the earlier
//! increment. Callers that need exact counts under concurrency must use the
//! local store.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use cartkeep_core::{
    decode_cart, empty_record, encode_cart, Cart, CartResult, OpContext, StartupPolicy,
    StorageError, StoreConfig,
};

use crate::kv::{HashStore, KvError};
use crate::startup::Startup;
use crate::traits::CartStore;

/// Hash field holding the encoded cart.
pub const CART_FIELD: &str = "cart";

/// Durable cart store over any [`HashStore`].
pub struct DurableCartStore<S> {
    store: S,
    empty_record: Vec<u8>,
    ping_timeout: Duration,
    startup: StartupPolicy,
}

impl<S: HashStore> DurableCartStore<S> {
    /// Wrap `store` with the default startup policy and a 5s ping timeout.
    pub fn new(store: S) -> Self {
        Self::with_config(store, &StoreConfig::default())
    }

    /// Wrap `store` using the timing settings of `config`.
    pub fn with_config(store: S, config: &StoreConfig) -> Self {
        Self {
            store,
            empty_record: empty_record(),
            ping_timeout: config.ping_timeout,
            startup: config.startup.clone(),
        }
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn with_startup_policy(mut self, policy: StartupPolicy) -> Self {
        self.startup = policy;
        self
    }

    /// The underlying hash store.
    pub fn inner(&self) -> &S {
        &self.store
    }

    async fn read_record(
        &self,
        ctx: &OpContext,
        user_id: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        ctx.run(self.store.hget(user_id, CART_FIELD))
            .await?
            .map_err(|e| read_failed(user_id, e))
    }

    async fn write_record(
        &self,
        ctx: &OpContext,
        user_id: &str,
        record: &[u8],
    ) -> Result<(), StorageError> {
        ctx.run(self.store.hset(user_id, CART_FIELD, record))
            .await?
            .map_err(|e| write_failed(user_id, e))
    }
}

fn read_failed(user_id: &str, err: KvError) -> StorageError {
    tracing::error!(user_id, error = %err, "Cart read failed");
    StorageError::ReadFailed {
        user_id: user_id.to_string(),
        reason: err.to_string(),
    }
}

fn write_failed(user_id: &str, err: KvError) -> StorageError {
    tracing::error!(user_id, error = %err, "Cart write failed");
    StorageError::WriteFailed {
        user_id: user_id.to_string(),
        reason: err.to_string(),
    }
}

fn decode_record(user_id: &str, record: &[u8]) -> Result<Cart, StorageError> {
    decode_cart(record).map_err(|e| {
        tracing::error!(user_id, error = %e, "Corrupt cart record");
        StorageError::CorruptRecord {
            user_id: user_id.to_string(),
            reason: e.to_string(),
        }
    })
}

#[async_trait]
impl<S: HashStore> CartStore for DurableCartStore<S> {
    async fn initialize(&self, ctx: &OpContext) -> CartResult<()> {
        tracing::info!(
            max_attempts = self.startup.max_attempts,
            "Waiting for cart backend"
        );
        Startup::new(self.startup.clone())
            .with_component("redis")
            .run(ctx, |_| self.ping(ctx))
            .await?;
        Ok(())
    }

    async fn add_item(
        &self,
        ctx: &OpContext,
        user_id: &str,
        product_id: &str,
        quantity: u32,
    ) -> CartResult<()> {
        tracing::debug!(user_id, product_id, quantity, "add_item");

        let cart = match self.read_record(ctx, user_id).await? {
            None => Cart::with_item(user_id, product_id, quantity),
            Some(record) => {
                let mut cart = decode_record(user_id, &record)?;
                cart.add_item(product_id, quantity);
                cart
            }
        };

        self.write_record(ctx, user_id, &encode_cart(&cart)).await?;
        Ok(())
    }

    async fn empty_cart(&self, ctx: &OpContext, user_id: &str) -> CartResult<()> {
        tracing::debug!(user_id, "empty_cart");
        self.write_record(ctx, user_id, &self.empty_record).await?;
        Ok(())
    }

    async fn get_cart(&self, ctx: &OpContext, user_id: &str) -> CartResult<Cart> {
        tracing::debug!(user_id, "get_cart");
        match self.read_record(ctx, user_id).await? {
            None => Ok(Cart::default()),
            Some(record) => Ok(decode_record(user_id, &record)?),
        }
    }

    async fn ping(&self, ctx: &OpContext) -> bool {
        let start = Instant::now();
        let outcome =
            tokio::time::timeout(self.ping_timeout, ctx.run(self.store.ping())).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(Ok(()))) => true,
            Ok(Ok(Err(e))) => {
                tracing::warn!(error = %e, elapsed_ms, "Ping failed");
                false
            }
            Ok(Err(reason)) => {
                tracing::warn!(error = %reason, elapsed_ms, "Ping interrupted");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.ping_timeout.as_millis() as u64,
                    "Ping timed out"
                );
                false
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::InMemoryHashStore;
    use cartkeep_core::{CartError, CartItem, ContextError, UnavailableError};
    use tokio::time::Instant as TokioInstant;

    fn ctx() -> OpContext {
        OpContext::background()
    }

    fn store() -> DurableCartStore<InMemoryHashStore> {
        DurableCartStore::new(InMemoryHashStore::new())
    }

    #[tokio::test]
    async fn test_merge_scenario() {
        let store = store();
        store.add_item(&ctx(), "u1", "A", 2).await.unwrap();
        store.add_item(&ctx(), "u1", "B", 1).await.unwrap();
        store.add_item(&ctx(), "u1", "A", 3).await.unwrap();

        let cart = store.get_cart(&ctx(), "u1").await.unwrap();
        assert_eq!(cart.user_id, "u1");
        assert_eq!(
            cart.items,
            vec![CartItem::new("A", 5), CartItem::new("B", 1)]
        );
    }

    #[tokio::test]
    async fn test_record_lives_under_user_key_and_cart_field() {
        let store = store();
        store.add_item(&ctx(), "u1", "A", 2).await.unwrap();

        let raw = store.inner().raw("u1", CART_FIELD).unwrap();
        assert_eq!(decode_cart(&raw).unwrap(), Cart::with_item("u1", "A", 2));
        assert_eq!(store.inner().key_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_cart_reads_empty() {
        let store = store();
        let cart = store.get_cart(&ctx(), "nobody").await.unwrap();
        assert_eq!(cart, Cart::default());
        // Reading never creates a record.
        assert_eq!(store.inner().key_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_cart_writes_empty_record() {
        let store = store();
        store.add_item(&ctx(), "u1", "A", 2).await.unwrap();
        store.empty_cart(&ctx(), "u1").await.unwrap();
        store.empty_cart(&ctx(), "u1").await.unwrap();

        assert_eq!(store.inner().raw("u1", CART_FIELD), Some(empty_record()));
        assert!(store.get_cart(&ctx(), "u1").await.unwrap().is_empty());

        // Adding after emptying starts from the empty record.
        store.add_item(&ctx(), "u1", "B", 4).await.unwrap();
        let cart = store.get_cart(&ctx(), "u1").await.unwrap();
        assert_eq!(cart.items, vec![CartItem::new("B", 4)]);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let store = store();
        let garbage = vec![0x0a, 0xff, 0xff];
        store.inner().insert_raw("u1", CART_FIELD, garbage.clone());

        let err = store.get_cart(&ctx(), "u1").await.unwrap_err();
        assert!(matches!(
            err,
            CartError::Storage(StorageError::CorruptRecord { ref user_id, .. }) if user_id == "u1"
        ));

        let err = store.add_item(&ctx(), "u1", "A", 1).await.unwrap_err();
        assert!(matches!(
            err,
            CartError::Storage(StorageError::CorruptRecord { .. })
        ));
        // The corrupt record is left untouched.
        assert_eq!(store.inner().raw("u1", CART_FIELD), Some(garbage));
    }

    #[tokio::test]
    async fn test_medium_failures_surface_as_storage_errors() {
        let store = store();
        store.inner().set_reachable(false);

        assert!(matches!(
            store.get_cart(&ctx(), "u1").await,
            Err(CartError::Storage(StorageError::ReadFailed { .. }))
        ));
        assert!(matches!(
            store.add_item(&ctx(), "u1", "A", 1).await,
            Err(CartError::Storage(StorageError::ReadFailed { .. }))
        ));
        assert!(matches!(
            store.empty_cart(&ctx(), "u1").await,
            Err(CartError::Storage(StorageError::WriteFailed { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_adds_can_lose_an_update() {
        let store = DurableCartStore::new(
            InMemoryHashStore::new().with_read_latency(Duration::from_millis(10)),
        );

        let ctx = ctx();

        let (a, b) = tokio::join!(
            store.add_item(&ctx, "u2", "X", 1),
            store.add_item(&ctx, "u2", "X", 1),
        );
        a.unwrap();
        b.unwrap();

        // Both calls read the missing record before either wrote, so the
        // second write overwrote the first.
        let cart = store.get_cart(&ctx, "u2").await.unwrap();
        assert_eq!(cart.quantity_of("X"), 1);
        assert_eq!(store.inner().write_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_read_honors_deadline() {
        let store = DurableCartStore::new(
            InMemoryHashStore::new().with_read_latency(Duration::from_secs(30)),
        );
        let ctx = OpContext::background().with_timeout(Duration::from_secs(1));
        let start = TokioInstant::now();

        let err = store.add_item(&ctx, "u1", "A", 1).await.unwrap_err();

        assert_eq!(
            err,
            CartError::Storage(StorageError::Interrupted(ContextError::DeadlineExceeded))
        );
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(store.inner().write_count(), 0);
    }

    #[tokio::test]
    async fn test_ping_reports_reachability() {
        let store = store();
        assert!(store.ping(&ctx()).await);

        store.inner().set_reachable(false);
        assert!(!store.ping(&ctx()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_is_bounded_by_its_own_timeout() {
        let store = DurableCartStore::new(
            InMemoryHashStore::new().with_ping_latency(Duration::from_secs(60)),
        )
        .with_ping_timeout(Duration::from_secs(5));
        let start = TokioInstant::now();

        assert!(!store.ping(&ctx()).await);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_ping_with_cancelled_context_is_false() {
        let store = store();
        let (ctx, handle) = OpContext::background().with_cancel();
        handle.cancel();
        assert!(!store.ping(&ctx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_waits_for_backend() {
        let store = DurableCartStore::new(InMemoryHashStore::new().with_failing_pings(2));
        let start = TokioInstant::now();

        store.initialize(&ctx()).await.unwrap();

        assert_eq!(store.inner().ping_count(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_unreachable_exhausts_retries() {
        let store = store();
        store.inner().set_reachable(false);
        let start = TokioInstant::now();

        let err = store.initialize(&ctx()).await.unwrap_err();

        assert_eq!(
            err,
            CartError::Unavailable(UnavailableError::Exhausted { attempts: 30 })
        );
        assert_eq!(store.inner().ping_count(), 30);
        assert_eq!(start.elapsed(), StartupPolicy::default().total_backoff());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_with_slow_probes_adds_probe_time_per_attempt() {
        let policy = StartupPolicy::default();
        let store = DurableCartStore::new(
            InMemoryHashStore::new().with_ping_latency(Duration::from_secs(60)),
        )
        .with_ping_timeout(Duration::from_secs(5));
        let start = TokioInstant::now();

        let err = store.initialize(&ctx()).await.unwrap_err();

        assert_eq!(
            err,
            CartError::Unavailable(UnavailableError::Exhausted { attempts: 30 })
        );
        let probes = Duration::from_secs(5) * policy.max_attempts;
        assert_eq!(start.elapsed(), policy.total_backoff() + probes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_cancelled_during_last_probe() {
        let policy = StartupPolicy {
            max_attempts: 2,
            ..StartupPolicy::default()
        };
        let store = DurableCartStore::new(
            InMemoryHashStore::new().with_ping_latency(Duration::from_secs(10)),
        )
        .with_ping_timeout(Duration::from_secs(30))
        .with_startup_policy(policy);
        store.inner().set_reachable(false);
        let (ctx, handle) = OpContext::background().with_cancel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            handle.cancel();
        });

        let err = store.initialize(&ctx).await.unwrap_err();

        assert_eq!(
            err,
            CartError::Unavailable(UnavailableError::Aborted {
                attempts: 2,
                reason: ContextError::Cancelled
            })
        );
        assert_eq!(store.inner().ping_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_cancelled_mid_backoff() {
        let store = store();
        store.inner().set_reachable(false);
        let (ctx, handle) = OpContext::background().with_cancel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            handle.cancel();
        });

        let err = store.initialize(&ctx).await.unwrap_err();

        assert_eq!(
            err,
            CartError::Unavailable(UnavailableError::Aborted {
                attempts: 2,
                reason: ContextError::Cancelled
            })
        );
        assert_eq!(store.inner().ping_count(), 2);
    }
}
