//! # Multi-Instance Flows
//!
//! Several stores with one name on one hub, the way several tabs of one origin
//! share a channel.
//!
//! ## Flows Tested:
//!
//! 1. **Convergence**: sequential writes from random instances leave every
//!    instance holding the last value
//! 2. **Late joiners**: instances created after the others become ready adopt
//!    a peer's value instead of waiting out the timeout
//! 3. **Isolation**: different hubs (origins) and different names never mix
//! 4. **Churn**: destroying instances mid-flight does not disturb the rest

#[cfg(test)]
mod tests {
    use super::super::{bounded, settle};
    use channel_state::{
        ChannelContext, ChannelStore, ChannelStoreOptions, StateBinding, StatusBinding,
        StoreStatus,
    };
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Cart {
        items: Vec<String>,
        revision: u32,
    }

    fn empty_cart() -> Cart {
        Cart {
            items: Vec::new(),
            revision: 0,
        }
    }

    fn open(ctx: &ChannelContext, name: &str) -> ChannelStore<Cart> {
        ChannelStore::new(ctx, ChannelStoreOptions::new(name, empty_cart())).unwrap()
    }

    fn open_many(ctx: &ChannelContext, name: &str, count: usize) -> Vec<ChannelStore<Cart>> {
        (0..count).map(|_| open(ctx, name)).collect()
    }

    // =============================================================================
    // CONVERGENCE
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_sequential_random_writers_converge() {
        let ctx = ChannelContext::in_memory();
        let stores = open_many(&ctx, "cart", 5);
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let mut expected = empty_cart();

        for revision in 1..=40 {
            let writer = &stores[rng.gen_range(0..stores.len())];
            expected.revision = revision;
            expected.items.push(format!("item-{}", rng.gen_range(0..1000)));
            writer.set(expected.clone());
            settle().await;
        }

        for store in &stores {
            assert_eq!(store.get(), expected);
            assert_eq!(store.status(), StoreStatus::Ready);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_peers_see_each_write_once_in_order() {
        let ctx = ChannelContext::in_memory();
        let writer = open(&ctx, "feed");
        let reader = open(&ctx, "feed");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        reader
            .subscribe(move |cart: &Cart| sink.lock().push(cart.revision))
            .unwrap();

        for revision in 1..=10 {
            writer.set(Cart {
                items: vec![],
                revision,
            });
        }
        settle().await;

        assert_eq!(*seen.lock(), (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_peers_times_out_to_initial_value() {
        let ctx = ChannelContext::in_memory();
        let lonely = open(&ctx, "alone");
        let mut status = StatusBinding::new(&lonely).unwrap();

        let started = tokio::time::Instant::now();
        assert_eq!(status.ready().await, StoreStatus::Ready);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(lonely.get(), empty_cart());
    }

    // =============================================================================
    // LATE JOINERS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_late_joiners_adopt_without_waiting() {
        let ctx = ChannelContext::in_memory();
        let first = open(&ctx, "cart");
        first.set(Cart {
            items: vec!["book".into()],
            revision: 1,
        });

        let started = tokio::time::Instant::now();
        let joiners = open_many(&ctx, "cart", 4);
        for joiner in &joiners {
            let status = bounded(StatusBinding::new(joiner).unwrap().ready()).await;
            assert_eq!(status, StoreStatus::Ready);
            assert_eq!(joiner.get(), first.get());
        }
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_joiner_answers_once_ready() {
        let ctx = ChannelContext::in_memory();
        let a = open(&ctx, "chain");
        a.set(Cart {
            items: vec![],
            revision: 3,
        });

        // B learns from A, then A leaves; C must learn from B
        let b = open(&ctx, "chain");
        settle().await;
        assert_eq!(b.status(), StoreStatus::Ready);
        a.destroy();

        let c = open(&ctx, "chain");
        settle().await;
        assert_eq!(c.status(), StoreStatus::Ready);
        assert_eq!(c.get().revision, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_binding_stream_tracks_remote_writes() {
        let ctx = ChannelContext::in_memory();
        let local = open(&ctx, "stream");
        let remote = open(&ctx, "stream");
        let mut stream = StateBinding::new(&local).unwrap().into_stream();

        // Current value first
        assert_eq!(stream.next().await.map(|c| c.revision), Some(0));

        remote.set(Cart {
            items: vec!["pen".into()],
            revision: 1,
        });
        let next = bounded(stream.next()).await;
        assert_eq!(next.map(|c| c.revision), Some(1));

        local.destroy();
        assert_eq!(bounded(stream.next()).await, None);
    }

    // =============================================================================
    // ISOLATION
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_origins_are_isolated() {
        let left = ChannelContext::in_memory();
        let right = ChannelContext::in_memory();
        let a = open(&left, "cart");
        let b = open(&right, "cart");

        a.set(Cart {
            items: vec!["left".into()],
            revision: 1,
        });
        tokio::time::sleep(Duration::from_millis(600)).await;

        assert_eq!(b.get(), empty_cart());
        assert_eq!(b.status(), StoreStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_names_share_a_hub_without_mixing() {
        let ctx = ChannelContext::in_memory();
        let carts = open_many(&ctx, "cart", 2);
        let wishlists = open_many(&ctx, "wishlist", 2);

        carts[0].set(Cart {
            items: vec!["a".into()],
            revision: 1,
        });
        wishlists[1].set(Cart {
            items: vec!["b".into()],
            revision: 2,
        });
        settle().await;

        assert_eq!(carts[1].get().revision, 1);
        assert_eq!(wishlists[0].get().revision, 2);
        assert_eq!(ctx.hub().open_channels("channel-state__cart"), 2);
        assert_eq!(ctx.hub().open_channels("channel-state__wishlist"), 2);
    }

    // =============================================================================
    // CHURN
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_churn_keeps_survivors_in_sync() {
        let ctx = ChannelContext::in_memory();
        let mut stores = open_many(&ctx, "churn", 6);
        let mut rng = StdRng::seed_from_u64(7);
        stores[0].set(empty_cart());
        settle().await;

        for revision in 1..=12 {
            if revision % 3 == 0 && stores.len() > 2 {
                let leaving = rng.gen_range(0..stores.len());
                drop(stores.remove(leaving));
            }
            if revision % 4 == 0 {
                stores.push(open(&ctx, "churn"));
                settle().await;
            }
            let writer = &stores[rng.gen_range(0..stores.len())];
            writer.set(Cart {
                items: vec![],
                revision,
            });
            settle().await;
        }

        for store in &stores {
            assert_eq!(store.get().revision, 12);
        }
        assert_eq!(ctx.hub().open_channels("channel-state__churn"), stores.len());
    }
}
