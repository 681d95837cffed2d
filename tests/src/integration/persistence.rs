//! # File-Backed Sessions
//!
//! Stores backed by `FileBackedPersistentStore` across simulated restarts:
//! a fresh hub (no live peers) over the same data directory.

#[cfg(test)]
mod tests {
    use super::super::{bounded, eventually};
    use channel_bus::BroadcastHub;
    use channel_state::{
        ChannelContext, ChannelStore, ChannelStoreOptions, FileBackedPersistentStore,
        PersistentStore, StatusBinding, StoreStatus,
    };
    use serde::{Deserialize, Serialize};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Preferences {
        theme: String,
        font_size: u8,
    }

    fn defaults() -> Preferences {
        Preferences {
            theme: "light".into(),
            font_size: 14,
        }
    }

    fn dark() -> Preferences {
        Preferences {
            theme: "dark".into(),
            font_size: 16,
        }
    }

    /// A new origin session: fresh hub, same directory.
    fn session(dir: &Path) -> ChannelContext {
        ChannelContext::new(
            Arc::new(BroadcastHub::new()),
            Arc::new(FileBackedPersistentStore::new(dir)),
        )
    }

    fn open(ctx: &ChannelContext) -> ChannelStore<Preferences> {
        let options = ChannelStoreOptions::new("prefs", defaults())
            .persist(true)
            .init_timeout(Duration::from_millis(100));
        ChannelStore::new(ctx, options).unwrap()
    }

    async fn ready(store: &ChannelStore<Preferences>) -> StoreStatus {
        bounded(StatusBinding::new(store).unwrap().ready()).await
    }

    #[tokio::test]
    async fn test_value_survives_restart() {
        let dir = tempdir().unwrap();

        {
            let ctx = session(dir.path());
            let tab = open(&ctx);
            tab.set(dark()).await.unwrap();
            tab.destroy();
        }

        let ctx = session(dir.path());
        let tab = open(&ctx);
        assert_eq!(ready(&tab).await, StoreStatus::Ready);
        assert_eq!(tab.get(), dark());
    }

    #[tokio::test]
    async fn test_empty_directory_falls_back_to_initial() {
        let dir = tempdir().unwrap();
        let ctx = session(dir.path());
        let tab = open(&ctx);

        assert_eq!(ready(&tab).await, StoreStatus::Ready);
        assert_eq!(tab.get(), defaults());
    }

    #[tokio::test]
    async fn test_last_write_reaches_disk() {
        let dir = tempdir().unwrap();
        let ctx = session(dir.path());
        let tab = open(&ctx);

        let mut pending = Vec::new();
        for size in 10..20 {
            pending.push(tab.set(Preferences {
                theme: "dark".into(),
                font_size: size,
            }));
        }
        for completion in pending {
            completion.await.unwrap();
        }

        let handle = ctx.storage().open("channel-state__prefs").await.unwrap();
        let stored = handle.get("state").await.unwrap().unwrap();
        let decoded: Preferences = serde_json::from_slice(&stored).unwrap();
        assert_eq!(decoded.font_size, 19);
    }

    #[tokio::test]
    async fn test_live_peers_and_disk_agree() {
        let dir = tempdir().unwrap();
        let ctx = session(dir.path());
        let first = open(&ctx);
        let second = open(&ctx);
        ready(&first).await;
        ready(&second).await;

        first.set(dark()).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || second.get() == dark()).await);

        // A third tab reads the same value from disk
        let third = open(&ctx);
        assert_eq!(ready(&third).await, StoreStatus::Ready);
        assert_eq!(third.get(), dark());
    }

    #[tokio::test]
    async fn test_corrupt_file_asks_peers() {
        let dir = tempdir().unwrap();
        let store = FileBackedPersistentStore::new(dir.path());
        std::fs::create_dir_all(dir.path()).unwrap();
        std::fs::write(store.path_for("channel-state__prefs"), b"garbage").unwrap();

        let ctx = session(dir.path());
        let peer = ChannelStore::new(&ctx, ChannelStoreOptions::new("prefs", dark())).unwrap();
        peer.set(dark());

        let tab = open(&ctx);
        assert_eq!(ready(&tab).await, StoreStatus::Ready);
        assert_eq!(tab.get(), dark());
    }
}
