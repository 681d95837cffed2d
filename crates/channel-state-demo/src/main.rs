//! # Channel-State Demo
//!
//! Simulates several contexts of one origin (think browser tabs) sharing a
//! session value.
//!
//! ## Run Sequence
//!
//! 1. Load configuration (from env)
//! 2. Install the tracing subscriber
//! 3. Open `CHANNEL_STATE_CONTEXTS` stores on one hub and one file store
//! 4. Write from the first context and watch the others follow
//! 5. Start a late joiner and let it sync from its peers
//! 6. Tear everything down and reopen from disk alone

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use channel_bus::BroadcastHub;
use channel_state::{
    ChannelContext, ChannelStore, ChannelStoreOptions, FileBackedPersistentStore, StateBinding,
    StatusBinding,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::DemoConfig;

const STORE_NAME: &str = "session";

/// The shared value every context keeps in sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Session {
    visits: u64,
    theme: String,
}

fn init_tracing(config: &DemoConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false),
        )
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

fn session_options(config: &DemoConfig) -> ChannelStoreOptions<Session> {
    ChannelStoreOptions::new(STORE_NAME, Session::default())
        .persist(true)
        .init_timeout(config.init_timeout)
}

/// Open a context and wait until it has a starting value.
async fn open_context(ctx: &ChannelContext, config: &DemoConfig) -> Result<ChannelStore<Session>> {
    let store = ChannelStore::new(ctx, session_options(config)).context("failed to open store")?;
    let status = StatusBinding::new(&store)?.ready().await;
    info!(instance = %store.instance_id(), %status, value = ?store.get(), "Context ready");
    Ok(store)
}

fn report(label: &str, contexts: &[ChannelStore<Session>]) {
    for (index, store) in contexts.iter().enumerate() {
        info!(label, context = index, status = %store.status(), value = ?store.get(), "Context state");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = DemoConfig::from_env();
    init_tracing(&config)?;

    info!("===========================================");
    info!("  Channel-State Demo v{}", env!("CARGO_PKG_VERSION"));
    info!("  Contexts: {}", config.contexts);
    info!("  Data dir: {}", config.data_dir.display());
    info!("===========================================");

    let ctx = ChannelContext::new(
        Arc::new(BroadcastHub::new()),
        Arc::new(FileBackedPersistentStore::new(&config.data_dir)),
    );

    let mut contexts = Vec::with_capacity(config.contexts);
    for _ in 0..config.contexts {
        contexts.push(open_context(&ctx, &config).await?);
    }
    report("started", &contexts);

    // Write from the first context and wait for the last one to follow
    let writer = &contexts[0];
    let mut follower = StateBinding::new(&contexts[contexts.len() - 1])?;
    let mut next = writer.get();
    next.visits += 1;
    next.theme = if next.theme == "dark" { "light" } else { "dark" }.to_string();
    writer
        .set(next.clone())
        .await
        .context("durable write failed")?;

    if contexts.len() > 1 {
        match tokio::time::timeout(Duration::from_secs(1), follower.changed()).await {
            Ok(Some(seen)) => info!(value = ?seen, "Last context followed the write"),
            _ => warn!("Last context did not observe the write"),
        }
    }
    report("after write", &contexts);

    // A late joiner syncs from its ready peers
    let late = open_context(&ctx, &config).await?;
    if late.get() != next {
        warn!(value = ?late.get(), "Late joiner disagrees with its peers");
    }
    contexts.push(late);

    // Close every context; the durable store outlives them
    for store in &contexts {
        store.destroy();
    }
    drop(contexts);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reopened = open_context(&ctx, &config).await?;
    info!(value = ?reopened.get(), "Reopened from disk");
    reopened.destroy();

    Ok(())
}
