//! # Integration Tests
//!
//! Shared fixtures for the flows below.

pub mod flows;
pub mod persistence;

use std::future::Future;
use std::time::Duration;

/// Poll `condition` until it holds or `limit` elapses.
pub async fn eventually<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Let spawned tasks and in-flight messages run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Run `future` with a generous upper bound so a hang fails instead of stalling.
pub async fn bounded<T>(future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(Duration::from_secs(5), future).await {
        Ok(value) => value,
        Err(_) => panic!("flow did not finish within 5s"),
    }
}
