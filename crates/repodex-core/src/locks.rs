//! Advisory per-channel locks.
//!
//! A map from channel name to an async mutex, populated on demand. Passes on
//! the same channel serialize; passes on different channels never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Channel name to async mutex. Clones share the table.
#[derive(Debug, Default, Clone)]
pub struct ChannelLocks {
    table: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of one pass over `channel`.
#[derive(Debug)]
pub struct ChannelGuard {
    channel: String,
    _guard: OwnedMutexGuard<()>,
}

impl ChannelGuard {
    /// The locked channel.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl ChannelLocks {
    /// An empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, channel: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop entries nobody holds or waits on.
        table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        table
            .entry(channel.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait until no other pass holds `channel`, then hold it.
    pub async fn lock(&self, channel: &str) -> ChannelGuard {
        let guard = self.entry(channel).lock_owned().await;
        ChannelGuard {
            channel: channel.to_string(),
            _guard: guard,
        }
    }

    /// Hold `channel` only if it is free right now.
    pub fn try_lock(&self, channel: &str) -> Option<ChannelGuard> {
        let guard = self.entry(channel).try_lock_owned().ok()?;
        Some(ChannelGuard {
            channel: channel.to_string(),
            _guard: guard,
        })
    }

    /// Number of channels currently held or awaited.
    pub fn tracked(&self) -> usize {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_channel_is_exclusive() {
        let locks = ChannelLocks::new();
        let guard = locks.lock("main").await;
        assert_eq!(guard.channel(), "main");
        assert!(locks.try_lock("main").is_none());
        drop(guard);
        assert!(locks.try_lock("main").is_some());
    }

    #[tokio::test]
    async fn test_different_channels_do_not_contend() {
        let locks = ChannelLocks::new();
        let _a = locks.lock("alpha").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock("beta")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_waiter_acquires_after_release() {
        let locks = ChannelLocks::new();
        let guard = locks.lock("main").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock("main").await.channel().to_string() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert_eq!(waiter.await.unwrap(), "main");
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = ChannelLocks::new();
        drop(locks.lock("a").await);
        drop(locks.lock("b").await);
        let _c = locks.lock("c").await;
        assert_eq!(locks.tracked(), 1);
    }
}
