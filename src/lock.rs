//! Per-channel mutual exclusion.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::abiencode::types::Address;

/// One async mutex per channel address, created on first use.
#[derive(Debug, Default)]
pub struct ChannelLocks {
    locks: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

/// Proof of holding the lock of `channel`. Dropping it releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    channel: Address,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn channel(&self) -> Address {
        self.channel
    }
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no one else holds the lock of `channel`.
    pub async fn acquire(&self, channel: Address) -> LockGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(channel).or_default())
        };
        LockGuard {
            channel,
            _guard: lock.lock_owned().await,
        }
    }

    /// Take the lock of `channel` if it is free.
    pub async fn try_acquire(&self, channel: Address) -> Option<LockGuard> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(channel).or_default())
        };
        lock.try_lock_owned().ok().map(|guard| LockGuard {
            channel,
            _guard: guard,
        })
    }

    pub fn release(&self, guard: LockGuard) {
        drop(guard);
    }
}
