//! Persistence of the latest double-signed state per channel.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{abiencode::types::Address, channel::ChannelState};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Writes have to strictly increase the nonce of a channel.
    #[error("channel {channel:?} is at nonce {stored}, refusing to write nonce {got}")]
    StaleWrite {
        channel: Address,
        stored: u64,
        got: u64,
    },
    #[error("backend: {0}")]
    Backend(String),
}

pub type Result<T> = core::result::Result<T, StoreError>;

/// Storage of channel states, keyed by channel address.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn get_channel_state(&self, channel: &Address) -> Result<Option<ChannelState>>;

    /// Persist `state` as the latest state of its channel.
    ///
    /// Must fail if the stored nonce is not lower than `state.nonce()`.
    async fn save_channel_state(&self, state: &ChannelState) -> Result<()>;
}

/// In-memory store. Everything is lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    channels: RwLock<HashMap<Address, ChannelState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a channel unconditionally, for restores and tests.
    pub async fn restore(&self, state: ChannelState) {
        self.channels
            .write()
            .await
            .insert(state.channel_address(), state);
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn get_channel_state(&self, channel: &Address) -> Result<Option<ChannelState>> {
        Ok(self.channels.read().await.get(channel).cloned())
    }

    async fn save_channel_state(&self, state: &ChannelState) -> Result<()> {
        let mut channels = self.channels.write().await;
        if let Some(stored) = channels.get(&state.channel_address()) {
            if stored.nonce() >= state.nonce() {
                return Err(StoreError::StaleWrite {
                    channel: state.channel_address(),
                    stored: stored.nonce(),
                    got: state.nonce(),
                });
            }
        }
        channels.insert(state.channel_address(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::tests::{funded_channel, parties};

    #[tokio::test]
    async fn save_then_get() {
        let store = MemoryStore::new();
        let state = funded_channel(&parties());

        assert_eq!(
            store.get_channel_state(&state.channel_address()).await,
            Ok(None)
        );
        store.save_channel_state(&state).await.unwrap();
        assert_eq!(
            store.get_channel_state(&state.channel_address()).await,
            Ok(Some(state))
        );
    }

    #[tokio::test]
    async fn nonce_never_goes_back() {
        let store = MemoryStore::new();
        let state = funded_channel(&parties());
        store.save_channel_state(&state).await.unwrap();

        let mut older = state.clone();
        older.core.nonce -= 1;
        assert_eq!(
            store.save_channel_state(&state).await,
            Err(StoreError::StaleWrite {
                channel: state.channel_address(),
                stored: 2,
                got: 2
            })
        );
        assert!(store.save_channel_state(&older).await.is_err());

        store.restore(older.clone()).await;
        assert_eq!(
            store.get_channel_state(&state.channel_address()).await,
            Ok(Some(older))
        );
    }
}
