//! In-process notifications about channel updates.
//!
//! Outbound proposals register their `(channel, nonce)` before the update is
//! sent and wait on a oneshot channel, so an answer can never arrive before
//! someone is listening for it. Everything is also published on two
//! broadcast channels for general subscribers.

use std::collections::HashMap;

use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::trace;

use crate::{abiencode::types::Address, channel::ChannelState, error::ChannelUpdateError};

pub type UpdateOutcome = Result<ChannelState, ChannelUpdateError>;

const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug)]
pub struct EventNotifier {
    pending: Mutex<HashMap<(Address, u64), oneshot::Sender<UpdateOutcome>>>,
    states: broadcast::Sender<ChannelState>,
    errors: broadcast::Sender<ChannelUpdateError>,
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventNotifier {
    /// `capacity` bounds how far broadcast subscribers may lag behind.
    pub fn new(capacity: usize) -> Self {
        let (states, _) = broadcast::channel(capacity);
        let (errors, _) = broadcast::channel(capacity);
        Self {
            pending: Mutex::new(HashMap::new()),
            states,
            errors,
        }
    }

    /// Wait for the outcome of update `nonce` on `channel`.
    ///
    /// A second registration for the same update replaces the first one,
    /// whose receiver then resolves with a closed channel.
    pub async fn register(&self, channel: Address, nonce: u64) -> oneshot::Receiver<UpdateOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert((channel, nonce), tx);
        rx
    }

    pub async fn unregister(&self, channel: Address, nonce: u64) {
        self.pending.lock().await.remove(&(channel, nonce));
    }

    pub async fn is_pending(&self, channel: Address, nonce: u64) -> bool {
        self.pending.lock().await.contains_key(&(channel, nonce))
    }

    /// Publish a newly applied, double-signed state and resolve the waiter
    /// for it.
    pub async fn post_state(&self, state: ChannelState) {
        self.resolve(state.channel_address(), state.nonce(), Ok(state.clone()))
            .await;
        self.broadcast_state(state);
    }

    pub async fn post_error(&self, error: ChannelUpdateError) {
        self.resolve(error.channel_address, error.nonce, Err(error.clone()))
            .await;
        self.broadcast_error(error);
    }

    /// Publish to subscribers only, a pending waiter for the same update is
    /// left alone.
    pub fn broadcast_state(&self, state: ChannelState) {
        // No subscribers is fine.
        let _ = self.states.send(state);
    }

    pub fn broadcast_error(&self, error: ChannelUpdateError) {
        let _ = self.errors.send(error);
    }

    pub fn subscribe_states(&self) -> broadcast::Receiver<ChannelState> {
        self.states.subscribe()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ChannelUpdateError> {
        self.errors.subscribe()
    }

    async fn resolve(&self, channel: Address, nonce: u64, outcome: UpdateOutcome) {
        let waiter = self.pending.lock().await.remove(&(channel, nonce));
        if let Some(waiter) = waiter {
            trace!(?channel, nonce, "resolving pending update");
            // The waiter may have timed out in the meantime.
            let _ = waiter.send(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        channel::tests::{funded_channel, parties},
        error::UpdateErrorReason,
    };

    #[tokio::test]
    async fn state_resolves_matching_waiter_only() {
        let notifier = EventNotifier::default();
        let state = funded_channel(&parties());
        let channel = state.channel_address();

        let mut other = notifier.register(channel, 3).await;
        let waiter = notifier.register(channel, 2).await;
        let mut states = notifier.subscribe_states();

        notifier.post_state(state.clone()).await;

        assert_eq!(waiter.await.unwrap(), Ok(state.clone()));
        assert!(other.try_recv().is_err());
        assert!(notifier.is_pending(channel, 3).await);
        assert!(!notifier.is_pending(channel, 2).await);
        assert_eq!(states.recv().await.unwrap(), state);
    }

    #[tokio::test]
    async fn error_rejects_waiter() {
        let notifier = EventNotifier::default();
        let state = funded_channel(&parties());
        let error = ChannelUpdateError::for_update(
            UpdateErrorReason::StaleUpdateNonce,
            &state.latest_update,
            "behind",
        );

        let waiter = notifier
            .register(error.channel_address, error.nonce)
            .await;
        let mut errors = notifier.subscribe_errors();
        notifier.post_error(error.clone()).await;

        assert_eq!(waiter.await.unwrap(), Err(error.clone()));
        assert_eq!(errors.recv().await.unwrap(), error);
    }

    #[tokio::test]
    async fn broadcast_leaves_waiter_pending() {
        let notifier = EventNotifier::default();
        let state = funded_channel(&parties());
        let mut states = notifier.subscribe_states();

        let _waiter = notifier.register(state.channel_address(), 2).await;
        notifier.broadcast_state(state.clone());

        assert_eq!(states.recv().await.unwrap(), state);
        assert!(notifier.is_pending(state.channel_address(), 2).await);
    }

    #[tokio::test]
    async fn unregister_drops_waiter() {
        let notifier = EventNotifier::default();
        let channel = Address([3; 20]);

        let waiter = notifier.register(channel, 1).await;
        notifier.unregister(channel, 1).await;
        assert!(waiter.await.is_err());
    }
}
