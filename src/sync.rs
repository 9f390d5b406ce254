//! The update protocol between the two participants of a channel.
//!
//! [Synchronizer::outbound] proposes an update and waits for the
//! counterparty to counter-sign it, [Synchronizer::inbound] handles whatever
//! the counterparty sends. Which of the two sides is ahead is decided by
//! the nonce difference between an incoming update and the stored state:
//!
//! | diff       | incoming      | action                                   |
//! |------------|---------------|------------------------------------------|
//! | <= -2      | any           | `StaleChannelNonce`                      |
//! | -1, 0      | single-signed | `StaleUpdateNonce`, sender catches up    |
//! | -1         | double-signed | `StaleUpdateNonce`, ignored              |
//! | 0          | double-signed | no-op if identical, else `Equivocation`  |
//! | 1          | single-signed | merge, counter-sign, save, ack           |
//! | 1          | double-signed | merge, save, notify                      |
//! | 2          | any           | apply the piggybacked update, then as 1  |
//! | >= 3       | any           | `StaleChannelNonce`                      |
//!
//! Rejections carry our latest update so the sender can catch up. After a
//! single-signed `-1` that update is two ahead of the sender, whose
//! catch-up then fails with `StaleChannelNonce`: such a node is out of
//! step for good and has to restore its channel state from elsewhere.
//!
//! When the update a rejection carries is the rejected proposal itself,
//! already counter-signed, [Synchronizer::outbound] returns it instead of
//! proposing again. That happens when a duplicate of the proposal gets
//! rejected and the rejection arrives before the ack.

mod inbound;
mod outbound;


use std::time::Duration;

use tracing::{debug, error, warn};

use crate::{
    abiencode::types::Address,
    channel::{BasicValidator, ChannelState, ChannelUpdate, UpdateValidator},
    error::{ChannelUpdateError, UpdateErrorReason},
    events::EventNotifier,
    lock::ChannelLocks,
    sig::Signer,
    store::{ChannelStore, StoreError},
    wire::{Identity, MessageBus},
};

/// Tunables of the update protocol.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How long [Synchronizer::outbound] waits for the counterparty.
    pub update_timeout: Duration,
    /// How often a proposal is regenerated after catching up.
    pub max_retries: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// One node's side of all its channels.
///
/// Shared between the task proposing updates and the receive loop, so all
/// methods take `&self`.
#[derive(Debug)]
pub struct Synchronizer<S, B, V = BasicValidator>
where
    S: ChannelStore,
    B: MessageBus,
    V: UpdateValidator,
{
    identity: Identity,
    signer: Signer,
    store: S,
    bus: B,
    validator: V,
    notifier: EventNotifier,
    /// Held for a whole propose→ack round trip.
    outbound_locks: ChannelLocks,
    /// Held for every read→merge→write of a channel.
    store_locks: ChannelLocks,
    config: SyncConfig,
}

impl<S, B> Synchronizer<S, B, BasicValidator>
where
    S: ChannelStore,
    B: MessageBus,
{
    pub fn new(identity: Identity, signer: Signer, store: S, bus: B, config: SyncConfig) -> Self {
        Self::with_validator(identity, signer, store, bus, BasicValidator, config)
    }
}

impl<S, B, V> Synchronizer<S, B, V>
where
    S: ChannelStore,
    B: MessageBus,
    V: UpdateValidator,
{
    pub fn with_validator(
        identity: Identity,
        signer: Signer,
        store: S,
        bus: B,
        validator: V,
        config: SyncConfig,
    ) -> Self {
        Self {
            identity,
            signer,
            store,
            bus,
            validator,
            notifier: EventNotifier::default(),
            outbound_locks: ChannelLocks::new(),
            store_locks: ChannelLocks::new(),
            config,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// On-chain address of this node's signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn load(&self, channel: Address) -> Result<Option<ChannelState>, StoreError> {
        self.store.get_channel_state(&channel).await.map_err(|e| {
            warn!(?channel, error = %e, "loading channel failed");
            e
        })
    }

    async fn save(&self, state: &ChannelState) -> Result<(), ChannelUpdateError> {
        self.store.save_channel_state(state).await.map_err(|e| {
            warn!(channel = ?state.channel_address(), nonce = state.nonce(), error = %e, "saving channel failed");
            ChannelUpdateError::for_update(
                UpdateErrorReason::SaveChannelFailed,
                &state.latest_update,
                e.to_string(),
            )
        })
    }

    /// Resolve our own waiter if `state` finished a proposal of ours,
    /// otherwise only tell subscribers.
    async fn publish_state(&self, state: ChannelState) {
        if state.latest_update.from_identifier == self.identity {
            self.notifier.post_state(state).await;
        } else {
            self.notifier.broadcast_state(state);
        }
    }

    async fn publish_error(&self, update: &ChannelUpdate, err: ChannelUpdateError) {
        if err.reason == UpdateErrorReason::Equivocation {
            error!(
                channel = ?err.channel_address,
                nonce = err.nonce,
                context = %err.context,
                "two different double-signed states at the same nonce"
            );
        } else {
            debug!(channel = ?err.channel_address, nonce = err.nonce, reason = %err.reason, "update failed");
        }

        if update.from_identifier == self.identity {
            self.notifier.post_error(err).await;
        } else {
            self.notifier.broadcast_error(err);
        }
    }
}
