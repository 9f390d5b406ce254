use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::Synchronizer;
use crate::{
    abiencode::types::Address,
    channel::{
        generate_update, ChannelState, ChannelUpdate, UpdateDetails, UpdateParams,
        UpdateValidator,
    },
    error::{ChannelUpdateError, Result, SyncError, UpdateErrorReason},
    events::UpdateOutcome,
    messages::{UpdateMessage, VectorMessage},
    store::ChannelStore,
    wire::MessageBus,
};

impl<S, B, V> Synchronizer<S, B, V>
where
    S: ChannelStore,
    B: MessageBus,
    V: UpdateValidator,
{
    /// Propose `params` to the counterparty and wait until it is
    /// counter-signed.
    ///
    /// If the counterparty reports that we are behind, the attached latest
    /// update is applied and the proposal regenerated on top of it, at most
    /// [SyncConfig::max_retries][super::SyncConfig::max_retries] times.
    pub async fn outbound(&self, params: UpdateParams) -> Result<ChannelState> {
        let channel = params.channel_address;
        let _lock = self.outbound_locks.acquire(channel).await;

        let mut retries = 0;
        loop {
            let (update, latest_update, waiter) = self.prepare(&params).await?;
            let nonce = update.nonce;

            let msg = VectorMessage::Update(UpdateMessage {
                to: update.to_identifier.clone(),
                from: self.identity.clone(),
                update,
                latest_update,
            });
            debug!(?channel, nonce, "proposing update");
            if let Err(e) = self.bus.send(msg).await {
                self.notifier.unregister(channel, nonce).await;
                return Err(e.into());
            }

            match self.wait(channel, nonce, waiter).await? {
                Ok(state) => {
                    info!(?channel, nonce, "update applied");
                    return Ok(state);
                }
                Err(e) if e.reason == UpdateErrorReason::StaleUpdateNonce => {
                    debug!(?channel, nonce, retries, "behind counterparty, catching up");
                    if let Some(state) = self.catch_up(&e, &params, nonce).await? {
                        // The rejection overtook the ack of this very proposal.
                        info!(?channel, nonce, "update applied");
                        return Ok(state);
                    }
                    if retries >= self.config.max_retries {
                        warn!(?channel, nonce, retries, "giving up after catching up");
                        return Err(e.into());
                    }
                    retries += 1;
                }
                Err(e) => {
                    warn!(?channel, nonce, reason = %e.reason, context = %e.context, "update rejected");
                    return Err(e.into());
                }
            }
        }
    }

    /// Generate the next proposal and register for its outcome.
    ///
    /// Runs under the store lock, so an inbound proposal is either applied
    /// before we read the state or sees ours as pending.
    async fn prepare(
        &self,
        params: &UpdateParams,
    ) -> Result<(
        ChannelUpdate,
        Option<ChannelUpdate>,
        oneshot::Receiver<UpdateOutcome>,
    )> {
        let channel = params.channel_address;
        let _guard = self.store_locks.acquire(channel).await;

        let previous = self.load(channel).await?;
        let nonce = previous.as_ref().map_or(0, ChannelState::nonce) + 1;
        if previous.is_none() && !matches!(params.details, UpdateDetails::Setup(_)) {
            return Err(ChannelUpdateError::new(
                UpdateErrorReason::ChannelNotFound,
                channel,
                nonce,
                "no stored state",
            )
            .into());
        }

        let update = generate_update(
            params,
            previous.as_ref(),
            &self.signer,
            &self.identity,
            &self.validator,
        )
        .map_err(|e| {
            ChannelUpdateError::new(
                UpdateErrorReason::MergeUpdateFailed,
                channel,
                nonce,
                e.to_string(),
            )
        })?;

        let waiter = self.notifier.register(channel, update.nonce).await;
        Ok((update, previous.map(|p| p.latest_update), waiter))
    }

    async fn wait(
        &self,
        channel: Address,
        nonce: u64,
        waiter: oneshot::Receiver<UpdateOutcome>,
    ) -> Result<UpdateOutcome> {
        match tokio::time::timeout(self.config.update_timeout, waiter).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Ok(Err(ChannelUpdateError::new(
                UpdateErrorReason::MessageFailed,
                channel,
                nonce,
                "waiter dropped",
            ))),
            Err(_) => {
                self.notifier.unregister(channel, nonce).await;
                warn!(?channel, nonce, "no answer from counterparty");
                Err(SyncError::Timeout {
                    channel_address: channel,
                    nonce,
                })
            }
        }
    }

    /// Apply the latest update the counterparty attached to its rejection.
    ///
    /// If that update is our proposal `nonce` for `params`, already
    /// counter-signed, the resulting state is returned and nothing must be
    /// proposed again.
    async fn catch_up(
        &self,
        rejection: &ChannelUpdateError,
        params: &UpdateParams,
        nonce: u64,
    ) -> Result<Option<ChannelState>> {
        let Some(latest) = &rejection.latest_update else {
            return Err(rejection.clone().into());
        };
        let ours = latest.from_identifier == self.identity
            && latest.nonce == nonce
            && latest.details == params.details;

        let _guard = self.store_locks.acquire(latest.channel_address).await;
        let stored = self.load(latest.channel_address).await?;
        match stored {
            // Already applied in the meantime, e.g. the counterparty's
            // proposal that won against ours, or the late ack of our own.
            Some(stored) if stored.nonce() >= latest.nonce => Ok(ours.then_some(stored)),
            stored => {
                let next = self.catch_up_with(stored.as_ref(), latest).await?;
                Ok(ours.then_some(next))
            }
        }
    }
}
