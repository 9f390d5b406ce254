use tracing::{debug, info, warn};

use super::Synchronizer;
use crate::{
    channel::{merge_update, ChannelState, ChannelUpdate, UpdateDetails, UpdateValidator},
    error::{ChannelUpdateError, Result, UpdateErrorReason},
    messages::{ErrorMessage, UpdateMessage, VectorMessage},
    store::ChannelStore,
    wire::MessageBus,
};

use UpdateErrorReason::*;

impl<S, B, V> Synchronizer<S, B, V>
where
    S: ChannelStore,
    B: MessageBus,
    V: UpdateValidator,
{
    /// Handle a message from the counterparty.
    ///
    /// Returns the new state if the message advanced a channel. Errors are
    /// also published on the notifier and, if the sender waits for an answer,
    /// sent back. The caller only has to log them.
    pub async fn inbound(&self, msg: VectorMessage) -> Result<Option<ChannelState>> {
        if *msg.from() == self.identity {
            debug!("ignoring message from ourselves");
            return Ok(None);
        }
        if *msg.to() != self.identity {
            warn!(to = ?msg.to(), "dropping message addressed to someone else");
            return Ok(None);
        }

        match msg {
            VectorMessage::Error(ErrorMessage { error, .. }) => {
                debug!(channel = ?error.channel_address, nonce = error.nonce, reason = %error.reason, "counterparty rejected update");
                self.notifier.post_error(error).await;
                Ok(None)
            }
            VectorMessage::Update(msg) => match self.process_update(&msg).await {
                Ok(state) => Ok(state),
                Err(err) => {
                    if msg.update.is_single_signed() {
                        let reply = VectorMessage::Error(ErrorMessage {
                            to: msg.from.clone(),
                            from: self.identity.clone(),
                            error: err.clone(),
                        });
                        if let Err(e) = self.bus.send(reply).await {
                            warn!(error = %e, "failed to send error to counterparty");
                        }
                    }
                    self.publish_error(&msg.update, err.clone()).await;
                    Err(err.into())
                }
            },
        }
    }

    async fn process_update(
        &self,
        msg: &UpdateMessage,
    ) -> core::result::Result<Option<ChannelState>, ChannelUpdateError> {
        let update = &msg.update;
        let fail = |reason, context: String, stored: Option<&ChannelState>| {
            ChannelUpdateError::for_update(reason, update, context)
                .with_latest_update(stored.map(|s| s.latest_update.clone()))
        };

        // Checked before anything else, whatever the nonce is.
        update
            .commitment
            .assert_signatures(false)
            .map_err(|e| fail(BadSignatures, e.to_string(), None))?;
        if let Some(latest) = &msg.latest_update {
            latest
                .commitment
                .assert_signatures(false)
                .map_err(|e| fail(BadSignatures, format!("latest update: {}", e), None))?;
        }

        let _guard = self.store_locks.acquire(update.channel_address).await;
        let stored = self
            .load(update.channel_address)
            .await
            .map_err(|e| fail(LoadChannelFailed, e.to_string(), None))?;

        if stored.is_none() && !matches!(update.details, UpdateDetails::Setup(_)) {
            return Err(fail(ChannelNotFound, "no stored state".into(), None));
        }

        let k = stored.as_ref().map_or(0, ChannelState::nonce);
        let diff = i128::from(update.nonce) - i128::from(k);
        debug!(
            channel = ?update.channel_address,
            nonce = update.nonce,
            diff,
            double_signed = update.is_double_signed(),
            "dispatching update"
        );

        match diff {
            d if d <= -2 => Err(fail(
                StaleChannelNonce,
                format!("update {} is far behind our nonce {}", update.nonce, k),
                stored.as_ref(),
            )),
            -1 | 0 if update.is_single_signed() => Err(fail(
                StaleUpdateNonce,
                format!("proposal {} but we are at {}", update.nonce, k),
                stored.as_ref(),
            )),
            -1 => Err(fail(
                StaleUpdateNonce,
                "stale acknowledgement".into(),
                stored.as_ref(),
            )),
            0 => match &stored {
                Some(stored) if stored.core == update.commitment.state => {
                    debug!(channel = ?update.channel_address, nonce = update.nonce, "already applied");
                    Ok(None)
                }
                _ => Err(fail(
                    Equivocation,
                    format!("different double-signed state at nonce {}", k),
                    stored.as_ref(),
                )),
            },
            1 => self.apply_next(stored.as_ref(), update).await,
            2 => {
                let latest = msg.latest_update.as_ref().ok_or_else(|| {
                    fail(
                        MergeUpdateFailed,
                        "one update behind but no latest update attached".into(),
                        stored.as_ref(),
                    )
                })?;
                let previous = self.catch_up_with(stored.as_ref(), latest).await?;
                self.apply_next(Some(&previous), update).await
            }
            _ => Err(fail(
                StaleChannelNonce,
                format!("update {} is too far ahead of our nonce {}", update.nonce, k),
                stored.as_ref(),
            )),
        }
    }

    /// Apply `latest`, a double-signed update exactly one ahead of
    /// `stored`, and save the result. The store lock must be held.
    pub(super) async fn catch_up_with(
        &self,
        stored: Option<&ChannelState>,
        latest: &ChannelUpdate,
    ) -> core::result::Result<ChannelState, ChannelUpdateError> {
        let fail = |reason, context: String| {
            ChannelUpdateError::for_update(reason, latest, context)
                .with_latest_update(stored.map(|s| s.latest_update.clone()))
        };

        let k = stored.map_or(0, ChannelState::nonce);
        if latest.nonce != k + 1 {
            return Err(fail(
                StaleChannelNonce,
                format!("can not catch up from {} to {}", k, latest.nonce),
            ));
        }
        latest
            .commitment
            .assert_signatures(true)
            .map_err(|e| fail(BadSignatures, format!("catching up: {}", e)))?;

        let next = merge_update(latest, stored, &self.validator)
            .map_err(|e| fail(MergeUpdateFailed, format!("catching up: {}", e)))?;
        self.save(&next).await?;

        info!(channel = ?next.channel_address(), nonce = next.nonce(), "caught up");
        self.publish_state(next.clone()).await;
        Ok(next)
    }

    async fn apply_next(
        &self,
        previous: Option<&ChannelState>,
        update: &ChannelUpdate,
    ) -> core::result::Result<Option<ChannelState>, ChannelUpdateError> {
        let fail = |reason, context: String| {
            ChannelUpdateError::for_update(reason, update, context)
                .with_latest_update(previous.map(|s| s.latest_update.clone()))
        };

        if update.is_double_signed() {
            let next = merge_update(update, previous, &self.validator)
                .map_err(|e| fail(MergeUpdateFailed, e.to_string()))?;
            self.save(&next).await?;

            info!(channel = ?next.channel_address(), nonce = next.nonce(), "update acknowledged");
            self.publish_state(next.clone()).await;
            return Ok(Some(next));
        }

        // Both sides proposed at the same nonce: the channel initiator wins,
        // the other side drops its own proposal and handles this one.
        let own_idx = previous.and_then(|p| p.participant_of(&self.identity));
        if own_idx == Some(0)
            && self
                .notifier
                .is_pending(update.channel_address, update.nonce)
                .await
        {
            return Err(fail(
                StaleUpdateNonce,
                "concurrent proposal, the channel initiator goes first".into(),
            ));
        }

        let proposer = match previous {
            Some(previous) => previous.participant_of(&update.from_identifier),
            None => Some(0),
        };
        if !proposer.map_or(false, |idx| update.commitment.signatures[idx].is_some()) {
            return Err(fail(BadSignatures, "not signed by the proposer".into()));
        }

        let mut next = merge_update(update, previous, &self.validator)
            .map_err(|e| fail(MergeUpdateFailed, e.to_string()))?;
        next.latest_update
            .commitment
            .sign(&self.signer)
            .map_err(|e| fail(MergeUpdateFailed, format!("counter-signing: {}", e)))?;
        self.save(&next).await?;
        info!(channel = ?next.channel_address(), nonce = next.nonce(), "update counter-signed");

        let ack = VectorMessage::Update(UpdateMessage {
            to: update.from_identifier.clone(),
            from: self.identity.clone(),
            update: next.latest_update.clone(),
            latest_update: previous.map(|p| p.latest_update.clone()),
        });
        if let Err(e) = self.bus.send(ack).await {
            // The state is saved. The proposer will time out and catch up
            // from our latest update on its next attempt.
            warn!(channel = ?next.channel_address(), nonce = next.nonce(), error = %e, "failed to send acknowledgement");
        }
        Ok(Some(next))
    }
}
