//! Errors of the update protocol.
//!
//! [ChannelUpdateError] is the protocol level error: it is sent to the
//! counterparty and posted to local subscribers. [SyncError] is what the
//! synchronizer returns to its callers and additionally covers local
//! failures (timeouts, transport, store).

use crate::{
    abiencode::{self, types::Address},
    channel::ChannelUpdate,
    store::StoreError,
    wire::WireError,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateErrorReason {
    /// A signature does not recover to the expected participant.
    BadSignatures,
    /// No stored state for the channel.
    ChannelNotFound,
    /// The sender is at most one update behind or sent a duplicate. The
    /// sender can catch up from the attached `latest_update` and retry.
    StaleUpdateNonce,
    /// The nonce gap can not be bridged, a restore is needed.
    StaleChannelNonce,
    /// Validating or applying the update failed.
    MergeUpdateFailed,
    SaveChannelFailed,
    /// Reading the stored state failed. Unlike `ChannelNotFound` this does
    /// not mean the channel is unknown.
    LoadChannelFailed,
    /// Two different double-signed states with the same nonce.
    Equivocation,
    /// The message could not be delivered or was malformed.
    MessageFailed,
}

impl UpdateErrorReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateErrorReason::BadSignatures => "BadSignatures",
            UpdateErrorReason::ChannelNotFound => "ChannelNotFound",
            UpdateErrorReason::StaleUpdateNonce => "StaleUpdateNonce",
            UpdateErrorReason::StaleChannelNonce => "StaleChannelNonce",
            UpdateErrorReason::MergeUpdateFailed => "MergeUpdateFailed",
            UpdateErrorReason::SaveChannelFailed => "SaveChannelFailed",
            UpdateErrorReason::LoadChannelFailed => "LoadChannelFailed",
            UpdateErrorReason::Equivocation => "Equivocation",
            UpdateErrorReason::MessageFailed => "MessageFailed",
        }
    }
}

impl core::fmt::Display for UpdateErrorReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one update, identified by `(channel_address, nonce)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{reason} for update {nonce} of channel {channel_address:?}: {context}")]
pub struct ChannelUpdateError {
    pub reason: UpdateErrorReason,
    pub channel_address: Address,
    pub nonce: u64,
    pub context: String,
    /// Latest double-signed update the reporting side has, if any.
    pub latest_update: Option<ChannelUpdate>,
}

impl ChannelUpdateError {
    pub fn new(
        reason: UpdateErrorReason,
        channel_address: Address,
        nonce: u64,
        context: impl Into<String>,
    ) -> Self {
        Self {
            reason,
            channel_address,
            nonce,
            context: context.into(),
            latest_update: None,
        }
    }

    pub fn for_update(
        reason: UpdateErrorReason,
        update: &ChannelUpdate,
        context: impl Into<String>,
    ) -> Self {
        Self::new(reason, update.channel_address, update.nonce, context)
    }

    pub fn with_latest_update(mut self, latest_update: Option<ChannelUpdate>) -> Self {
        self.latest_update = latest_update;
        self
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Update(#[from] ChannelUpdateError),
    #[error("no response for update {nonce} of channel {channel_address:?}")]
    Timeout { channel_address: Address, nonce: u64 },
    #[error("wire: {0}")]
    Wire(#[from] WireError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("encoding: {0}")]
    Encoding(#[from] abiencode::Error),
}

impl SyncError {
    /// Protocol reason, if the failure came from the update protocol.
    pub fn reason(&self) -> Option<UpdateErrorReason> {
        match self {
            SyncError::Update(e) => Some(e.reason),
            _ => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, SyncError>;
