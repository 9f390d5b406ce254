use super::{ChannelState, UpdateDetails, UpdateProposal};
use crate::abiencode::{
    self,
    types::{Address, U256},
};
use thiserror::Error;

/// Reasons an update can not be applied to the previous state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidUpdate {
    #[error("update is for channel {got:?}, expected {expected:?}")]
    ChannelAddressMismatch { expected: Address, got: Address },
    #[error("expected nonce {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("sender or recipient is not a channel participant")]
    UnknownIdentifier,
    #[error("channel is already set up")]
    AlreadySetUp,
    #[error("channel is not set up")]
    NotSetUp,
    #[error("setup has to be proposed by the first participant")]
    SetupNotFromInitiator,
    #[error("participants must be distinct")]
    DuplicateParticipants,
    #[error("timeout must not be zero")]
    ZeroTimeout,
    #[error("channel address is not derived from participants and network")]
    ChannelAddressNotDerived,
    #[error("deposit nonce went down from {previous} to {got}")]
    DepositNonceDecreased { previous: u64, got: u64 },
    #[error("unknown asset {0:?}")]
    UnknownAsset(Address),
    #[error("transfer amount is zero")]
    ZeroTransfer,
    #[error("participant {0} can not afford the transfer")]
    InsufficientBalance(usize),
    #[error("transfer timeout exceeds channel timeout")]
    TransferTimeoutTooLong,
    #[error("resolving {locked_amount} but only {available} is locked")]
    LockedAmountExceeded { locked_amount: U256, available: U256 },
    #[error("resolved amounts do not add up to the locked amount")]
    ResolveAmountMismatch,
    #[error("recipient {0:?} is not a channel participant")]
    UnknownRecipient(Address),
    #[error("balance overflow")]
    Overflow,
    #[error("resulting state does not match the signed commitment")]
    CommitmentMismatch,
    #[error("encoding: {0}")]
    Encoding(#[from] abiencode::Error),
}

/// Semantic checks run before an update is applied.
///
/// Implementations must be pure: the same proposal against the same state
/// always gives the same answer on both sides of the channel.
pub trait UpdateValidator: Send + Sync {
    fn validate(
        &self,
        proposal: &UpdateProposal<'_>,
        previous: Option<&ChannelState>,
    ) -> Result<(), InvalidUpdate>;
}

/// Balance and parameter checks every update type has to pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicValidator;

impl UpdateValidator for BasicValidator {
    fn validate(
        &self,
        proposal: &UpdateProposal<'_>,
        previous: Option<&ChannelState>,
    ) -> Result<(), InvalidUpdate> {
        let expected_nonce = previous.map_or(0, ChannelState::nonce) + 1;
        if proposal.nonce != expected_nonce {
            return Err(InvalidUpdate::InvalidNonce {
                expected: expected_nonce,
                got: proposal.nonce,
            });
        }

        let previous = match (proposal.details, previous) {
            (UpdateDetails::Setup(_), Some(_)) => return Err(InvalidUpdate::AlreadySetUp),
            (UpdateDetails::Setup(_), None) => return validate_setup(proposal),
            (_, None) => return Err(InvalidUpdate::NotSetUp),
            (_, Some(previous)) => previous,
        };

        if proposal.channel_address != previous.channel_address() {
            return Err(InvalidUpdate::ChannelAddressMismatch {
                expected: previous.channel_address(),
                got: proposal.channel_address,
            });
        }

        let from = previous
            .participant_of(proposal.from_identifier)
            .ok_or(InvalidUpdate::UnknownIdentifier)?;
        if previous.participant_of(proposal.to_identifier) != Some(1 - from) {
            return Err(InvalidUpdate::UnknownIdentifier);
        }

        let core = &previous.core;
        match proposal.details {
            UpdateDetails::Setup(_) => Ok(()),
            UpdateDetails::Deposit(d) => {
                if d.latest_deposit_nonce < core.latest_deposit_nonce {
                    Err(InvalidUpdate::DepositNonceDecreased {
                        previous: core.latest_deposit_nonce,
                        got: d.latest_deposit_nonce,
                    })
                } else {
                    Ok(())
                }
            }
            UpdateDetails::Create(d) => {
                let asset = core
                    .asset_index(&d.asset_id)
                    .ok_or(InvalidUpdate::UnknownAsset(d.asset_id))?;
                let total = d.balance.total().ok_or(InvalidUpdate::Overflow)?;
                let balance = &core.balances[asset];

                if total.is_zero() {
                    Err(InvalidUpdate::ZeroTransfer)
                } else if balance.amount[from] < d.balance.amount[0] {
                    Err(InvalidUpdate::InsufficientBalance(from))
                } else if balance.amount[1 - from] < d.balance.amount[1] {
                    Err(InvalidUpdate::InsufficientBalance(1 - from))
                } else if d.transfer_timeout > core.timeout {
                    Err(InvalidUpdate::TransferTimeoutTooLong)
                } else {
                    Ok(())
                }
            }
            UpdateDetails::Resolve(d) => {
                let asset = core
                    .asset_index(&d.asset_id)
                    .ok_or(InvalidUpdate::UnknownAsset(d.asset_id))?;
                let available = core.locked_balance[asset];
                let total = d.balance.total().ok_or(InvalidUpdate::Overflow)?;

                if d.locked_amount > available {
                    return Err(InvalidUpdate::LockedAmountExceeded {
                        locked_amount: d.locked_amount,
                        available,
                    });
                }
                if total != d.locked_amount {
                    return Err(InvalidUpdate::ResolveAmountMismatch);
                }
                for recipient in d.balance.to.iter() {
                    if core.participant_index(recipient).is_none() {
                        return Err(InvalidUpdate::UnknownRecipient(*recipient));
                    }
                }
                Ok(())
            }
        }
    }
}

fn validate_setup(proposal: &UpdateProposal<'_>) -> Result<(), InvalidUpdate> {
    let UpdateDetails::Setup(setup) = proposal.details else {
        return Ok(());
    };

    if setup.participants[0] == setup.participants[1]
        || setup.public_identifiers[0] == setup.public_identifiers[1]
    {
        Err(InvalidUpdate::DuplicateParticipants)
    } else if *proposal.from_identifier != setup.public_identifiers[0]
        || *proposal.to_identifier != setup.public_identifiers[1]
    {
        Err(InvalidUpdate::SetupNotFromInitiator)
    } else if setup.timeout.is_zero() {
        Err(InvalidUpdate::ZeroTimeout)
    } else if setup.network_context.channel_address(&setup.participants)?
        != proposal.channel_address
    {
        Err(InvalidUpdate::ChannelAddressNotDerived)
    } else {
        Ok(())
    }
}
