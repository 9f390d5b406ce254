use super::{Balance, ChannelCommitment, NetworkContext, PARTICIPANTS};
use crate::{
    abiencode::types::{Address, Hash, U256},
    wire::Identity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateType {
    Setup,
    Deposit,
    Create,
    Resolve,
}

/// Opens the channel, always nonce 1 and always proposed by participant 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupDetails {
    pub participants: [Address; PARTICIPANTS],
    pub public_identifiers: [Identity; PARTICIPANTS],
    pub timeout: U256,
    pub network_context: NetworkContext,
}

/// Credits on-chain deposits to the off-chain balances.
///
/// Reconciling the amounts against the chain happens before the update is
/// proposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositDetails {
    pub asset_id: Address,
    pub amount: [U256; PARTICIPANTS],
    pub latest_deposit_nonce: u64,
}

/// Locks funds into a conditional transfer.
///
/// `balance.amount[0]` is paid by the proposer, `balance.amount[1]` by the
/// responder. The merkle root over all active transfers is computed by
/// whoever owns the transfer set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDetails {
    pub transfer_id: Hash,
    pub asset_id: Address,
    pub balance: Balance,
    pub transfer_definition: Address,
    pub transfer_timeout: U256,
    pub merkle_root: Hash,
}

/// Releases a transfer's `locked_amount` according to its final `balance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveDetails {
    pub transfer_id: Hash,
    pub asset_id: Address,
    pub locked_amount: U256,
    pub balance: Balance,
    pub merkle_root: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateDetails {
    Setup(SetupDetails),
    Deposit(DepositDetails),
    Create(CreateDetails),
    Resolve(ResolveDetails),
}

impl UpdateDetails {
    pub fn update_type(&self) -> UpdateType {
        match self {
            UpdateDetails::Setup(_) => UpdateType::Setup,
            UpdateDetails::Deposit(_) => UpdateType::Deposit,
            UpdateDetails::Create(_) => UpdateType::Create,
            UpdateDetails::Resolve(_) => UpdateType::Resolve,
        }
    }
}

/// A proposed (single-signed) or applied (double-signed) state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUpdate {
    pub channel_address: Address,
    pub from_identifier: Identity,
    pub to_identifier: Identity,
    pub nonce: u64,
    pub details: UpdateDetails,
    pub commitment: ChannelCommitment,
}

impl ChannelUpdate {
    pub fn update_type(&self) -> UpdateType {
        self.details.update_type()
    }

    pub fn proposal(&self) -> UpdateProposal<'_> {
        UpdateProposal {
            channel_address: self.channel_address,
            from_identifier: &self.from_identifier,
            to_identifier: &self.to_identifier,
            nonce: self.nonce,
            details: &self.details,
        }
    }

    pub fn is_single_signed(&self) -> bool {
        self.commitment.is_single_signed()
    }

    pub fn is_double_signed(&self) -> bool {
        self.commitment.is_double_signed()
    }
}

/// Everything of an update except its commitment, which is what gets
/// validated and applied.
#[derive(Debug, Clone, Copy)]
pub struct UpdateProposal<'a> {
    pub channel_address: Address,
    pub from_identifier: &'a Identity,
    pub to_identifier: &'a Identity,
    pub nonce: u64,
    pub details: &'a UpdateDetails,
}

/// What a caller wants to change, turned into a [ChannelUpdate] by
/// [generate_update][super::generate_update] against the latest state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateParams {
    pub channel_address: Address,
    pub details: UpdateDetails,
}
