//! Channel state, updates and the deterministic transition between them.
//!
//! A channel is a two party ledger. Its on-chain relevant part
//! ([CoreChannelState]) is what both participants sign, everything else in
//! [ChannelState] is off-chain context.

mod commitment;
mod merge;
mod update;
mod validate;

#[cfg(test)]
pub(crate) mod tests;

use crate::{
    abiencode::{
        self,
        types::{Address, Hash, U256},
    },
    wire::Identity,
};
use serde::Serialize;

pub use commitment::*;
pub use merge::*;
pub use update::*;
pub use validate::*;

/// Index of a participant in the channel.
///
/// `0` is the participant that set up the channel ("Alice").
pub type PartIdx = usize;

/// Channels are strictly bilateral.
pub const PARTICIPANTS: usize = 2;

/// Balance of one asset: `amount[i]` is owed to `to[i]`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Balance {
    pub amount: [U256; PARTICIPANTS],
    pub to: [Address; PARTICIPANTS],
}

impl Balance {
    /// Sum of both amounts, `None` on overflow.
    pub fn total(&self) -> Option<U256> {
        self.amount[0].checked_add(self.amount[1])
    }
}

/// The signed part of a channel, abi encoded and hashed for commitments.
///
/// `balances`, `locked_balance` and `asset_ids` are indexed by asset.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CoreChannelState {
    pub channel_address: Address,
    pub participants: [Address; PARTICIPANTS],
    pub timeout: U256,
    pub balances: Vec<Balance>,
    pub locked_balance: Vec<U256>,
    pub asset_ids: Vec<Address>,
    pub nonce: u64,
    pub latest_deposit_nonce: u64,
    pub merkle_root: Hash,
}

impl CoreChannelState {
    pub fn asset_index(&self, asset_id: &Address) -> Option<usize> {
        self.asset_ids.iter().position(|a| a == asset_id)
    }

    pub fn participant_index(&self, addr: &Address) -> Option<PartIdx> {
        self.participants.iter().position(|p| p == addr)
    }
}

/// Chain the channel lives on. Not part of the signed state, but the
/// channel address is derived from it.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkContext {
    pub chain_id: U256,
    pub channel_factory_address: Address,
}

impl NetworkContext {
    /// Address of the channel between `participants` on this network.
    ///
    /// The last 20 bytes of `keccak256(abi.encode(participants, chainId,
    /// factory))`, so both sides derive the same address without talking to
    /// the chain.
    pub fn channel_address(
        &self,
        participants: &[Address; PARTICIPANTS],
    ) -> Result<Address, abiencode::Error> {
        #[derive(Serialize)]
        struct Preimage<'a> {
            participants: &'a [Address; PARTICIPANTS],
            chain_id: U256,
            channel_factory_address: Address,
        }

        let hash = abiencode::to_hash(&Preimage {
            participants,
            chain_id: self.chain_id,
            channel_factory_address: self.channel_factory_address,
        })?;

        let mut addr = Address::default();
        addr.0.copy_from_slice(&hash.0[32 - 20..]);
        Ok(addr)
    }
}

/// Latest fully signed state of a channel, as kept by the store.
///
/// Invariant: `core == latest_update.commitment.state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelState {
    pub core: CoreChannelState,
    pub network_context: NetworkContext,
    pub public_identifiers: [Identity; PARTICIPANTS],
    pub latest_update: ChannelUpdate,
}

impl ChannelState {
    pub fn channel_address(&self) -> Address {
        self.core.channel_address
    }

    pub fn nonce(&self) -> u64 {
        self.core.nonce
    }

    pub fn participant_of(&self, identity: &Identity) -> Option<PartIdx> {
        self.public_identifiers.iter().position(|i| i == identity)
    }

    /// Public identifier of the other side, if `identity` is in the channel.
    pub fn counterparty_of(&self, identity: &Identity) -> Option<&Identity> {
        self.participant_of(identity)
            .map(|idx| &self.public_identifiers[1 - idx])
    }
}
