//! Protobuf representation of [VectorMessage][crate::messages::VectorMessage].
//!
//! Amounts, addresses and hashes are raw big endian bytes. Signature slots
//! are always two entries, an empty entry is a missing signature.

use prost::{Enumeration, Message, Oneof};

#[derive(Clone, PartialEq, Message)]
pub struct Envelope {
    #[prost(bytes = "vec", tag = "1")]
    pub sender: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub recipient: Vec<u8>,
    #[prost(oneof = "envelope::Msg", tags = "3, 4")]
    pub msg: Option<envelope::Msg>,
}

pub mod envelope {
    use prost::Oneof;

    #[derive(Clone, PartialEq, Oneof)]
    pub enum Msg {
        #[prost(message, tag = "3")]
        ChannelUpdateMsg(super::ChannelUpdateMsg),
        #[prost(message, tag = "4")]
        ChannelErrorMsg(super::ChannelErrorMsg),
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelUpdateMsg {
    #[prost(message, optional, tag = "1")]
    pub update: Option<ChannelUpdate>,
    #[prost(message, optional, tag = "2")]
    pub latest_update: Option<ChannelUpdate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ErrorReason {
    BadSignatures = 0,
    ChannelNotFound = 1,
    StaleUpdateNonce = 2,
    StaleChannelNonce = 3,
    MergeUpdateFailed = 4,
    SaveChannelFailed = 5,
    Equivocation = 6,
    MessageFailed = 7,
    LoadChannelFailed = 8,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelErrorMsg {
    #[prost(enumeration = "ErrorReason", tag = "1")]
    pub reason: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub channel_address: Vec<u8>,
    #[prost(uint64, tag = "3")]
    pub nonce: u64,
    #[prost(string, tag = "4")]
    pub context: String,
    #[prost(message, optional, tag = "5")]
    pub latest_update: Option<ChannelUpdate>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChannelUpdate {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_address: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub from_identifier: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub to_identifier: Vec<u8>,
    #[prost(uint64, tag = "4")]
    pub nonce: u64,
    #[prost(oneof = "Details", tags = "5, 6, 7, 8")]
    pub details: Option<Details>,
    #[prost(message, optional, tag = "9")]
    pub commitment: Option<Commitment>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum Details {
    #[prost(message, tag = "5")]
    Setup(SetupDetails),
    #[prost(message, tag = "6")]
    Deposit(DepositDetails),
    #[prost(message, tag = "7")]
    Create(CreateDetails),
    #[prost(message, tag = "8")]
    Resolve(ResolveDetails),
}

#[derive(Clone, PartialEq, Message)]
pub struct Commitment {
    #[prost(message, optional, tag = "1")]
    pub state: Option<CoreState>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub signatures: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CoreState {
    #[prost(bytes = "vec", tag = "1")]
    pub channel_address: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub participants: Vec<Vec<u8>>,
    #[prost(bytes = "vec", tag = "3")]
    pub timeout: Vec<u8>,
    #[prost(message, repeated, tag = "4")]
    pub balances: Vec<Balance>,
    #[prost(bytes = "vec", repeated, tag = "5")]
    pub locked_balance: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "6")]
    pub asset_ids: Vec<Vec<u8>>,
    #[prost(uint64, tag = "7")]
    pub nonce: u64,
    #[prost(uint64, tag = "8")]
    pub latest_deposit_nonce: u64,
    #[prost(bytes = "vec", tag = "9")]
    pub merkle_root: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Balance {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub amount: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub to: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, Message)]
pub struct NetworkContext {
    #[prost(bytes = "vec", tag = "1")]
    pub chain_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub channel_factory_address: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SetupDetails {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub participants: Vec<Vec<u8>>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub public_identifiers: Vec<Vec<u8>>,
    #[prost(bytes = "vec", tag = "3")]
    pub timeout: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub network_context: Option<NetworkContext>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DepositDetails {
    #[prost(bytes = "vec", tag = "1")]
    pub asset_id: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub amount: Vec<Vec<u8>>,
    #[prost(uint64, tag = "3")]
    pub latest_deposit_nonce: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct CreateDetails {
    #[prost(bytes = "vec", tag = "1")]
    pub transfer_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub asset_id: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub balance: Option<Balance>,
    #[prost(bytes = "vec", tag = "4")]
    pub transfer_definition: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub transfer_timeout: Vec<u8>,
    #[prost(bytes = "vec", tag = "6")]
    pub merkle_root: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ResolveDetails {
    #[prost(bytes = "vec", tag = "1")]
    pub transfer_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub asset_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub locked_amount: Vec<u8>,
    #[prost(message, optional, tag = "4")]
    pub balance: Option<Balance>,
    #[prost(bytes = "vec", tag = "5")]
    pub merkle_root: Vec<u8>,
}
