//! Messages exchanged between the two participants of a channel.

use crate::{
    abiencode::types::{Address, Hash, Signature, U256},
    channel::{
        Balance, ChannelCommitment, ChannelUpdate, CoreChannelState, CreateDetails,
        DepositDetails, NetworkContext, ResolveDetails, SetupDetails, UpdateDetails, PARTICIPANTS,
    },
    error::{ChannelUpdateError, UpdateErrorReason},
    wire::{
        proto::{self, envelope},
        Identity,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    ParticipantCountMismatch,
    ByteLengthMismatch,
    ExpectedSome,
    UnknownErrorReason(i32),
}

/// A proposal or an acknowledgement, together with the latest
/// double-signed update of the sender so a lagging receiver can catch up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMessage {
    pub to: Identity,
    pub from: Identity,
    pub update: ChannelUpdate,
    pub latest_update: Option<ChannelUpdate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    pub to: Identity,
    pub from: Identity,
    pub error: ChannelUpdateError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorMessage {
    Update(UpdateMessage),
    Error(ErrorMessage),
}

impl VectorMessage {
    pub fn to(&self) -> &Identity {
        match self {
            VectorMessage::Update(m) => &m.to,
            VectorMessage::Error(m) => &m.to,
        }
    }

    pub fn from(&self) -> &Identity {
        match self {
            VectorMessage::Update(m) => &m.from,
            VectorMessage::Error(m) => &m.from,
        }
    }
}

fn address(bytes: Vec<u8>) -> Result<Address, ConversionError> {
    Address::try_from(bytes.as_slice()).or(Err(ConversionError::ByteLengthMismatch))
}

fn hash(bytes: Vec<u8>) -> Result<Hash, ConversionError> {
    Hash::try_from(bytes.as_slice()).or(Err(ConversionError::ByteLengthMismatch))
}

fn u256(bytes: Vec<u8>) -> Result<U256, ConversionError> {
    if bytes.len() > 32 {
        return Err(ConversionError::ByteLengthMismatch);
    }
    Ok(U256::from_big_endian(&bytes))
}

fn signature(bytes: Vec<u8>) -> Result<Option<Signature>, ConversionError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Signature::try_from(bytes.as_slice())
        .map(Some)
        .or(Err(ConversionError::ByteLengthMismatch))
}

/// One entry per participant.
fn pair<T>(
    values: Vec<Vec<u8>>,
    f: impl Fn(Vec<u8>) -> Result<T, ConversionError>,
) -> Result<[T; PARTICIPANTS], ConversionError> {
    let [a, b]: [Vec<u8>; PARTICIPANTS] = values
        .try_into()
        .or(Err(ConversionError::ParticipantCountMismatch))?;
    Ok([f(a)?, f(b)?])
}

fn some<T>(value: Option<T>) -> Result<T, ConversionError> {
    value.ok_or(ConversionError::ExpectedSome)
}

impl TryFrom<proto::Balance> for Balance {
    type Error = ConversionError;

    fn try_from(value: proto::Balance) -> Result<Self, Self::Error> {
        Ok(Self {
            amount: pair(value.amount, u256)?,
            to: pair(value.to, address)?,
        })
    }
}

impl From<Balance> for proto::Balance {
    fn from(value: Balance) -> Self {
        Self {
            amount: value.amount.iter().map(|a| a.be_bytes().to_vec()).collect(),
            to: value.to.iter().map(|a| a.0.to_vec()).collect(),
        }
    }
}

impl TryFrom<proto::NetworkContext> for NetworkContext {
    type Error = ConversionError;

    fn try_from(value: proto::NetworkContext) -> Result<Self, Self::Error> {
        Ok(Self {
            chain_id: u256(value.chain_id)?,
            channel_factory_address: address(value.channel_factory_address)?,
        })
    }
}

impl From<NetworkContext> for proto::NetworkContext {
    fn from(value: NetworkContext) -> Self {
        Self {
            chain_id: value.chain_id.be_bytes().to_vec(),
            channel_factory_address: value.channel_factory_address.0.to_vec(),
        }
    }
}

impl TryFrom<proto::CoreState> for CoreChannelState {
    type Error = ConversionError;

    fn try_from(value: proto::CoreState) -> Result<Self, Self::Error> {
        Ok(Self {
            channel_address: address(value.channel_address)?,
            participants: pair(value.participants, address)?,
            timeout: u256(value.timeout)?,
            balances: value
                .balances
                .into_iter()
                .map(Balance::try_from)
                .collect::<Result<_, _>>()?,
            locked_balance: value
                .locked_balance
                .into_iter()
                .map(u256)
                .collect::<Result<_, _>>()?,
            asset_ids: value
                .asset_ids
                .into_iter()
                .map(address)
                .collect::<Result<_, _>>()?,
            nonce: value.nonce,
            latest_deposit_nonce: value.latest_deposit_nonce,
            merkle_root: hash(value.merkle_root)?,
        })
    }
}

impl From<CoreChannelState> for proto::CoreState {
    fn from(value: CoreChannelState) -> Self {
        Self {
            channel_address: value.channel_address.0.to_vec(),
            participants: value.participants.iter().map(|p| p.0.to_vec()).collect(),
            timeout: value.timeout.be_bytes().to_vec(),
            balances: value.balances.into_iter().map(Into::into).collect(),
            locked_balance: value
                .locked_balance
                .iter()
                .map(|l| l.be_bytes().to_vec())
                .collect(),
            asset_ids: value.asset_ids.iter().map(|a| a.0.to_vec()).collect(),
            nonce: value.nonce,
            latest_deposit_nonce: value.latest_deposit_nonce,
            merkle_root: value.merkle_root.0.to_vec(),
        }
    }
}

impl TryFrom<proto::Commitment> for ChannelCommitment {
    type Error = ConversionError;

    fn try_from(value: proto::Commitment) -> Result<Self, Self::Error> {
        Ok(Self {
            state: some(value.state)?.try_into()?,
            signatures: pair(value.signatures, signature)?,
        })
    }
}

impl From<ChannelCommitment> for proto::Commitment {
    fn from(value: ChannelCommitment) -> Self {
        Self {
            state: Some(value.state.into()),
            signatures: value
                .signatures
                .iter()
                .map(|s| s.map(|s| s.0.to_vec()).unwrap_or_default())
                .collect(),
        }
    }
}

impl TryFrom<proto::Details> for UpdateDetails {
    type Error = ConversionError;

    fn try_from(value: proto::Details) -> Result<Self, Self::Error> {
        Ok(match value {
            proto::Details::Setup(d) => UpdateDetails::Setup(SetupDetails {
                participants: pair(d.participants, address)?,
                public_identifiers: pair(d.public_identifiers, Ok)?,
                timeout: u256(d.timeout)?,
                network_context: some(d.network_context)?.try_into()?,
            }),
            proto::Details::Deposit(d) => UpdateDetails::Deposit(DepositDetails {
                asset_id: address(d.asset_id)?,
                amount: pair(d.amount, u256)?,
                latest_deposit_nonce: d.latest_deposit_nonce,
            }),
            proto::Details::Create(d) => UpdateDetails::Create(CreateDetails {
                transfer_id: hash(d.transfer_id)?,
                asset_id: address(d.asset_id)?,
                balance: some(d.balance)?.try_into()?,
                transfer_definition: address(d.transfer_definition)?,
                transfer_timeout: u256(d.transfer_timeout)?,
                merkle_root: hash(d.merkle_root)?,
            }),
            proto::Details::Resolve(d) => UpdateDetails::Resolve(ResolveDetails {
                transfer_id: hash(d.transfer_id)?,
                asset_id: address(d.asset_id)?,
                locked_amount: u256(d.locked_amount)?,
                balance: some(d.balance)?.try_into()?,
                merkle_root: hash(d.merkle_root)?,
            }),
        })
    }
}

impl From<UpdateDetails> for proto::Details {
    fn from(value: UpdateDetails) -> Self {
        match value {
            UpdateDetails::Setup(d) => proto::Details::Setup(proto::SetupDetails {
                participants: d.participants.iter().map(|p| p.0.to_vec()).collect(),
                public_identifiers: d.public_identifiers.to_vec(),
                timeout: d.timeout.be_bytes().to_vec(),
                network_context: Some(d.network_context.into()),
            }),
            UpdateDetails::Deposit(d) => proto::Details::Deposit(proto::DepositDetails {
                asset_id: d.asset_id.0.to_vec(),
                amount: d.amount.iter().map(|a| a.be_bytes().to_vec()).collect(),
                latest_deposit_nonce: d.latest_deposit_nonce,
            }),
            UpdateDetails::Create(d) => proto::Details::Create(proto::CreateDetails {
                transfer_id: d.transfer_id.0.to_vec(),
                asset_id: d.asset_id.0.to_vec(),
                balance: Some(d.balance.into()),
                transfer_definition: d.transfer_definition.0.to_vec(),
                transfer_timeout: d.transfer_timeout.be_bytes().to_vec(),
                merkle_root: d.merkle_root.0.to_vec(),
            }),
            UpdateDetails::Resolve(d) => proto::Details::Resolve(proto::ResolveDetails {
                transfer_id: d.transfer_id.0.to_vec(),
                asset_id: d.asset_id.0.to_vec(),
                locked_amount: d.locked_amount.be_bytes().to_vec(),
                balance: Some(d.balance.into()),
                merkle_root: d.merkle_root.0.to_vec(),
            }),
        }
    }
}

impl TryFrom<proto::ChannelUpdate> for ChannelUpdate {
    type Error = ConversionError;

    fn try_from(value: proto::ChannelUpdate) -> Result<Self, Self::Error> {
        Ok(Self {
            channel_address: address(value.channel_address)?,
            from_identifier: value.from_identifier,
            to_identifier: value.to_identifier,
            nonce: value.nonce,
            details: some(value.details)?.try_into()?,
            commitment: some(value.commitment)?.try_into()?,
        })
    }
}

impl From<ChannelUpdate> for proto::ChannelUpdate {
    fn from(value: ChannelUpdate) -> Self {
        Self {
            channel_address: value.channel_address.0.to_vec(),
            from_identifier: value.from_identifier,
            to_identifier: value.to_identifier,
            nonce: value.nonce,
            details: Some(value.details.into()),
            commitment: Some(value.commitment.into()),
        }
    }
}

impl From<UpdateErrorReason> for proto::ErrorReason {
    fn from(value: UpdateErrorReason) -> Self {
        match value {
            UpdateErrorReason::BadSignatures => proto::ErrorReason::BadSignatures,
            UpdateErrorReason::ChannelNotFound => proto::ErrorReason::ChannelNotFound,
            UpdateErrorReason::StaleUpdateNonce => proto::ErrorReason::StaleUpdateNonce,
            UpdateErrorReason::StaleChannelNonce => proto::ErrorReason::StaleChannelNonce,
            UpdateErrorReason::MergeUpdateFailed => proto::ErrorReason::MergeUpdateFailed,
            UpdateErrorReason::SaveChannelFailed => proto::ErrorReason::SaveChannelFailed,
            UpdateErrorReason::LoadChannelFailed => proto::ErrorReason::LoadChannelFailed,
            UpdateErrorReason::Equivocation => proto::ErrorReason::Equivocation,
            UpdateErrorReason::MessageFailed => proto::ErrorReason::MessageFailed,
        }
    }
}

impl From<proto::ErrorReason> for UpdateErrorReason {
    fn from(value: proto::ErrorReason) -> Self {
        match value {
            proto::ErrorReason::BadSignatures => UpdateErrorReason::BadSignatures,
            proto::ErrorReason::ChannelNotFound => UpdateErrorReason::ChannelNotFound,
            proto::ErrorReason::StaleUpdateNonce => UpdateErrorReason::StaleUpdateNonce,
            proto::ErrorReason::StaleChannelNonce => UpdateErrorReason::StaleChannelNonce,
            proto::ErrorReason::MergeUpdateFailed => UpdateErrorReason::MergeUpdateFailed,
            proto::ErrorReason::SaveChannelFailed => UpdateErrorReason::SaveChannelFailed,
            proto::ErrorReason::LoadChannelFailed => UpdateErrorReason::LoadChannelFailed,
            proto::ErrorReason::Equivocation => UpdateErrorReason::Equivocation,
            proto::ErrorReason::MessageFailed => UpdateErrorReason::MessageFailed,
        }
    }
}

impl TryFrom<proto::ChannelErrorMsg> for ChannelUpdateError {
    type Error = ConversionError;

    fn try_from(value: proto::ChannelErrorMsg) -> Result<Self, Self::Error> {
        let reason = proto::ErrorReason::from_i32(value.reason)
            .ok_or(ConversionError::UnknownErrorReason(value.reason))?;
        Ok(Self {
            reason: reason.into(),
            channel_address: address(value.channel_address)?,
            nonce: value.nonce,
            context: value.context,
            latest_update: value
                .latest_update
                .map(ChannelUpdate::try_from)
                .transpose()?,
        })
    }
}

impl From<ChannelUpdateError> for proto::ChannelErrorMsg {
    fn from(value: ChannelUpdateError) -> Self {
        Self {
            reason: proto::ErrorReason::from(value.reason) as i32,
            channel_address: value.channel_address.0.to_vec(),
            nonce: value.nonce,
            context: value.context,
            latest_update: value.latest_update.map(Into::into),
        }
    }
}

impl TryFrom<proto::Envelope> for VectorMessage {
    type Error = ConversionError;

    fn try_from(value: proto::Envelope) -> Result<Self, ConversionError> {
        let to = value.recipient;
        let from = value.sender;
        Ok(match some(value.msg)? {
            envelope::Msg::ChannelUpdateMsg(m) => VectorMessage::Update(UpdateMessage {
                to,
                from,
                update: some(m.update)?.try_into()?,
                latest_update: m
                    .latest_update
                    .map(ChannelUpdate::try_from)
                    .transpose()?,
            }),
            envelope::Msg::ChannelErrorMsg(m) => VectorMessage::Error(ErrorMessage {
                to,
                from,
                error: m.try_into()?,
            }),
        })
    }
}

impl From<VectorMessage> for proto::Envelope {
    fn from(value: VectorMessage) -> Self {
        match value {
            VectorMessage::Update(m) => Self {
                sender: m.from,
                recipient: m.to,
                msg: Some(envelope::Msg::ChannelUpdateMsg(proto::ChannelUpdateMsg {
                    update: Some(m.update.into()),
                    latest_update: m.latest_update.map(Into::into),
                })),
            },
            VectorMessage::Error(m) => Self {
                sender: m.from,
                recipient: m.to,
                msg: Some(envelope::Msg::ChannelErrorMsg(m.error.into())),
            },
        }
    }
}
