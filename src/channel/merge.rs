use super::{
    Balance, ChannelCommitment, ChannelState, ChannelUpdate, CommitmentError, CoreChannelState,
    InvalidUpdate, NetworkContext, PartIdx, UpdateDetails, UpdateParams, UpdateProposal,
    UpdateValidator, PARTICIPANTS,
};
use crate::{
    abiencode::types::{Hash, U256},
    sig::Signer,
    wire::Identity,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerateUpdateError {
    #[error(transparent)]
    Invalid(#[from] InvalidUpdate),
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
}

/// Validate `update` against `previous` and compute the successor state.
///
/// Pure: both participants get the same result for the same input. The
/// computed core has to equal the state in the update's commitment,
/// otherwise the signatures would cover something else than what gets
/// stored. The returned state keeps `update` as its `latest_update`.
pub fn merge_update<V>(
    update: &ChannelUpdate,
    previous: Option<&ChannelState>,
    validator: &V,
) -> Result<ChannelState, InvalidUpdate>
where
    V: UpdateValidator + ?Sized,
{
    let proposal = update.proposal();
    validator.validate(&proposal, previous)?;
    let (core, network_context, public_identifiers) = apply(&proposal, previous)?;

    if core != update.commitment.state {
        return Err(InvalidUpdate::CommitmentMismatch);
    }

    Ok(ChannelState {
        core,
        network_context,
        public_identifiers,
        latest_update: update.clone(),
    })
}

/// Build the single-signed update for `params` on top of `previous`.
pub fn generate_update<V>(
    params: &UpdateParams,
    previous: Option<&ChannelState>,
    signer: &Signer,
    own_identity: &Identity,
    validator: &V,
) -> Result<ChannelUpdate, GenerateUpdateError>
where
    V: UpdateValidator + ?Sized,
{
    let to_identifier = match (&params.details, previous) {
        (UpdateDetails::Setup(setup), _) => setup
            .public_identifiers
            .iter()
            .find(|id| *id != own_identity)
            .cloned()
            .ok_or(InvalidUpdate::DuplicateParticipants)?,
        (_, Some(previous)) => previous
            .counterparty_of(own_identity)
            .cloned()
            .ok_or(InvalidUpdate::UnknownIdentifier)?,
        (_, None) => return Err(InvalidUpdate::NotSetUp.into()),
    };

    let proposal = UpdateProposal {
        channel_address: params.channel_address,
        from_identifier: own_identity,
        to_identifier: &to_identifier,
        nonce: previous.map_or(0, ChannelState::nonce) + 1,
        details: &params.details,
    };
    validator.validate(&proposal, previous)?;
    let (core, _, _) = apply(&proposal, previous)?;

    let mut commitment = ChannelCommitment::new(core);
    commitment.sign(signer)?;
    let nonce = proposal.nonce;

    Ok(ChannelUpdate {
        channel_address: params.channel_address,
        from_identifier: own_identity.clone(),
        to_identifier,
        nonce,
        details: params.details.clone(),
        commitment,
    })
}

type Successor = (CoreChannelState, NetworkContext, [Identity; PARTICIPANTS]);

fn apply(
    proposal: &UpdateProposal<'_>,
    previous: Option<&ChannelState>,
) -> Result<Successor, InvalidUpdate> {
    let previous = match (proposal.details, previous) {
        (UpdateDetails::Setup(setup), None) => {
            let core = CoreChannelState {
                channel_address: proposal.channel_address,
                participants: setup.participants,
                timeout: setup.timeout,
                balances: Vec::new(),
                locked_balance: Vec::new(),
                asset_ids: Vec::new(),
                nonce: proposal.nonce,
                latest_deposit_nonce: 0,
                merkle_root: Hash::default(),
            };
            return Ok((
                core,
                setup.network_context,
                setup.public_identifiers.clone(),
            ));
        }
        (UpdateDetails::Setup(_), Some(_)) => return Err(InvalidUpdate::AlreadySetUp),
        (_, None) => return Err(InvalidUpdate::NotSetUp),
        (_, Some(previous)) => previous,
    };

    let from = previous
        .participant_of(proposal.from_identifier)
        .ok_or(InvalidUpdate::UnknownIdentifier)?;

    let mut core = previous.core.clone();
    core.nonce = proposal.nonce;

    match proposal.details {
        UpdateDetails::Setup(_) => {}
        UpdateDetails::Deposit(d) => {
            let asset = match core.asset_index(&d.asset_id) {
                Some(asset) => asset,
                None => {
                    core.asset_ids.push(d.asset_id);
                    core.balances.push(Balance {
                        amount: [U256::zero(); PARTICIPANTS],
                        to: core.participants,
                    });
                    core.locked_balance.push(U256::zero());
                    core.asset_ids.len() - 1
                }
            };
            let balance = &mut core.balances[asset];
            for (idx, amount) in d.amount.iter().enumerate() {
                balance.amount[idx] = credit(balance.amount[idx], *amount)?;
            }
            core.latest_deposit_nonce = d.latest_deposit_nonce;
        }
        UpdateDetails::Create(d) => {
            let asset = core
                .asset_index(&d.asset_id)
                .ok_or(InvalidUpdate::UnknownAsset(d.asset_id))?;
            let total = d.balance.total().ok_or(InvalidUpdate::Overflow)?;

            let balance = &mut core.balances[asset];
            balance.amount[from] = debit(balance.amount[from], d.balance.amount[0], from)?;
            balance.amount[1 - from] =
                debit(balance.amount[1 - from], d.balance.amount[1], 1 - from)?;
            core.locked_balance[asset] = credit(core.locked_balance[asset], total)?;
            core.merkle_root = d.merkle_root;
        }
        UpdateDetails::Resolve(d) => {
            let asset = core
                .asset_index(&d.asset_id)
                .ok_or(InvalidUpdate::UnknownAsset(d.asset_id))?;
            core.locked_balance[asset] = core.locked_balance[asset]
                .checked_sub(d.locked_amount)
                .ok_or(InvalidUpdate::LockedAmountExceeded {
                    locked_amount: d.locked_amount,
                    available: core.locked_balance[asset],
                })?;

            for (recipient, amount) in d.balance.to.iter().zip(d.balance.amount.iter()) {
                let idx = core
                    .participant_index(recipient)
                    .ok_or(InvalidUpdate::UnknownRecipient(*recipient))?;
                let balance = &mut core.balances[asset];
                balance.amount[idx] = credit(balance.amount[idx], *amount)?;
            }
            core.merkle_root = d.merkle_root;
        }
    }

    Ok((
        core,
        previous.network_context,
        previous.public_identifiers.clone(),
    ))
}

fn credit(balance: U256, amount: U256) -> Result<U256, InvalidUpdate> {
    balance.checked_add(amount).ok_or(InvalidUpdate::Overflow)
}

fn debit(balance: U256, amount: U256, idx: PartIdx) -> Result<U256, InvalidUpdate> {
    balance
        .checked_sub(amount)
        .ok_or(InvalidUpdate::InsufficientBalance(idx))
}
