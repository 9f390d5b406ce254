use super::*;
use crate::{
    abiencode::types::{Address, Hash, U256},
    sig::Signer,
    wire::Identity,
};
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

pub(crate) const ASSET: Address = Address([0xee; 20]);

pub(crate) struct Party {
    pub signer: Signer,
    pub identity: Identity,
}

pub(crate) fn parties() -> [Party; PARTICIPANTS] {
    let mut rng = StdRng::seed_from_u64(42);
    [
        Party {
            signer: Signer::new(&mut rng),
            identity: b"alice".to_vec(),
        },
        Party {
            signer: Signer::new(&mut rng),
            identity: b"bob".to_vec(),
        },
    ]
}

pub(crate) fn network() -> NetworkContext {
    NetworkContext {
        chain_id: U256::from(1337),
        channel_factory_address: Address([0xfa; 20]),
    }
}

pub(crate) fn setup_params(parties: &[Party; PARTICIPANTS]) -> UpdateParams {
    let participants = [parties[0].signer.address(), parties[1].signer.address()];
    let network_context = network();
    UpdateParams {
        channel_address: network_context.channel_address(&participants).unwrap(),
        details: UpdateDetails::Setup(SetupDetails {
            participants,
            public_identifiers: [parties[0].identity.clone(), parties[1].identity.clone()],
            timeout: U256::from(86400),
            network_context,
        }),
    }
}

pub(crate) fn deposit_params(channel: &ChannelState, a: u64, b: u64, nonce: u64) -> UpdateParams {
    UpdateParams {
        channel_address: channel.channel_address(),
        details: UpdateDetails::Deposit(DepositDetails {
            asset_id: ASSET,
            amount: [U256::from(a), U256::from(b)],
            latest_deposit_nonce: nonce,
        }),
    }
}

pub(crate) fn create_params(channel: &ChannelState, from: u64, to: u64) -> UpdateParams {
    UpdateParams {
        channel_address: channel.channel_address(),
        details: UpdateDetails::Create(CreateDetails {
            transfer_id: Hash([channel.nonce() as u8; 32]),
            asset_id: ASSET,
            balance: Balance {
                amount: [U256::from(from), U256::from(to)],
                to: channel.core.participants,
            },
            transfer_definition: Address([0xdf; 20]),
            transfer_timeout: U256::from(3600),
            merkle_root: Hash([0x11; 32]),
        }),
    }
}

/// Single-signed proposal of `proposer`.
pub(crate) fn propose(
    params: &UpdateParams,
    previous: Option<&ChannelState>,
    proposer: &Party,
) -> ChannelUpdate {
    generate_update(
        params,
        previous,
        &proposer.signer,
        &proposer.identity,
        &BasicValidator,
    )
    .unwrap()
}

pub(crate) fn countersign(mut update: ChannelUpdate, responder: &Party) -> ChannelUpdate {
    update.commitment.sign(&responder.signer).unwrap();
    update
}

/// Apply a double-signed update the way both sides would.
pub(crate) fn advance(
    params: &UpdateParams,
    previous: Option<&ChannelState>,
    proposer: &Party,
    responder: &Party,
) -> ChannelState {
    let update = countersign(propose(params, previous, proposer), responder);
    merge_update(&update, previous, &BasicValidator).unwrap()
}

/// Channel at nonce 2 with 100 for alice and 50 for bob.
pub(crate) fn funded_channel(parties: &[Party; PARTICIPANTS]) -> ChannelState {
    let setup = advance(&setup_params(parties), None, &parties[0], &parties[1]);
    advance(
        &deposit_params(&setup, 100, 50, 1),
        Some(&setup),
        &parties[0],
        &parties[1],
    )
}

#[test]
fn setup_creates_empty_channel() {
    let parties = parties();
    let state = advance(&setup_params(&parties), None, &parties[0], &parties[1]);

    assert_eq!(state.nonce(), 1);
    assert_eq!(state.latest_update.nonce, 1);
    assert!(state.core.balances.is_empty());
    assert_eq!(state.core.merkle_root, Hash::default());
    assert_eq!(state.participant_of(&parties[1].identity), Some(1));
    assert_eq!(
        state.counterparty_of(&parties[0].identity),
        Some(&parties[1].identity)
    );
    assert!(state.latest_update.is_double_signed());
}

#[test]
fn channel_address_depends_on_network() {
    let parties = parties();
    let participants = [parties[0].signer.address(), parties[1].signer.address()];
    let mut other = network();
    other.chain_id = U256::from(1);

    assert_eq!(
        network().channel_address(&participants).unwrap(),
        network().channel_address(&participants).unwrap()
    );
    assert_ne!(
        network().channel_address(&participants).unwrap(),
        other.channel_address(&participants).unwrap()
    );
}

#[test]
fn setup_only_by_initiator() {
    let parties = parties();
    let err = generate_update(
        &setup_params(&parties),
        None,
        &parties[1].signer,
        &parties[1].identity,
        &BasicValidator,
    )
    .unwrap_err();
    assert_eq!(
        err,
        GenerateUpdateError::Invalid(InvalidUpdate::SetupNotFromInitiator)
    );
}

#[test]
fn setup_twice_is_rejected() {
    let parties = parties();
    let state = funded_channel(&parties);
    let err = generate_update(
        &setup_params(&parties),
        Some(&state),
        &parties[0].signer,
        &parties[0].identity,
        &BasicValidator,
    )
    .unwrap_err();
    assert_eq!(err, GenerateUpdateError::Invalid(InvalidUpdate::AlreadySetUp));
}

#[test]
fn deposit_credits_both_sides() {
    let parties = parties();
    let state = funded_channel(&parties);

    assert_eq!(state.nonce(), 2);
    assert_eq!(state.core.asset_ids, vec![ASSET]);
    assert_eq!(
        state.core.balances[0].amount,
        [U256::from(100), U256::from(50)]
    );
    assert_eq!(state.core.locked_balance, vec![U256::zero()]);
    assert_eq!(state.core.latest_deposit_nonce, 1);

    let more = advance(
        &deposit_params(&state, 1, 2, 2),
        Some(&state),
        &parties[1],
        &parties[0],
    );
    assert_eq!(more.core.asset_ids.len(), 1);
    assert_eq!(
        more.core.balances[0].amount,
        [U256::from(101), U256::from(52)]
    );
}

#[test]
fn deposit_nonce_must_not_decrease() {
    let parties = parties();
    let state = funded_channel(&parties);
    let err = generate_update(
        &deposit_params(&state, 1, 1, 0),
        Some(&state),
        &parties[0].signer,
        &parties[0].identity,
        &BasicValidator,
    )
    .unwrap_err();
    assert_eq!(
        err,
        GenerateUpdateError::Invalid(InvalidUpdate::DepositNonceDecreased {
            previous: 1,
            got: 0
        })
    );
}

#[test]
fn create_debits_proposer_first() {
    let parties = parties();
    let state = funded_channel(&parties);

    let by_alice = advance(
        &create_params(&state, 30, 5),
        Some(&state),
        &parties[0],
        &parties[1],
    );
    assert_eq!(
        by_alice.core.balances[0].amount,
        [U256::from(70), U256::from(45)]
    );
    assert_eq!(by_alice.core.locked_balance, vec![U256::from(35)]);
    assert_eq!(by_alice.core.merkle_root, Hash([0x11; 32]));

    let by_bob = advance(
        &create_params(&state, 30, 5),
        Some(&state),
        &parties[1],
        &parties[0],
    );
    assert_eq!(
        by_bob.core.balances[0].amount,
        [U256::from(95), U256::from(20)]
    );
}

#[test]
fn create_can_not_overdraw() {
    let parties = parties();
    let state = funded_channel(&parties);
    let err = generate_update(
        &create_params(&state, 51, 0),
        Some(&state),
        &parties[1].signer,
        &parties[1].identity,
        &BasicValidator,
    )
    .unwrap_err();
    assert_eq!(
        err,
        GenerateUpdateError::Invalid(InvalidUpdate::InsufficientBalance(1))
    );
}

#[test]
fn resolve_releases_locked_funds() {
    let parties = parties();
    let state = funded_channel(&parties);
    let created = advance(
        &create_params(&state, 30, 0),
        Some(&state),
        &parties[0],
        &parties[1],
    );

    let resolve = UpdateParams {
        channel_address: created.channel_address(),
        details: UpdateDetails::Resolve(ResolveDetails {
            transfer_id: Hash([2; 32]),
            asset_id: ASSET,
            locked_amount: U256::from(30),
            balance: Balance {
                amount: [U256::from(10), U256::from(20)],
                to: created.core.participants,
            },
            merkle_root: Hash::default(),
        }),
    };
    let resolved = advance(&resolve, Some(&created), &parties[1], &parties[0]);

    assert_eq!(resolved.nonce(), 4);
    assert_eq!(
        resolved.core.balances[0].amount,
        [U256::from(80), U256::from(70)]
    );
    assert_eq!(resolved.core.locked_balance, vec![U256::zero()]);
    assert_eq!(resolved.core.merkle_root, Hash::default());
}

#[test]
fn resolve_amounts_must_match_locked() {
    let parties = parties();
    let state = funded_channel(&parties);
    let created = advance(
        &create_params(&state, 30, 0),
        Some(&state),
        &parties[0],
        &parties[1],
    );

    let resolve = UpdateParams {
        channel_address: created.channel_address(),
        details: UpdateDetails::Resolve(ResolveDetails {
            transfer_id: Hash([2; 32]),
            asset_id: ASSET,
            locked_amount: U256::from(30),
            balance: Balance {
                amount: [U256::from(10), U256::from(10)],
                to: created.core.participants,
            },
            merkle_root: Hash::default(),
        }),
    };
    let err = generate_update(
        &resolve,
        Some(&created),
        &parties[0].signer,
        &parties[0].identity,
        &BasicValidator,
    )
    .unwrap_err();
    assert_eq!(
        err,
        GenerateUpdateError::Invalid(InvalidUpdate::ResolveAmountMismatch)
    );
}

#[test]
fn merge_rejects_wrong_nonce() {
    let parties = parties();
    let state = funded_channel(&parties);
    let mut update = propose(&deposit_params(&state, 1, 1, 2), Some(&state), &parties[0]);
    update.nonce += 1;

    assert_eq!(
        merge_update(&update, Some(&state), &BasicValidator),
        Err(InvalidUpdate::InvalidNonce {
            expected: 3,
            got: 4
        })
    );
}

#[test]
fn merge_rejects_tampered_commitment() {
    let parties = parties();
    let state = funded_channel(&parties);
    let mut update = propose(&deposit_params(&state, 1, 1, 2), Some(&state), &parties[0]);
    update.commitment.state.balances[0].amount[0] = U256::from(1_000_000);

    assert_eq!(
        merge_update(&update, Some(&state), &BasicValidator),
        Err(InvalidUpdate::CommitmentMismatch)
    );
}

#[test]
fn merge_rejects_strangers() {
    let parties = parties();
    let state = funded_channel(&parties);
    let mut update = propose(&deposit_params(&state, 1, 1, 2), Some(&state), &parties[0]);
    update.from_identifier = b"mallory".to_vec();

    assert_eq!(
        merge_update(&update, Some(&state), &BasicValidator),
        Err(InvalidUpdate::UnknownIdentifier)
    );
}

#[test]
fn commitment_signature_slots() {
    let parties = parties();
    let state = funded_channel(&parties);
    let update = propose(&deposit_params(&state, 1, 1, 2), Some(&state), &parties[1]);

    assert!(update.is_single_signed());
    assert!(update.commitment.signatures[0].is_none());
    assert!(update.commitment.signatures[1].is_some());
    assert_eq!(update.commitment.assert_signatures(false), Ok(()));
    assert_eq!(
        update.commitment.assert_signatures(true),
        Err(CommitmentError::MissingSignature(0))
    );

    let mut double = update.clone();
    assert_eq!(
        double.commitment.sign(&parties[1].signer),
        Err(CommitmentError::AlreadySigned(1))
    );
    double.commitment.sign(&parties[0].signer).unwrap();
    assert!(double.is_double_signed());
    assert_eq!(double.commitment.assert_signatures(true), Ok(()));
}

#[test]
fn add_signature_checks_signer() {
    let parties = parties();
    let state = funded_channel(&parties);
    let update = propose(&deposit_params(&state, 1, 1, 2), Some(&state), &parties[0]);
    let alice_sig = update.commitment.signatures[0].unwrap();

    let mut empty = ChannelCommitment::new(update.commitment.state.clone());
    assert_eq!(
        empty.assert_signatures(false),
        Err(CommitmentError::MissingSignature(0))
    );
    assert_eq!(empty.add_signature(alice_sig), Ok(0));
    assert!(empty.is_single_signed());
    assert_eq!(
        empty.add_signature(alice_sig),
        Err(CommitmentError::AlreadySigned(0))
    );

    // Signed over a different state, so it recovers to some stranger.
    let mut other = ChannelCommitment::new(state.core.clone());
    assert!(matches!(
        other.add_signature(alice_sig),
        Err(CommitmentError::NotAParticipant(_))
    ));
}

#[test]
fn stranger_can_not_sign() {
    let parties = parties();
    let state = funded_channel(&parties);
    let mallory = Signer::new(&mut StdRng::seed_from_u64(7));
    let mut commitment = ChannelCommitment::new(state.core.clone());

    assert_eq!(
        commitment.sign(&mallory),
        Err(CommitmentError::NotAParticipant(mallory.address()))
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn merge_is_deterministic(a in 0u64..1_000, b in 0u64..1_000, lock in 0u64..100) {
        let parties = parties();
        let state = funded_channel(&parties);
        let deposit = countersign(
            propose(&deposit_params(&state, a, b, 2), Some(&state), &parties[1]),
            &parties[0],
        );

        let first = merge_update(&deposit, Some(&state), &BasicValidator);
        let second = merge_update(&deposit, Some(&state), &BasicValidator);
        prop_assert_eq!(&first, &second);

        let deposited = first.unwrap();
        let create = create_params(&deposited, lock, 0);
        let once = generate_update(&create, Some(&deposited), &parties[0].signer, &parties[0].identity, &BasicValidator)
            .map(|u| u.commitment.state);
        let twice = generate_update(&create, Some(&deposited), &parties[0].signer, &parties[0].identity, &BasicValidator)
            .map(|u| u.commitment.state);
        prop_assert_eq!(once, twice);
    }
}
