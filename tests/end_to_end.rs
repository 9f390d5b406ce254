//! Two nodes talking over the in-memory network, from setup to resolve.

use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use tokio::task::JoinHandle;
use vector::{
    channel::{Balance, ChannelState, CreateDetails, NetworkContext, ResolveDetails},
    error::SyncError,
    sig::Signer,
    store::MemoryStore,
    wire::memory::MemoryNetwork,
    Address, Hash, SyncConfig, VectorClient, U256,
};

const ASSET: Address = Address([0xee; 20]);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn network_context() -> NetworkContext {
    NetworkContext {
        chain_id: U256::from(1337),
        channel_factory_address: Address([0xfa; 20]),
    }
}

struct Node {
    client: VectorClient,
    _receiver: JoinHandle<()>,
}

async fn start(network: &Arc<MemoryNetwork>, name: &str, rng: &mut StdRng, config: SyncConfig) -> Node {
    let transport = network.create_transport(name.as_bytes().to_vec()).await;
    let client = VectorClient::new(Signer::new(rng), MemoryStore::new(), transport, config);
    let receiver = tokio::spawn({
        let client = client.clone();
        async move { client.run().await }
    });
    Node {
        client,
        _receiver: receiver,
    }
}

async fn alice_and_bob(config: SyncConfig) -> (Node, Node, Arc<MemoryNetwork>) {
    init_tracing();
    let network = MemoryNetwork::new();
    let mut rng = StdRng::seed_from_u64(0);
    let alice = start(&network, "alice", &mut rng, config.clone()).await;
    let bob = start(&network, "bob", &mut rng, config).await;
    (alice, bob, network)
}

/// Open a channel and fund it with 100 for alice and 50 for bob.
async fn funded(alice: &VectorClient, bob: &VectorClient) -> ChannelState {
    let setup = alice
        .setup(
            bob.identity().clone(),
            bob.address(),
            network_context(),
            U256::from(86400),
        )
        .await
        .unwrap();
    alice
        .deposit(
            setup.channel_address(),
            ASSET,
            [U256::from(100), U256::from(50)],
            1,
        )
        .await
        .unwrap()
}

async fn assert_in_sync(alice: &VectorClient, bob: &VectorClient, channel: Address) -> ChannelState {
    let a = alice.channel(channel).await.unwrap().unwrap();
    let b = bob.channel(channel).await.unwrap().unwrap();
    assert_eq!(a, b);
    assert!(a.latest_update.is_double_signed());
    a
}

#[tokio::test]
async fn channel_lifecycle() {
    let (alice, bob, _network) = alice_and_bob(SyncConfig::default()).await;
    let (alice, bob) = (&alice.client, &bob.client);
    let mut bob_events = bob.subscribe_states();

    let state = funded(alice, bob).await;
    let channel = state.channel_address();
    assert_eq!(state.nonce(), 2);
    assert_in_sync(alice, bob, channel).await;

    // Bob locks 10 into a transfer to alice.
    let transfer_id = Hash([7; 32]);
    let state = bob
        .create_transfer(
            channel,
            CreateDetails {
                transfer_id,
                asset_id: ASSET,
                balance: Balance {
                    amount: [U256::from(10), U256::zero()],
                    to: [bob.address(), alice.address()],
                },
                transfer_definition: Address([0xdf; 20]),
                transfer_timeout: U256::from(3600),
                merkle_root: Hash([1; 32]),
            },
        )
        .await
        .unwrap();
    assert_eq!(state.nonce(), 3);
    assert_eq!(state.core.locked_balance, vec![U256::from(10)]);
    assert_eq!(
        state.core.balances[0].amount,
        [U256::from(100), U256::from(40)]
    );
    assert_eq!(bob_events.recv().await.unwrap(), state);

    // Alice resolves it in her favor.
    let state = alice
        .resolve_transfer(
            channel,
            ResolveDetails {
                transfer_id,
                asset_id: ASSET,
                locked_amount: U256::from(10),
                balance: Balance {
                    amount: [U256::zero(), U256::from(10)],
                    to: [bob.address(), alice.address()],
                },
                merkle_root: Hash::default(),
            },
        )
        .await
        .unwrap();
    assert_eq!(state.nonce(), 4);
    assert_eq!(state.core.locked_balance, vec![U256::zero()]);
    assert_eq!(
        state.core.balances[0].amount,
        [U256::from(110), U256::from(40)]
    );

    let synced = assert_in_sync(alice, bob, channel).await;
    assert_eq!(synced, state);
}

#[tokio::test]
async fn recovers_from_lost_acknowledgement() {
    let (alice, bob, network) = alice_and_bob(SyncConfig {
        update_timeout: Duration::from_millis(200),
        max_retries: 3,
    })
    .await;
    let (alice, bob) = (&alice.client, &bob.client);
    let channel = funded(alice, bob).await.channel_address();

    // Bob applies the deposit but his ack never arrives.
    network.set_lossy(alice.identity(), true).await;
    let err = alice
        .deposit(channel, ASSET, [U256::from(5), U256::zero()], 2)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Timeout { nonce: 3, .. }));
    assert_eq!(alice.channel(channel).await.unwrap().unwrap().nonce(), 2);
    assert_eq!(bob.channel(channel).await.unwrap().unwrap().nonce(), 3);
    network.set_lossy(alice.identity(), false).await;

    // The next proposal is rejected as stale, alice catches up and retries.
    let state = alice
        .create_transfer(
            channel,
            CreateDetails {
                transfer_id: Hash([9; 32]),
                asset_id: ASSET,
                balance: Balance {
                    amount: [U256::from(1), U256::zero()],
                    to: [alice.address(), bob.address()],
                },
                transfer_definition: Address([0xdf; 20]),
                transfer_timeout: U256::from(60),
                merkle_root: Hash([2; 32]),
            },
        )
        .await
        .unwrap();

    assert_eq!(state.nonce(), 4);
    assert_eq!(
        state.core.balances[0].amount,
        [U256::from(104), U256::from(50)]
    );
    assert_in_sync(alice, bob, channel).await;
}

#[tokio::test]
async fn unknown_counterparty() {
    let (alice, _bob, _network) = alice_and_bob(SyncConfig::default()).await;
    let err = alice
        .client
        .setup(
            b"carol".to_vec(),
            Address([0xc0; 20]),
            network_context(),
            U256::from(86400),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Wire(_)));
}
