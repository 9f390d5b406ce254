use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    abiencode::types::{Address, U256},
    channel::{
        ChannelState, CreateDetails, DepositDetails, NetworkContext, ResolveDetails,
        SetupDetails, UpdateDetails, UpdateParams,
    },
    error::{ChannelUpdateError, Result},
    sig::Signer,
    store::{ChannelStore, MemoryStore},
    sync::{SyncConfig, Synchronizer},
    wire::{memory::MemoryTransport, Identity, ProtoBufEncodingLayer, Transport, WireError},
};

/// Message bus of a [VectorClient] on top of the transport `T`.
pub type ClientBus<T> = ProtoBufEncodingLayer<T>;

/// The main object of a node: proposes updates on its channels and answers
/// the counterparty's.
///
/// Cloning is cheap, all clones share the same [Synchronizer]. Call
/// [VectorClient::run] on one of them to process incoming messages.
#[derive(Debug)]
pub struct VectorClient<T: Transport = MemoryTransport, S: ChannelStore = MemoryStore> {
    sync: Arc<Synchronizer<S, ClientBus<T>>>,
}

impl<T: Transport, S: ChannelStore> Clone for VectorClient<T, S> {
    fn clone(&self) -> Self {
        Self {
            sync: Arc::clone(&self.sync),
        }
    }
}

impl<T: Transport, S: ChannelStore> VectorClient<T, S> {
    /// Creates a new [VectorClient] identified by the transport's identity.
    pub fn new(signer: Signer, store: S, transport: T, config: SyncConfig) -> Self {
        let identity = transport.identity().clone();
        let bus = ProtoBufEncodingLayer::new(transport);
        Self {
            sync: Arc::new(Synchronizer::new(identity, signer, store, bus, config)),
        }
    }

    pub fn identity(&self) -> &Identity {
        self.sync.identity()
    }

    pub fn address(&self) -> Address {
        self.sync.address()
    }

    pub fn synchronizer(&self) -> &Synchronizer<S, ClientBus<T>> {
        &self.sync
    }

    pub async fn channel(&self, channel_address: Address) -> Result<Option<ChannelState>> {
        Ok(self.sync.store().get_channel_state(&channel_address).await?)
    }

    /// Open a channel with us as participant 0.
    pub async fn setup(
        &self,
        counterparty: Identity,
        counterparty_address: Address,
        network_context: NetworkContext,
        timeout: U256,
    ) -> Result<ChannelState> {
        let participants = [self.address(), counterparty_address];
        let channel_address = network_context.channel_address(&participants)?;
        info!(channel = ?channel_address, "setting up channel");

        self.sync
            .outbound(UpdateParams {
                channel_address,
                details: UpdateDetails::Setup(SetupDetails {
                    participants,
                    public_identifiers: [self.identity().clone(), counterparty],
                    timeout,
                    network_context,
                }),
            })
            .await
    }

    /// Credit deposits that already happened on chain.
    pub async fn deposit(
        &self,
        channel_address: Address,
        asset_id: Address,
        amount: [U256; 2],
        latest_deposit_nonce: u64,
    ) -> Result<ChannelState> {
        self.sync
            .outbound(UpdateParams {
                channel_address,
                details: UpdateDetails::Deposit(DepositDetails {
                    asset_id,
                    amount,
                    latest_deposit_nonce,
                }),
            })
            .await
    }

    pub async fn create_transfer(
        &self,
        channel_address: Address,
        details: CreateDetails,
    ) -> Result<ChannelState> {
        self.sync
            .outbound(UpdateParams {
                channel_address,
                details: UpdateDetails::Create(details),
            })
            .await
    }

    pub async fn resolve_transfer(
        &self,
        channel_address: Address,
        details: ResolveDetails,
    ) -> Result<ChannelState> {
        self.sync
            .outbound(UpdateParams {
                channel_address,
                details: UpdateDetails::Resolve(details),
            })
            .await
    }

    /// Decode one frame and hand it to the synchronizer.
    pub async fn handle_frame(&self, frame: &[u8]) -> Result<Option<ChannelState>> {
        let msg = ClientBus::<T>::decode(frame)?;
        self.sync.inbound(msg).await
    }

    /// Receive loop. Returns once the transport is closed.
    ///
    /// Failures of single messages are logged and skipped, they have already
    /// been reported to the counterparty and the error subscribers.
    pub async fn run(&self) {
        loop {
            let (from, frame) = match self.sync.bus().bus.recv().await {
                Ok(received) => received,
                Err(WireError::Closed) => {
                    debug!("transport closed, stopping receive loop");
                    return;
                }
                Err(e) => {
                    warn!(error = %e, "receiving failed");
                    continue;
                }
            };

            match self.handle_frame(&frame).await {
                Ok(Some(state)) => {
                    debug!(channel = ?state.channel_address(), nonce = state.nonce(), "channel advanced")
                }
                Ok(None) => {}
                Err(e) => warn!(from = ?from, error = %e, "dropping message"),
            }
        }
    }

    pub fn subscribe_states(&self) -> broadcast::Receiver<ChannelState> {
        self.sync.notifier().subscribe_states()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<ChannelUpdateError> {
        self.sync.notifier().subscribe_errors()
    }
}
