//! In-process transport for tests and demos.
//!
//! Every node gets a [MemoryTransport] from a shared [MemoryNetwork] and
//! receives its frames through a bounded mpsc channel.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use super::{BytesBus, Identity, Transport, WireError};

const QUEUE_LEN: usize = 1000;

#[derive(Debug)]
struct Envelope {
    from: Identity,
    frame: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MemoryNetwork {
    senders: RwLock<HashMap<Identity, mpsc::Sender<Envelope>>>,
    /// Frames to these recipients are silently dropped.
    lossy: RwLock<HashSet<Identity>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connect `identity` to the network, replacing an earlier connection.
    pub async fn create_transport(self: &Arc<Self>, identity: Identity) -> MemoryTransport {
        let (tx, rx) = mpsc::channel(QUEUE_LEN);
        self.senders.write().await.insert(identity.clone(), tx);

        MemoryTransport {
            identity,
            network: Arc::clone(self),
            receiver: Mutex::new(rx),
        }
    }

    /// Start or stop losing every frame sent to `identity`.
    pub async fn set_lossy(&self, identity: &Identity, lossy: bool) {
        let mut set = self.lossy.write().await;
        if lossy {
            set.insert(identity.clone());
        } else {
            set.remove(identity);
        }
    }

    pub async fn disconnect(&self, identity: &Identity) {
        self.senders.write().await.remove(identity);
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    identity: Identity,
    network: Arc<MemoryNetwork>,
    receiver: Mutex<mpsc::Receiver<Envelope>>,
}

impl MemoryTransport {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Next frame and its sender.
    pub async fn recv(&self) -> Result<(Identity, Vec<u8>), WireError> {
        let mut rx = self.receiver.lock().await;
        match rx.recv().await {
            Some(envelope) => Ok((envelope.from, envelope.frame)),
            None => Err(WireError::Closed),
        }
    }

    /// Like [Self::recv], `None` if nothing arrives within `timeout`.
    pub async fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<(Identity, Vec<u8>)>, WireError> {
        let mut rx = self.receiver.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(envelope)) => Ok(Some((envelope.from, envelope.frame))),
            Ok(None) => Err(WireError::Closed),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait]
impl BytesBus for MemoryTransport {
    async fn send_to(&self, recipient: &Identity, frame: &[u8]) -> Result<(), WireError> {
        if self.network.lossy.read().await.contains(recipient) {
            debug!(to = ?recipient, len = frame.len(), "dropping frame");
            return Ok(());
        }

        let sender = self
            .network
            .senders
            .read()
            .await
            .get(recipient)
            .cloned()
            .ok_or_else(|| WireError::UnknownPeer(recipient.clone()))?;
        sender
            .send(Envelope {
                from: self.identity.clone(),
                frame: frame.to_vec(),
            })
            .await
            .map_err(|_| WireError::Closed)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn identity(&self) -> &Identity {
        &self.identity
    }

    async fn recv(&self) -> Result<(Identity, Vec<u8>), WireError> {
        MemoryTransport::recv(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_reach_their_recipient() {
        let network = MemoryNetwork::new();
        let alice = network.create_transport(b"alice".to_vec()).await;
        let bob = network.create_transport(b"bob".to_vec()).await;

        alice.send_to(bob.identity(), &[1, 2, 3]).await.unwrap();
        assert_eq!(bob.recv().await.unwrap(), (b"alice".to_vec(), vec![1, 2, 3]));
        assert_eq!(
            alice.recv_timeout(Duration::from_millis(10)).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn unknown_and_lossy_peers() {
        let network = MemoryNetwork::new();
        let alice = network.create_transport(b"alice".to_vec()).await;
        let bob = network.create_transport(b"bob".to_vec()).await;

        assert_eq!(
            alice.send_to(&b"carol".to_vec(), &[0]).await,
            Err(WireError::UnknownPeer(b"carol".to_vec()))
        );

        network.set_lossy(bob.identity(), true).await;
        alice.send_to(bob.identity(), &[1]).await.unwrap();
        assert_eq!(
            bob.recv_timeout(Duration::from_millis(10)).await.unwrap(),
            None
        );

        network.set_lossy(bob.identity(), false).await;
        alice.send_to(bob.identity(), &[2]).await.unwrap();
        assert_eq!(bob.recv().await.unwrap().1, vec![2]);

        network.disconnect(bob.identity()).await;
        assert!(alice.send_to(bob.identity(), &[3]).await.is_err());
    }
}
