//! Getting messages to the counterparty.
//!
//! [MessageBus] is what the synchronizer talks to. [ProtoBufEncodingLayer]
//! turns it into a [BytesBus], which only has to move length prefixed
//! frames between public identifiers.

mod encoding;
pub mod memory;
pub mod proto;

use core::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;

pub use encoding::ProtoBufEncodingLayer;

use crate::messages::{ConversionError, VectorMessage};

/// Public identifier of a node, opaque to the protocol.
pub type Identity = Vec<u8>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("failed to encode message: {0}")]
    Encode(String),
    #[error("failed to decode message: {0}")]
    Decode(String),
    #[error("message of {0} bytes does not fit into a frame")]
    FrameTooLarge(usize),
    #[error("frame length {announced} does not match payload length {actual}")]
    FrameLength { announced: usize, actual: usize },
    #[error("invalid message: {0:?}")]
    Conversion(ConversionError),
    #[error("unknown recipient {0:?}")]
    UnknownPeer(Identity),
    #[error("transport closed")]
    Closed,
}

impl From<ConversionError> for WireError {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}

/// Low-level transport of encoded frames.
#[async_trait]
pub trait BytesBus: Debug + Send + Sync {
    async fn send_to(&self, recipient: &Identity, frame: &[u8]) -> Result<(), WireError>;
}

/// A [BytesBus] that also receives, as needed by
/// [VectorClient::run](crate::VectorClient::run).
#[async_trait]
pub trait Transport: BytesBus {
    /// The identity the counterparty addresses us by.
    fn identity(&self) -> &Identity;

    /// Next frame and its sender. [WireError::Closed] once nothing more can
    /// arrive.
    async fn recv(&self) -> Result<(Identity, Vec<u8>), WireError>;
}

/// Typed transport used by the synchronizer. The recipient is taken from
/// the message.
#[async_trait]
pub trait MessageBus: Debug + Send + Sync {
    async fn send(&self, msg: VectorMessage) -> Result<(), WireError>;
}
