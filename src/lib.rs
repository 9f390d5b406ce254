//! Off-chain update protocol of a two-party state channel.
//!
//! Each node runs a [VectorClient]. Updates are proposed with a single
//! signature, counter-signed by the other participant and then stored by
//! both. See [sync] for how two nodes that got out of step recover.

mod abiencode {
    mod error;
    mod hashing;
    mod ser;

    pub mod types;

    pub use error::Error;
    pub use hashing::to_hash;
    pub use ser::{to_writer, Writer};

    #[cfg(test)]
    pub mod as_bytes;

    #[cfg(test)]
    mod tests;
}
pub mod sig;

pub mod channel;
mod client;
pub mod error;
pub mod events;
pub mod lock;
pub mod messages;
pub mod store;
pub mod sync;
pub mod wire;

pub use abiencode::types::{Address, Hash, Signature, U256};
pub use client::{ClientBus, VectorClient};
pub use sync::{SyncConfig, Synchronizer};
