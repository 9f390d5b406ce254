//! Handles the creation and verification of (Ethereum) Signatures.
//!
//! Commitments are signed with the `personal_sign` scheme the channel
//! contracts expect: the 32 byte commitment hash is prefixed with
//! `\x19Ethereum Signed Message:\n32`, hashed again and signed with a 65
//! byte recoverable signature (`v` is 27 or 28).

use crate::abiencode::types::Hash;
use sha3::{Digest, Keccak256};

#[cfg(feature = "secp256k1")]
mod secp256k1;
#[cfg(feature = "secp256k1")]
pub use self::secp256k1::{recover_signer, Error, Signer};

#[cfg(all(feature = "k256", not(feature = "secp256k1")))]
mod k256;
#[cfg(all(feature = "k256", not(feature = "secp256k1")))]
pub use self::k256::{recover_signer, Error, Signer};

#[cfg(not(any(feature = "k256", feature = "secp256k1")))]
compile_error!("Select a signing backend: enable the 'k256' or the 'secp256k1' feature");


/// Add the `\x19Ethereum Signed Message\n<length>` prefix to hash.
///
/// This is the format expected by the Solidity contracts.
fn hash_to_eth_signed_msg_hash(hash: Hash) -> Hash {
    // Packed encoding => We can't use the serializer
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(hash.0);
    Hash(hasher.finalize().into())
}
