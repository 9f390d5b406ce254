//! Signer using the secp256k1 crate (bindings to libsecp256k1).

use crate::abiencode::types::{Address, Hash, Signature};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey, Verification,
};
use sha3::{Digest, Keccak256};

use super::hash_to_eth_signed_msg_hash;

pub use secp256k1::Error;

pub struct Signer {
    secp: Secp256k1<All>,
    sk: SecretKey,
    addr: Address,
}

impl core::fmt::Debug for Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Signer").field("addr", &self.addr).finish()
    }
}

impl From<PublicKey> for Address {
    fn from(pk: PublicKey) -> Self {
        // Throw away the first byte, which is not part of the public key. It is
        // added by serialize_uncompressed due to the encoding used.
        let hash: [u8; 32] = Keccak256::digest(&pk.serialize_uncompressed()[1..]).into();

        let mut addr = Address([0; 20]);
        addr.0.copy_from_slice(&hash[32 - 20..]);
        addr
    }
}

impl Signer {
    /// Fresh random key.
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        loop {
            // Out-of-range scalars are astronomically unlikely, retry anyway.
            let bytes: [u8; 32] = rng.gen();
            if let Ok(signer) = Self::from_bytes(&bytes) {
                return signer;
            }
        }
    }

    /// Key from its 32 byte big endian scalar.
    pub fn from_bytes(private_key: &[u8; 32]) -> Result<Self, Error> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(private_key)?;
        let addr = PublicKey::from_secret_key(&secp, &sk).into();
        Ok(Self { secp, sk, addr })
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    /// Sign a hash using a Ethereum 65-byte recoverable signature.
    pub fn sign_eth(&self, msg: Hash) -> Result<Signature, Error> {
        let hash = hash_to_eth_signed_msg_hash(msg);

        let sig = self
            .secp
            .sign_ecdsa_recoverable(&Message::from_slice(&hash.0)?, &self.sk);
        let (v, rs) = sig.serialize_compact();

        // EIP-2: only canonical (low s) signatures are accepted on-chain.
        // libsecp256k1 already produces those.
        debug_assert!(rs[32] & 0x80 == 0);

        // yParity is offset by 27, no EIP-155 chain id in personal_sign.
        let v: u8 = 27 + v.to_i32() as u8;

        Ok(Signature::new(&rs, v))
    }

    pub fn recover_signer(&self, msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
        recover_with(&self.secp, msg, eth_sig)
    }
}

/// Recover the address that produced `eth_sig` over `msg` (without the
/// `Ethereum Signed Message` prefix, it is added here).
pub fn recover_signer(msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
    recover_with(&Secp256k1::verification_only(), msg, eth_sig)
}

fn recover_with<C: Verification>(
    secp: &Secp256k1<C>,
    msg: Hash,
    eth_sig: Signature,
) -> Result<Address, Error> {
    let hash = hash_to_eth_signed_msg_hash(msg);

    let v = eth_sig.0[64]
        .checked_sub(27)
        .ok_or(Error::InvalidRecoveryId)?;
    let recid = RecoveryId::from_i32(v.into())?;
    let sig = RecoverableSignature::from_compact(&eth_sig.0[..64], recid)?;

    let pk = secp.recover_ecdsa(&Message::from_slice(&hash.0)?, &sig)?;
    Ok(pk.into())
}
