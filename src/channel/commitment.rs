use super::{CoreChannelState, PartIdx, PARTICIPANTS};
use crate::{
    abiencode::{
        self,
        types::{Address, Hash, Signature},
    },
    sig::{self, Signer},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitmentError {
    #[error("failed to encode channel state: {0}")]
    AbiEncode(#[from] abiencode::Error),
    #[error("signature backend: {0}")]
    Backend(String),
    #[error("signer {0:?} is not a participant")]
    NotAParticipant(Address),
    #[error("participant {0} already signed")]
    AlreadySigned(PartIdx),
    #[error("signature of participant {idx} recovers to {recovered:?}")]
    InvalidSignature { idx: PartIdx, recovered: Address },
    #[error("missing signature of participant {0}")]
    MissingSignature(PartIdx),
}

impl From<sig::Error> for CommitmentError {
    fn from(e: sig::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

/// `keccak256(abi.encode(state))`, the digest both participants sign.
pub fn hash_core_state(state: &CoreChannelState) -> Result<Hash, CommitmentError> {
    Ok(abiencode::to_hash(state)?)
}

/// A channel state together with the signatures collected on it so far,
/// indexed like `state.participants`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCommitment {
    pub state: CoreChannelState,
    pub signatures: [Option<Signature>; PARTICIPANTS],
}

impl ChannelCommitment {
    pub fn new(state: CoreChannelState) -> Self {
        Self {
            state,
            signatures: [None; PARTICIPANTS],
        }
    }

    pub fn hash(&self) -> Result<Hash, CommitmentError> {
        hash_core_state(&self.state)
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_single_signed(&self) -> bool {
        self.signature_count() == 1
    }

    pub fn is_double_signed(&self) -> bool {
        self.signature_count() == PARTICIPANTS
    }

    /// Sign the state with `signer` and put the signature into its slot.
    pub fn sign(&mut self, signer: &Signer) -> Result<Signature, CommitmentError> {
        let addr = signer.address();
        let idx = self
            .state
            .participant_index(&addr)
            .ok_or(CommitmentError::NotAParticipant(addr))?;
        if self.signatures[idx].is_some() {
            return Err(CommitmentError::AlreadySigned(idx));
        }

        let sig = signer.sign_eth(self.hash()?)?;
        self.signatures[idx] = Some(sig);
        Ok(sig)
    }

    /// Put a received signature into the slot of the participant it
    /// recovers to.
    pub fn add_signature(&mut self, sig: Signature) -> Result<PartIdx, CommitmentError> {
        let signer = sig::recover_signer(self.hash()?, sig)?;
        let idx = self
            .state
            .participant_index(&signer)
            .ok_or(CommitmentError::NotAParticipant(signer))?;
        if self.signatures[idx].is_some() {
            return Err(CommitmentError::AlreadySigned(idx));
        }
        self.signatures[idx] = Some(sig);
        Ok(idx)
    }

    /// Check every present signature against its participant.
    ///
    /// With `require_all` a missing signature is an error, otherwise at least
    /// one has to be there.
    pub fn assert_signatures(&self, require_all: bool) -> Result<(), CommitmentError> {
        let hash = self.hash()?;
        let mut present = 0;
        for (idx, sig) in self.signatures.iter().enumerate() {
            match sig {
                Some(sig) => {
                    self.check_signature_of_hash(hash, idx, *sig)?;
                    present += 1;
                }
                None if require_all => return Err(CommitmentError::MissingSignature(idx)),
                None => {}
            }
        }
        if present == 0 {
            return Err(CommitmentError::MissingSignature(0));
        }
        Ok(())
    }

    fn check_signature_of_hash(
        &self,
        hash: Hash,
        idx: PartIdx,
        sig: Signature,
    ) -> Result<(), CommitmentError> {
        let recovered = sig::recover_signer(hash, sig)?;
        if recovered != self.state.participants[idx] {
            return Err(CommitmentError::InvalidSignature { idx, recovered });
        }
        Ok(())
    }
}
