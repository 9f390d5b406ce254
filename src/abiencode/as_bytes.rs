//! Serialize any `&[u8]` as solidity `bytes` (dynamic length bytes).
//!
//! Without this, byte arrays are written as static `bytesN` slots.
//!
//! # Example usage
//! ```ignore
//! # // abiencode is not public.
//! # use serde::Serialize;
//! # use vector::abiencode::as_bytes;
//!
//! #[derive(Serialize, Debug)]
//! pub struct TransferState {
//!     #[serde(with = "as_bytes")]
//!     pub data: Vec<u8>,
//! }
//! ```

use super::ser::DYNAMIC_BYTES;
use serde::{Serialize, Serializer};

struct Bytes<'a>(&'a [u8]);

impl<'a> Serialize for Bytes<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(self.0)
    }
}

pub fn serialize<S>(v: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_newtype_struct(DYNAMIC_BYTES, &Bytes(v))
}
