//! Error type and Return values used by the Serialization.

use serde::ser;
use thiserror::Error;

/// Represents all possible errors that can happen during Serialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The value contains a type that has no Solidity counterpart.
    ///
    /// Floating point numbers, options, maps and enums are rejected instead
    /// of being forced into some representation the contracts may not agree
    /// with. Map enums to integers by hand if they have to be hashed.
    #[error("type is not representable in abi encoding: {0}")]
    TypeNotRepresentable(&'static str),
    /// Representable in Solidity, but not implemented by this encoder.
    #[error("type is not yet implemented: {0}")]
    TypeNotYetSupported(&'static str),
    /// Raised by a `Serialize` implementation via [ser::Error::custom()].
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: core::fmt::Display,
    {
        Error::Custom(msg.to_string())
    }
}

/// Alias for `Result` using the [Error] returned by the Serializer.
pub type Result<T> = core::result::Result<T, Error>;
