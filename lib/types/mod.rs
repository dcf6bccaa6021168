//! Identity and amount primitives shared across the ledger.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller identity. Equality against the stored authority address is the
/// entire access-control model; authentication happens upstream.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

#[derive(Debug, Error)]
#[error("failed to parse address: {reason}")]
pub struct AddressParseError {
    pub reason: String,
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|err| AddressParseError {
            reason: err.to_string(),
        })?;
        let bytes: [u8; 20] =
            bytes.try_into().map_err(|_| AddressParseError {
                reason: "expected 20 bytes".to_owned(),
            })?;
        Ok(Self(bytes))
    }
}

#[derive(Clone, Copy, Debug, Error)]
#[error("amount overflow")]
pub struct AmountOverflowError;

#[derive(Clone, Copy, Debug, Error)]
#[error("amount underflow")]
pub struct AmountUnderflowError;
