//! Platform identifiers shared by the DBRP mapping crates.
//!
//! Organizations, buckets and DBRP mappings are all addressed by a 64-bit
//! identifier that is rendered as exactly sixteen hexadecimal digits. The
//! zero value is reserved to mean "unset".
use std::fmt::Display;
use std::str::FromStr;

mod generator;
mod serialize;

pub use generator::{IdGenerator, RandomIdGenerator, SequentialIdGenerator};

/// Number of characters in the text encoding of an identifier.
pub const ID_ENCODED_LEN: usize = 16;

/// Error returned when text cannot be decoded into an identifier.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum InvalidIdError {
    #[error("id must have a length of {ID_ENCODED_LEN}, got {0}")]
    Length(usize),

    #[error("id contains a non hexadecimal character: {0:?}")]
    NotHex(String),

    #[error("id must not be zero")]
    Zero,
}

fn decode(s: &str) -> Result<u64, InvalidIdError> {
    if s.len() != ID_ENCODED_LEN {
        return Err(InvalidIdError::Length(s.len()));
    }
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(InvalidIdError::NotHex(s.to_string()));
    }
    match u64::from_str_radix(s, 16) {
        Ok(0) => Err(InvalidIdError::Zero),
        Ok(v) => Ok(v),
        Err(_) => Err(InvalidIdError::NotHex(s.to_string())),
    }
}

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Default, Eq, PartialOrd, Ord, PartialEq, Hash)]
        pub struct $name(u64);

        impl $name {
            /// The unset value.
            pub const INVALID: Self = Self(0);

            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Whether this id has been assigned, i.e. is not zero.
            pub fn is_valid(&self) -> bool {
                self.0 != 0
            }

            pub fn as_u64(&self) -> u64 {
                self.0
            }

            /// Big-endian bytes, which sort in the same order as the id.
            pub fn to_be_bytes(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            pub fn from_be_bytes(bytes: [u8; 8]) -> Self {
                Self(u64::from_be_bytes(bytes))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = InvalidIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode(s).map(Self)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:016x}", self.0)
            }
        }
    };
}

platform_id!(
    /// Identifies the organization that owns buckets and mappings.
    OrgId
);

platform_id!(
    /// Identifies a bucket in the multi-tenant storage model.
    BucketId
);

platform_id!(
    /// Identifies a single database/retention-policy mapping.
    DbrpId
);
