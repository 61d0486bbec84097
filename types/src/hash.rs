//! 81-tryte hash types: transaction hashes, bundle hashes, addresses.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;
use crate::trytes::Trytes;

/// Width of every tangle hash, in trytes.
pub const HASH_TRYTES_LEN: usize = 81;

macro_rules! hash_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Trytes);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Result<Self, TypesError> {
                let t = Trytes::new(raw)?;
                if t.len() != HASH_TRYTES_LEN {
                    return Err(TypesError::InvalidHashLength {
                        expected: HASH_TRYTES_LEN,
                        got: t.len(),
                    });
                }
                Ok(Self(t))
            }

            /// The null hash (all nines).
            pub fn all_nines() -> Self {
                Self(Trytes::nines(HASH_TRYTES_LEN))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            pub fn is_all_nines(&self) -> bool {
                self.0.as_str().bytes().all(|b| b == b'9')
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}\u{2026})", stringify!($name), &self.0.as_str()[..9])
            }
        }

        impl TryFrom<String> for $name {
            type Error = TypesError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(h: $name) -> Self {
                h.0.into()
            }
        }
    };
}

hash_type! {
    /// Hash of a single attached transaction.
    TxHash
}

hash_type! {
    /// Hash shared by every transaction of one bundle.
    BundleHash
}

hash_type! {
    /// A tangle address (81 trytes, checksum stripped).
    Address
}
