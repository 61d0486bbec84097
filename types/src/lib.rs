//! Fundamental types for the tanglepulse workspace.
//!
//! This crate defines the core types shared across every other crate:
//! tryte strings, transaction and bundle hashes, attached transactions,
//! and the bundle container with tail extraction.

pub mod bundle;
pub mod error;
pub mod hash;
pub mod time;
pub mod transaction;
pub mod trytes;

pub use bundle::Bundle;
pub use error::TypesError;
pub use hash::{Address, BundleHash, TxHash, HASH_TRYTES_LEN};
pub use time::unix_now_ms;
pub use transaction::Transaction;
pub use trytes::{Tag, Trytes};
