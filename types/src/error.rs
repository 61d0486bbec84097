use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid tryte character '{0}'")]
    InvalidTryte(char),

    #[error("invalid hash length: expected {expected} trytes, got {got}")]
    InvalidHashLength { expected: usize, got: usize },

    #[error("tag longer than {max} trytes: {got}")]
    TagTooLong { max: usize, got: usize },

    #[error("bundle is empty")]
    EmptyBundle,

    #[error("bundle has no tail transaction (no transaction with index 0)")]
    MissingTail,

    #[error("transaction at index {0} carries a different bundle hash")]
    MixedBundleHashes(u64),
}
