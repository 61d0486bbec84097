use thiserror::Error;

use pulse_types::TypesError;

#[derive(Debug, Error)]
pub enum ConfirmerError {
    #[error("bundle has no valid tail: {0}")]
    MalformedBundle(#[from] TypesError),

    #[error("a confirmation task is already running")]
    AlreadyRunning,
}
