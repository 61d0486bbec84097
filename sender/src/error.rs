use thiserror::Error;

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid sequence parameter: {0}")]
    Types(#[from] pulse_types::TypesError),

    #[error("confirmer error: {0}")]
    Confirmer(#[from] pulse_confirmer::ConfirmerError),
}
