use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("gateway {endpoint} rejected the request: {reason}")]
    Rejected { endpoint: String, reason: String },

    #[error("gateway {endpoint} is unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("invalid response from gateway {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("gateway {endpoint}: too many consecutive failures")]
    TooManyErrors { endpoint: String },
}

impl GatewayError {
    /// The endpoint the failing call originated from.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Rejected { endpoint, .. }
            | Self::Unreachable { endpoint, .. }
            | Self::InvalidResponse { endpoint, .. }
            | Self::TooManyErrors { endpoint } => endpoint,
        }
    }
}
