use mailpilot_core::ErrorClass;
use mailpilot_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("{0}")]
    Unauthenticated(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("mail connection rejected: {0}")]
    Rejected(String),
    #[error("incomplete oauth callback: {0}")]
    IncompleteCallback(String),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl SecurityError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Unauthenticated(_) | Self::Rejected(_) => ErrorClass::Unauthenticated,
            Self::Storage(_) => ErrorClass::Transient,
            Self::IncompleteCallback(_) | Self::Url(_) | Self::Header(_) => ErrorClass::Validation,
        }
    }
}
