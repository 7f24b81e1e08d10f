use mailpilot_core::ErrorClass;
use mailpilot_security::SecurityError;
use mailpilot_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// The backend rejected the mail credential (HTTP 401).
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Server(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("{0}")]
    Validation(String),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl ApiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Security(err) => err.class(),
            Self::Unauthorized(_) => ErrorClass::Unauthorized,
            Self::Storage(_) | Self::Server(_) | Self::Network(_) => ErrorClass::Transient,
            Self::Rejected { status, .. } if *status >= 500 => ErrorClass::Transient,
            Self::Rejected { .. } | Self::Decode(_) | Self::Validation(_) | Self::Url(_) => {
                ErrorClass::Validation
            }
        }
    }
}
