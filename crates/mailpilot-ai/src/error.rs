use mailpilot_core::ErrorClass;
use mailpilot_security::SecurityError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid config: {0}")]
    Config(String),
}

impl AiError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Security(err) => err.class(),
            Self::Http(_) => ErrorClass::Transient,
            Self::Url(_) | Self::Config(_) => ErrorClass::Validation,
        }
    }
}
