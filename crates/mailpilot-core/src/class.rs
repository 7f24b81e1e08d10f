use serde::{Deserialize, Serialize};

/// How a failure should be surfaced to the user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// No usable local credential; prompt for login or reconnect.
    Unauthenticated,
    /// The remote side rejected the credential; local copy must be dropped.
    Unauthorized,
    /// Server error or network failure. Retryable, credentials are kept.
    Transient,
    /// Missing form input or a response that does not match its schema.
    Validation,
    /// AI output replaced by locally generated content.
    DegradedContent,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Transient)
    }

    pub fn requires_reauth(self) -> bool {
        matches!(self, Self::Unauthenticated | Self::Unauthorized)
    }
}
