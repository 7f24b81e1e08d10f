use crate::{ApiError, MailApi};
use mailpilot_core::{ConnectionStatus, MailProfile};
use mailpilot_security::{parse_callback, MailCredentialStore};
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCheck {
    pub status: ConnectionStatus,
    pub profile: Option<MailProfile>,
}

/// Lifecycle of the mail provider connection.
#[derive(Clone)]
pub struct ConnectionManager {
    api: Arc<dyn MailApi>,
    credentials: MailCredentialStore,
    authorize_url: Url,
}

impl ConnectionManager {
    pub fn new(api: Arc<dyn MailApi>, credentials: MailCredentialStore, authorize_url: Url) -> Self {
        Self {
            api,
            credentials,
            authorize_url,
        }
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Stores the credential carried by an authorization callback.
    ///
    /// Returns the callback URL with the consumed parameters removed, or
    /// `None` when the URL is not a callback.
    pub fn accept_callback(&self, callback_url: &Url) -> Result<Option<Url>, ApiError> {
        let Some(callback) = parse_callback(callback_url)? else {
            return Ok(None);
        };
        self.credentials.store_credential(&callback.credential)?;
        tracing::info!(
            mail_address = ?callback.credential.mail_address,
            "mail account connected"
        );
        Ok(Some(callback.stripped_url))
    }

    /// Verifies the stored credential against the profile endpoint.
    pub async fn check(&self) -> Result<ConnectionCheck, ApiError> {
        if !self.credentials.is_valid() {
            return Ok(ConnectionCheck {
                status: ConnectionStatus::Disconnected,
                profile: None,
            });
        }

        match self.api.profile().await {
            Ok(profile) => Ok(ConnectionCheck {
                status: ConnectionStatus::Connected,
                profile: Some(profile),
            }),
            Err(ApiError::Unauthorized(_)) => {
                self.credentials.clear()?;
                tracing::warn!("mail credential rejected during profile check");
                Ok(ConnectionCheck {
                    status: ConnectionStatus::Disconnected,
                    profile: None,
                })
            }
            Err(err) => Err(err),
        }
    }

    pub fn disconnect(&self) -> Result<(), ApiError> {
        self.credentials.clear()?;
        Ok(())
    }
}
