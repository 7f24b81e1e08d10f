use crate::{AccountApi, ApiError, Registration};
use mailpilot_core::LoginSession;
use mailpilot_security::{LoginSessionStore, MailCredentialStore};
use std::sync::Arc;

fn require(value: &str, message: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::Validation(message.to_string()))
    } else {
        Ok(())
    }
}

/// Application account actions and the local session they maintain.
#[derive(Clone)]
pub struct AccountService {
    api: Arc<dyn AccountApi>,
    sessions: LoginSessionStore,
    credentials: MailCredentialStore,
}

impl AccountService {
    pub fn new(
        api: Arc<dyn AccountApi>,
        sessions: LoginSessionStore,
        credentials: MailCredentialStore,
    ) -> Self {
        Self {
            api,
            sessions,
            credentials,
        }
    }

    pub fn session(&self) -> Result<Option<LoginSession>, ApiError> {
        Ok(self.sessions.get()?)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginSession, ApiError> {
        require(email, "Please enter your email")?;
        require(password, "Please enter your password")?;

        let login_token = self.api.login(email.trim(), password).await?;
        let session = LoginSession {
            login_token,
            user_email: email.trim().to_string(),
        };
        self.sessions.store(&session)?;
        Ok(session)
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Registration, ApiError> {
        require(email, "Please enter your email")?;
        require(password, "Please enter your password")?;
        self.api.register(email.trim(), password).await
    }

    pub async fn verify(&self, token: &str) -> Result<String, ApiError> {
        require(token, "Please enter the verification token")?;
        self.api.verify_email(token.trim()).await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<String, ApiError> {
        require(email, "Please enter your email")?;
        self.api.resend_verification(email.trim()).await
    }

    /// Drops the login session together with the mail credential.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.sessions.clear()?;
        self.credentials.clear()?;
        Ok(())
    }

    /// Revokes the backend's stored mail tokens; the local copy goes too.
    pub async fn reset_mail_tokens(&self) -> Result<(), ApiError> {
        let session = self.sessions.require()?;
        self.api.reset_mail_tokens(&session.user_email).await?;
        self.credentials.clear()?;
        tracing::info!(user = %session.user_email, "mail tokens reset");
        Ok(())
    }

    /// `confirmation` must repeat the logged-in email address.
    pub async fn delete_account(&self, confirmation: &str) -> Result<(), ApiError> {
        let session = self.sessions.require()?;
        if confirmation.trim() != session.user_email {
            return Err(ApiError::Validation(
                "Please enter your email address to confirm deletion".to_string(),
            ));
        }

        self.api.delete_user(&session.user_email).await?;
        self.sessions.clear()?;
        self.credentials.clear()?;
        tracing::info!(user = %session.user_email, "account deleted");
        Ok(())
    }
}
