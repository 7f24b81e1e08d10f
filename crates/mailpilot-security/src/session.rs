use crate::SecurityError;
use mailpilot_core::LoginSession;
use mailpilot_storage::SharedStore;

const LOGIN_TOKEN: &str = "login_token";
const USER_EMAIL: &str = "user_email";

/// Application login session, independent of the mail credential.
#[derive(Clone)]
pub struct LoginSessionStore {
    store: SharedStore,
}

impl LoginSessionStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn store(&self, session: &LoginSession) -> Result<(), SecurityError> {
        self.store.set(LOGIN_TOKEN, &session.login_token)?;
        self.store.set(USER_EMAIL, &session.user_email)?;
        tracing::info!(user = %session.user_email, "login session stored");
        Ok(())
    }

    pub fn get(&self) -> Result<Option<LoginSession>, SecurityError> {
        let Some(login_token) = self
            .store
            .get(LOGIN_TOKEN)?
            .filter(|token| !token.is_empty())
        else {
            return Ok(None);
        };

        Ok(Some(LoginSession {
            login_token,
            user_email: self.store.get(USER_EMAIL)?.unwrap_or_default(),
        }))
    }

    pub fn require(&self) -> Result<LoginSession, SecurityError> {
        self.get()?.ok_or_else(|| {
            SecurityError::Unauthenticated("Not logged in. Please log in again.".to_string())
        })
    }

    pub fn bearer(&self) -> Result<String, SecurityError> {
        Ok(self.require()?.login_token)
    }

    pub fn clear(&self) -> Result<(), SecurityError> {
        self.store.remove_all(&[LOGIN_TOKEN, USER_EMAIL])?;
        tracing::info!("login session cleared");
        Ok(())
    }
}
