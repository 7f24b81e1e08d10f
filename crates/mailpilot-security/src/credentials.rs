use crate::SecurityError;
use chrono::{DateTime, Utc};
use mailpilot_core::{CredentialUpdate, MailCredential};
use mailpilot_storage::SharedStore;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

const ACCESS_TOKEN: &str = "mail_access_token";
const REFRESH_TOKEN: &str = "mail_refresh_token";
const TOKEN_EXPIRY: &str = "mail_token_expiry";
const MAIL_ADDRESS: &str = "mail_address";

const ALL_KEYS: [&str; 4] = [ACCESS_TOKEN, REFRESH_TOKEN, TOKEN_EXPIRY, MAIL_ADDRESS];

/// Token store for the mail-provider credential.
///
/// Backed by an injected key-value store, so every clone (and any other
/// consumer of the same store) sees mutations as soon as they return.
#[derive(Clone)]
pub struct MailCredentialStore {
    store: SharedStore,
}

impl MailCredentialStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Writes each present, non-empty field; everything else is left as is.
    pub fn store_credential(&self, update: &CredentialUpdate) -> Result<(), SecurityError> {
        let fields = [
            (ACCESS_TOKEN, &update.access_token),
            (REFRESH_TOKEN, &update.refresh_token),
            (TOKEN_EXPIRY, &update.expiry),
            (MAIL_ADDRESS, &update.mail_address),
        ];

        for (key, value) in fields {
            if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
                self.store.set(key, value)?;
            }
        }

        tracing::debug!(?update, "stored mail credential fields");
        Ok(())
    }

    pub fn get_credential(&self) -> Result<Option<MailCredential>, SecurityError> {
        let Some(access_token) = self
            .store
            .get(ACCESS_TOKEN)?
            .filter(|token| !token.is_empty())
        else {
            return Ok(None);
        };

        Ok(Some(MailCredential {
            access_token,
            refresh_token: self.store.get(REFRESH_TOKEN)?,
            expiry: self.store.get(TOKEN_EXPIRY)?,
            mail_address: self.store.get(MAIL_ADDRESS)?,
        }))
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// A read failure counts as "no usable credential".
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.get_credential() {
            Ok(Some(credential)) => {
                if credential.expiry.is_some() && credential.expires_at().is_none() {
                    tracing::warn!(
                        expiry = ?credential.expiry,
                        "unreadable mail token expiry; treating as unknown"
                    );
                }
                credential.is_valid_at(now)
            }
            Ok(None) => false,
            Err(err) => {
                tracing::warn!("failed to read mail credential: {err}");
                false
            }
        }
    }

    pub fn clear(&self) -> Result<(), SecurityError> {
        self.store.remove_all(&ALL_KEYS)?;
        tracing::info!("cleared mail credential");
        Ok(())
    }

    /// Access token that is present and not known to be expired.
    pub fn access_token(&self) -> Result<String, SecurityError> {
        self.access_token_at(Utc::now())
    }

    pub fn access_token_at(&self, now: DateTime<Utc>) -> Result<String, SecurityError> {
        let credential = self.get_credential()?.ok_or_else(|| {
            SecurityError::Unauthenticated(
                "No mail credential found. Please reconnect your mail account.".to_string(),
            )
        })?;

        if !credential.is_valid_at(now) {
            return Err(SecurityError::Unauthenticated(
                "Mail token has expired. Please reconnect to refresh.".to_string(),
            ));
        }

        Ok(credential.access_token)
    }

    pub fn auth_headers(&self) -> Result<HeaderMap, SecurityError> {
        self.auth_headers_at(Utc::now())
    }

    pub fn auth_headers_at(&self, now: DateTime<Utc>) -> Result<HeaderMap, SecurityError> {
        let token = self.access_token_at(now)?;

        let mut bearer = HeaderValue::from_str(&format!("Bearer {token}"))?;
        bearer.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mailpilot_storage::{KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn token_store() -> (Arc<MemoryStore>, MailCredentialStore) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), MailCredentialStore::new(store))
    }

    fn update(token: &str, expiry: Option<String>) -> CredentialUpdate {
        CredentialUpdate {
            access_token: Some(token.to_string()),
            expiry,
            ..CredentialUpdate::default()
        }
    }

    #[test]
    fn empty_store_is_not_valid_and_refuses_headers() {
        let (_, tokens) = token_store();
        assert_eq!(tokens.get_credential().unwrap(), None);
        assert!(!tokens.is_valid());
        assert!(matches!(
            tokens.auth_headers(),
            Err(SecurityError::Unauthenticated(_))
        ));
    }

    #[test]
    fn past_expiry_invalidates_credential() {
        let (_, tokens) = token_store();
        let past = (Utc::now() - Duration::seconds(1)).to_rfc3339();
        tokens.store_credential(&update("ya29.old", Some(past))).unwrap();

        assert!(tokens.get_credential().unwrap().is_some());
        assert!(!tokens.is_valid());
        let err = tokens.auth_headers().unwrap_err();
        assert!(matches!(err, SecurityError::Unauthenticated(_)));
        assert_eq!(err.class(), mailpilot_core::ErrorClass::Unauthenticated);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let (_, tokens) = token_store();
        let expiry = Utc::now() + Duration::minutes(10);
        tokens
            .store_credential(&update("ya29.edge", Some(expiry.to_rfc3339())))
            .unwrap();

        assert!(tokens.is_valid_at(expiry - Duration::seconds(1)));
        assert!(!tokens.is_valid_at(expiry));
    }

    #[test]
    fn missing_expiry_is_permissive() {
        let (_, tokens) = token_store();
        tokens.store_credential(&update("ya29.forever", None)).unwrap();

        assert!(tokens.is_valid());
        let headers = tokens.auth_headers().expect("headers");
        assert_eq!(headers[AUTHORIZATION], "Bearer ya29.forever");
        assert_eq!(headers[ACCEPT], "application/json");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn partial_updates_leave_other_fields_alone() {
        let (_, tokens) = token_store();
        tokens
            .store_credential(&CredentialUpdate {
                access_token: Some("first".to_string()),
                refresh_token: Some("refresh".to_string()),
                mail_address: Some("me@gmail.com".to_string()),
                expiry: None,
            })
            .unwrap();

        tokens
            .store_credential(&CredentialUpdate {
                access_token: Some("second".to_string()),
                refresh_token: Some(String::new()),
                ..CredentialUpdate::default()
            })
            .unwrap();

        let credential = tokens.get_credential().unwrap().expect("credential");
        assert_eq!(credential.access_token, "second");
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(credential.mail_address.as_deref(), Some("me@gmail.com"));
    }

    #[test]
    fn fields_without_access_token_read_as_absent() {
        let (_, tokens) = token_store();
        tokens
            .store_credential(&CredentialUpdate {
                refresh_token: Some("refresh".to_string()),
                ..CredentialUpdate::default()
            })
            .unwrap();
        assert_eq!(tokens.get_credential().unwrap(), None);
    }

    #[test]
    fn clear_is_visible_to_every_consumer() {
        let (store, tokens) = token_store();
        let other = MailCredentialStore::new(store.clone());
        tokens.store_credential(&update("ya29.shared", None)).unwrap();
        assert!(other.is_valid());

        other.clear().unwrap();
        assert!(!tokens.is_valid());
        for key in ALL_KEYS {
            assert_eq!(store.get(key).unwrap(), None);
        }
    }
}
