use mailpilot_storage::{KeyValueStore, StorageError};

/// Key-value store backed by the OS keychain, one entry per key.
#[derive(Debug, Clone)]
pub struct KeychainStore {
    service_name: String,
    namespace: String,
}

impl KeychainStore {
    pub fn new(service_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn username(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StorageError> {
        keyring::Entry::new(&self.service_name, &self.username(key)).map_err(backend_error)
    }
}

fn backend_error(err: keyring::Error) -> StorageError {
    StorageError::Backend(format!("keychain: {err}"))
}

impl KeyValueStore for KeychainStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(backend_error(err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value).map_err(backend_error)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(backend_error(err)),
        }
    }
}
