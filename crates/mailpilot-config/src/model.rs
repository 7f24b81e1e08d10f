use crate::ConfigError;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub version: u32,
    pub profile_name: String,
    pub api: ApiConfig,
    pub inbox: InboxConfig,
    pub ai: AiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Where replies are opened for sending.
    pub compose_url: String,
}

impl ApiConfig {
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let mut url = Url::parse(self.base_url.trim())?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "`{}` cannot be used as a base url",
                self.base_url
            )));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboxConfig {
    /// How many messages get their detail fetched per refresh.
    pub fetch_limit: usize,
    /// Rows per rendered page.
    pub page_size: usize,
    pub cache_last_list: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    /// AI replies at or below this many characters are replaced by a fallback.
    pub min_reply_chars: usize,
    pub signature: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    File,
    Keychain,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub file_name: String,
    pub keychain_service: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            file_name: "session.json".to_string(),
            keychain_service: "io.mailpilot.client".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            profile_name: "default".to_string(),
            api: ApiConfig {
                base_url: "https://email-agent-backendd.vercel.app".to_string(),
                request_timeout_secs: 30,
                compose_url: "https://mail.google.com/mail/".to_string(),
            },
            inbox: InboxConfig {
                fetch_limit: 10,
                page_size: 10,
                cache_last_list: true,
            },
            ai: AiConfig {
                min_reply_chars: 50,
                signature: "Best regards".to_string(),
            },
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api.base_url()?;
        Url::parse(&self.api.compose_url)?;
        if self.inbox.fetch_limit == 0 {
            return Err(ConfigError::Invalid(
                "inbox.fetch_limit must be at least 1".to_string(),
            ));
        }
        if self.inbox.page_size == 0 {
            return Err(ConfigError::Invalid(
                "inbox.page_size must be at least 1".to_string(),
            ));
        }
        if self.storage.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
