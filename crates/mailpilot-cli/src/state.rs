use anyhow::Context;
use mailpilot_ai::{AiService, FallbackGenerator, HttpReplyEndpoint};
use mailpilot_config::{AppConfig, ConfigManager, StorageBackend};
use mailpilot_email::{
    AccountApi, AccountService, BackendClient, ComposeService, ConnectionManager, MailApi,
    MessageAggregator,
};
use mailpilot_security::{KeychainStore, LoginSessionStore, MailCredentialStore};
use mailpilot_storage::{FileStore, ListCache, MemoryStore, SharedStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub struct AppState {
    pub(crate) config_manager: ConfigManager,
    pub(crate) config: AppConfig,
    pub(crate) sessions: LoginSessionStore,
    pub(crate) accounts: AccountService,
    pub(crate) connection: ConnectionManager,
    pub(crate) inbox: MessageAggregator,
    pub(crate) compose: ComposeService,
    pub(crate) ai: AiService,
    pub(crate) mail: Arc<dyn MailApi>,
    pub(crate) compose_url: Url,
}

impl AppState {
    pub fn initialize(root: Option<&Path>) -> anyhow::Result<Self> {
        let config_manager = match root {
            Some(root) => ConfigManager::rooted_at(root),
            None => ConfigManager::new(),
        }
        .context("initialize config manager")?;
        let config = config_manager.load().context("load app config")?;

        let store = open_store(&config_manager, &config)?;
        let sessions = LoginSessionStore::new(store.clone());
        let credentials = MailCredentialStore::new(store.clone());

        let base_url = config.api.base_url().context("parse api base url")?;
        let timeout = Duration::from_secs(config.api.request_timeout_secs);
        let backend = Arc::new(
            BackendClient::new(
                base_url.clone(),
                timeout,
                sessions.clone(),
                credentials.clone(),
            )
            .context("build backend client")?,
        );
        let authorize_url = backend
            .authorize_url()
            .context("build authorization url")?;
        let mail: Arc<dyn MailApi> = backend.clone();
        let account_api: Arc<dyn AccountApi> = backend;

        let accounts = AccountService::new(account_api, sessions.clone(), credentials.clone());
        let connection = ConnectionManager::new(mail.clone(), credentials.clone(), authorize_url);

        let mut inbox = MessageAggregator::new(mail.clone(), credentials.clone())
            .with_fetch_limit(config.inbox.fetch_limit);
        if config.inbox.cache_last_list {
            inbox = inbox.with_cache(ListCache::new(store));
        }

        let endpoint = HttpReplyEndpoint::new(base_url, timeout).context("build ai endpoint")?;
        let ai = AiService::new(
            Arc::new(endpoint),
            sessions.clone(),
            credentials,
            FallbackGenerator::new(config.ai.signature.clone()),
            config.ai.min_reply_chars,
        );

        let compose_url = Url::parse(&config.api.compose_url).context("parse compose url")?;
        tracing::debug!(
            config = %config_manager.config_path().display(),
            backend = ?config.storage.backend,
            "app state ready"
        );

        Ok(Self {
            compose: ComposeService::new(mail.clone()),
            config_manager,
            config,
            sessions,
            accounts,
            connection,
            inbox,
            ai,
            mail,
            compose_url,
        })
    }
}

fn open_store(manager: &ConfigManager, config: &AppConfig) -> anyhow::Result<SharedStore> {
    let store: SharedStore = match config.storage.backend {
        StorageBackend::File => {
            let path = manager.data_dir().join(&config.storage.file_name);
            Arc::new(
                FileStore::open(&path)
                    .with_context(|| format!("open session store {}", path.display()))?,
            )
        }
        StorageBackend::Keychain => Arc::new(KeychainStore::new(
            config.storage.keychain_service.clone(),
            config.profile_name.clone(),
        )),
        StorageBackend::Memory => MemoryStore::shared(),
    };
    Ok(store)
}
