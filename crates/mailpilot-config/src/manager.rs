use crate::{AppConfig, ConfigError};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

const ORG: &str = "io";
const AUTHOR: &str = "Mailpilot";
const APP: &str = "Mailpilot";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    data_dir: PathBuf,
    cache_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let dirs = ProjectDirs::from(ORG, AUTHOR, APP).ok_or(ConfigError::MissingDirectories)?;
        Self::with_dirs(
            dirs.config_dir().to_path_buf(),
            dirs.data_dir().to_path_buf(),
            dirs.cache_dir().to_path_buf(),
        )
    }

    /// Lays out config, data and cache directories under `root`.
    pub fn rooted_at(root: &Path) -> Result<Self, ConfigError> {
        Self::with_dirs(root.join("config"), root.join("data"), root.join("cache"))
    }

    fn with_dirs(
        config_dir: PathBuf,
        data_dir: PathBuf,
        cache_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        fs::create_dir_all(&config_dir)?;
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&cache_dir)?;

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            let initial = AppConfig::default();
            let content = toml::to_string_pretty(&initial)?;
            fs::write(&config_path, content)?;
            tracing::info!(path = %config_path.display(), "wrote default config");
        }

        Ok(Self {
            config_path,
            data_dir,
            cache_dir,
        })
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = fs::read_to_string(&self.config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content)?;
        Ok(())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_defaults_on_first_run_and_round_trips() {
        let root = tempfile::tempdir().expect("tempdir");
        let manager = ConfigManager::rooted_at(root.path()).expect("manager");
        assert!(manager.config_path().exists());

        let mut config = manager.load().expect("defaults load");
        assert_eq!(config, AppConfig::default());

        config.inbox.fetch_limit = 25;
        config.ai.signature = "Cheers,\nSam".to_string();
        manager.save(&config).expect("save");

        let reloaded = ConfigManager::rooted_at(root.path())
            .expect("manager")
            .load()
            .expect("reload");
        assert_eq!(reloaded.inbox.fetch_limit, 25);
        assert_eq!(reloaded.ai.signature, "Cheers,\nSam");
    }

    #[test]
    fn refuses_to_save_invalid_config() {
        let root = tempfile::tempdir().expect("tempdir");
        let manager = ConfigManager::rooted_at(root.path()).expect("manager");
        let mut config = AppConfig::default();
        config.api.base_url = "not a url".to_string();
        assert!(manager.save(&config).is_err());
    }
}
