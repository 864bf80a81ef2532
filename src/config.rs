use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{gateway::TokenSource, utils};

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Applies `EVENT_DRAFT_*` environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("EVENT_DRAFT_API_URL").filter(|s| !s.trim().is_empty()) {
            self.api_base_url = Some(url);
        }
        if let Some(token) = lookup("EVENT_DRAFT_TOKEN").filter(|s| !s.trim().is_empty()) {
            self.access_token = Some(token);
        }
        if let Some(secs) = lookup("EVENT_DRAFT_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            self.request_timeout_secs = Some(secs);
        }
    }

    pub fn base_url(&self) -> String {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        let data = read_config(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Current configuration including environment overrides.
    pub fn effective(&self) -> AppConfig {
        self.read().with_env_overrides()
    }

    pub fn read(&self) -> AppConfig {
        self.guard().clone()
    }

    pub fn update<F>(&self, transform: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self.guard();
        transform(&mut guard);
        write_config(&self.path, &guard)?;
        Ok(guard.clone())
    }

    fn guard(&self) -> MutexGuard<'_, AppConfig> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenSource for ConfigStore {
    fn bearer_token(&self) -> Option<String> {
        self.effective()
            .access_token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    utils::ensure_parent(path)?;
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::load_from(dir.path().join("config.json")).expect("load");
        let config = store.read();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.base_url(), "http://127.0.0.1:8080/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn update_writes_through_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        let store = ConfigStore::load_from(path.clone()).expect("load");
        store
            .update(|config| {
                config.api_base_url = Some("https://events.example.com/api/".into());
                config.access_token = Some("abc".into());
            })
            .expect("update");

        let reloaded = ConfigStore::load_from(path).expect("reload");
        let config = reloaded.read();
        assert_eq!(config.base_url(), "https://events.example.com/api");
        assert_eq!(config.access_token.as_deref(), Some("abc"));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            ConfigStore::load_from(path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = AppConfig {
            api_base_url: Some("http://file".into()),
            access_token: None,
            request_timeout_secs: Some(5),
        };
        config.apply_overrides(|key| match key {
            "EVENT_DRAFT_API_URL" => Some("http://env".into()),
            "EVENT_DRAFT_TOKEN" => Some("secret".into()),
            "EVENT_DRAFT_TIMEOUT_SECS" => Some("not-a-number".into()),
            _ => None,
        });
        assert_eq!(config.base_url(), "http://env");
        assert_eq!(config.access_token.as_deref(), Some("secret"));
        assert_eq!(config.request_timeout_secs, Some(5));
    }

    #[test]
    fn blank_token_is_not_sent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ConfigStore::load_from(dir.path().join("config.json")).expect("load");
        store
            .update(|config| config.access_token = Some("   ".into()))
            .expect("update");
        if std::env::var("EVENT_DRAFT_TOKEN").is_err() {
            assert_eq!(store.bearer_token(), None);
        }
    }
}
