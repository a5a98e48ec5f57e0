use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LifelockError;
use crate::sync::{RetryPolicy, SyncConfig};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub user_id: String,
    pub device: String,
    pub backup_slots: usize,
    pub save_quorum: usize,
    pub autosave_secs: u64,
    pub debounce_ms: u64,
    pub retry: RetryConfig,
    pub recovery_keywords: Vec<String>,
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".lifelock"),
            user_id: "local".to_string(),
            device: "mobile".to_string(),
            backup_slots: 3,
            save_quorum: 3,
            autosave_secs: 10,
            debounce_ms: 2000,
            retry: RetryConfig::default(),
            recovery_keywords: ["task", "lifelock", "focus", "life"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            remote: RemoteConfig::default(),
        }
    }
}

impl Config {
    /// Resolve the data directory, read `config.json` if present, then apply
    /// environment overrides. `.env` in the working directory is honoured.
    pub fn load() -> Result<Self, LifelockError> {
        let mut config = Self::read(&Self::resolve_data_dir()?)?;
        config.apply_overrides(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// `$LIFELOCK_HOME`, or `.lifelock` under the working directory.
    pub fn resolve_data_dir() -> Result<PathBuf, LifelockError> {
        dotenvy::dotenv().ok();
        match env::var("LIFELOCK_HOME") {
            Ok(dir) if !dir.trim().is_empty() => Ok(PathBuf::from(dir)),
            _ => Ok(env::current_dir()?.join(".lifelock")),
        }
    }

    /// File settings for `data_dir`, or defaults when no file exists yet.
    pub fn read(data_dir: &Path) -> Result<Self, LifelockError> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str::<Config>(&raw).map_err(|e| {
                LifelockError::config(format!("Invalid {}: {e}", path.display()))
            })?
        } else {
            Config::default()
        };
        config.data_dir = data_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn write(&self) -> Result<PathBuf, LifelockError> {
        fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(CONFIG_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn apply_overrides<F>(&mut self, get: F) -> Result<(), LifelockError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| get(name).filter(|v| !v.trim().is_empty());
        if let Some(user) = get("LIFELOCK_USER") {
            self.user_id = user;
        }
        if let Some(device) = get("LIFELOCK_DEVICE") {
            self.device = device;
        }
        if let Some(ms) = get("LIFELOCK_DEBOUNCE_MS") {
            self.debounce_ms = ms.trim().parse().map_err(|_| {
                LifelockError::config(format!("LIFELOCK_DEBOUNCE_MS must be an integer, got '{ms}'"))
            })?;
        }
        if let Some(url) = get("LIFELOCK_REMOTE_URL") {
            self.remote.url = Some(url);
        }
        if let Some(key) = get("LIFELOCK_REMOTE_KEY") {
            self.remote.api_key = Some(key);
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), LifelockError> {
        if self.user_id.trim().is_empty() {
            return Err(LifelockError::config("user_id must not be empty"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(LifelockError::config("retry.base_delay_ms exceeds retry.max_delay_ms"));
        }
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
            },
        }
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_secs.max(1))
    }

    pub fn is_initialized(&self) -> bool {
        crate::db::db_path(&self.data_dir).exists()
    }
}
