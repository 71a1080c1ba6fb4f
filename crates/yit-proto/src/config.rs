use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub update: UpdateConfig,
}

/// Startup flags for freshly spawned players and control-channel tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Explicit mpv path; discovered on PATH when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(default = "default_demuxer_bytes")]
    pub demuxer_max_bytes: String,
    #[serde(default = "default_demuxer_bytes")]
    pub demuxer_max_back_bytes: String,
    #[serde(default = "default_true")]
    pub prefetch_playlist: bool,
    /// Upper bound for one control-channel round trip (connect, write, read).
    #[serde(default = "default_ipc_timeout_ms")]
    pub ipc_timeout_ms: u64,
    /// A spawn lock older than this is considered abandoned.
    #[serde(default = "default_spawn_lock_ttl_secs")]
    pub spawn_lock_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Explicit yt-dlp path; discovered on PATH when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_check_url")]
    pub check_url: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            cache: default_true(),
            demuxer_max_bytes: default_demuxer_bytes(),
            demuxer_max_back_bytes: default_demuxer_bytes(),
            prefetch_playlist: default_true(),
            ipc_timeout_ms: default_ipc_timeout_ms(),
            spawn_lock_ttl_secs: default_spawn_lock_ttl_secs(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            binary: None,
            max_results: default_max_results(),
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            check_url: default_check_url(),
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_demuxer_bytes() -> String {
    "128M".to_string()
}

fn default_ipc_timeout_ms() -> u64 {
    3000
}

fn default_spawn_lock_ttl_secs() -> u64 {
    10
}

fn default_max_results() -> usize {
    5
}

fn default_check_url() -> String {
    "https://crates.io/api/v1/crates/yit".to_string()
}

fn default_interval_secs() -> u64 {
    86_400
}

impl PlayerConfig {
    pub fn ipc_timeout(&self) -> Duration {
        Duration::from_millis(self.ipc_timeout_ms)
    }

    pub fn spawn_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.spawn_lock_ttl_secs)
    }
}

impl Config {
    /// Load `config.toml`, writing the defaults on first run.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(config_path)?;
        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("config: {} is invalid, using defaults: {}", config_path.display(), e);
                Ok(Self::default())
            }
        }
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.player.cache);
        assert!(config.player.prefetch_playlist);
        assert_eq!(config.player.demuxer_max_bytes, "128M");
        assert_eq!(config.player.ipc_timeout(), Duration::from_secs(3));
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.update.interval_secs, 86_400);
        assert!(config.update.check_url.starts_with("https://"));
    }

    #[test]
    fn test_first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.search.max_results, 5);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[search]\nmax_results = 10\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.search.max_results, 10);
        assert_eq!(config.player.spawn_lock_ttl_secs, 10);
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert!(config.update.enabled);
    }
}
