//! Advisory "new version available" check.
//!
//! At most one request per interval; the result is cached in `update.json`.
//! Every failure is swallowed, nothing here may affect playback control.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::config::UpdateConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCache {
    /// Unix epoch seconds of the last successful check.
    pub last_checked: f64,
    pub latest_version: String,
}

impl UpdateCache {
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn is_fresh(&self, now: f64, interval: Duration) -> bool {
        now - self.last_checked < interval.as_secs_f64()
    }
}

fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// `major.minor.patch` comparison; missing parts count as zero.
pub fn is_newer(latest: &str, current: &str) -> bool {
    fn parts(v: &str) -> Option<[u64; 3]> {
        let mut out = [0u64; 3];
        for (slot, piece) in out.iter_mut().zip(v.trim().split('.')) {
            *slot = piece.parse().ok()?;
        }
        Some(out)
    }
    match (parts(latest), parts(current)) {
        (Some(l), Some(c)) => l > c,
        _ => false,
    }
}

/// Message to print when the cached latest version beats `current`.
pub fn update_notice(cache_path: &Path, current: &str) -> Option<String> {
    let cache = UpdateCache::load(cache_path)?;
    is_newer(&cache.latest_version, current).then(|| {
        format!(
            "[Update available: yit {}] Run `cargo install yit` to upgrade",
            cache.latest_version
        )
    })
}

/// Refresh the cache if it is older than the configured interval.
pub async fn check_for_updates(config: &UpdateConfig, cache_path: &Path) {
    if !config.enabled {
        return;
    }
    let now = now_epoch();
    let interval = Duration::from_secs(config.interval_secs);
    if UpdateCache::load(cache_path).is_some_and(|c| c.is_fresh(now, interval)) {
        return;
    }
    match fetch_latest(&config.check_url).await {
        Ok(latest) => {
            let cache = UpdateCache {
                last_checked: now,
                latest_version: latest,
            };
            if let Err(e) = cache.save(cache_path) {
                debug!("[update] could not write cache: {}", e);
            }
        }
        Err(e) => debug!("[update] check failed: {}", e),
    }
}

async fn fetch_latest(url: &str) -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .user_agent(concat!("yit/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let json: serde_json::Value = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let krate = &json["crate"];
    krate["max_stable_version"]
        .as_str()
        .or_else(|| krate["max_version"].as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("no version in response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_newer() {
        assert!(is_newer("0.2.0", "0.1.9"));
        assert!(is_newer("1.0", "0.9.9"));
        assert!(!is_newer("0.1.0", "0.1.0"));
        assert!(!is_newer("0.1.0", "0.2.0"));
        assert!(!is_newer("garbage", "0.1.0"));
    }

    #[test]
    fn test_freshness_window() {
        let cache = UpdateCache {
            last_checked: 1_000.0,
            latest_version: "0.1.0".into(),
        };
        let day = Duration::from_secs(86_400);
        assert!(cache.is_fresh(1_000.0 + 3_600.0, day));
        assert!(!cache.is_fresh(1_000.0 + 86_400.0, day));
    }

    #[test]
    fn test_notice_only_when_newer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.json");
        assert!(update_notice(&path, "0.1.0").is_none());

        UpdateCache {
            last_checked: 0.0,
            latest_version: "0.3.1".into(),
        }
        .save(&path)
        .unwrap();
        assert!(update_notice(&path, "0.1.0").unwrap().contains("0.3.1"));
        assert!(update_notice(&path, "0.3.1").is_none());
    }

    #[tokio::test]
    async fn test_disabled_check_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.json");
        let config = UpdateConfig {
            enabled: false,
            ..Default::default()
        };
        check_for_updates(&config, &path).await;
        assert!(!path.exists());
    }
}
