// src/config/config_manager.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use super::ConfigError;

fn default_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    1000
}

/// 单个 bidder 的配置
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BidderConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub endpoint: String,
    /// 每个 bidder 的超时（毫秒），缺省时使用请求的 tmax
    pub timeout_ms: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// 请求没有 tmax、bidder 也没配超时时使用
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub bidders: BTreeMap<String, BidderConfig>,
}

/// 配置来源；目前只有文件实现
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<AppConfig, ConfigError>;
}

pub struct FileConfigSource {
    pub path: String,
}

impl FileConfigSource {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Clone, Debug)]
pub struct ConfigManager {
    config: AppConfig,
}

impl ConfigManager {
    pub fn new(config: AppConfig) -> Self {
        ConfigManager { config }
    }

    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        Ok(ConfigManager::new(source.load()?))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 所有启用的 bidder（按名称排序）
    pub fn enabled_bidders(&self) -> impl Iterator<Item = (&str, &BidderConfig)> {
        self.config
            .bidders
            .iter()
            .filter(|(_, bidder)| bidder.enabled)
            .map(|(name, bidder)| (name.as_str(), bidder))
    }

    /// bidder 超时：bidder 配置 > 请求 tmax > 全局默认
    pub fn bidder_timeout(&self, bidder: &BidderConfig, tmax: Option<u64>) -> Duration {
        let millis = bidder
            .timeout_ms
            .or(tmax.filter(|tmax| *tmax > 0))
            .unwrap_or(self.config.default_timeout_ms);
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticConfigSource(&'static str);

    impl ConfigSource for StaticConfigSource {
        fn load(&self) -> Result<AppConfig, ConfigError> {
            Ok(serde_json::from_str(self.0)?)
        }
    }

    const CONFIG: &str = r#"{
        "default_timeout_ms": 500,
        "bidders": {
            "sharethrough": {"endpoint": "https://btlr.sharethrough.com/FGMrCMMc/v1", "timeout_ms": 300},
            "richaudience": {"enabled": false, "endpoint": "http://ortb.richaudience.com/ortb/?bidder=pbs"}
        }
    }"#;

    #[test]
    fn loads_and_filters_enabled_bidders() {
        let manager = ConfigManager::from_source(&StaticConfigSource(CONFIG)).unwrap();
        let enabled: Vec<&str> = manager.enabled_bidders().map(|(name, _)| name).collect();
        assert_eq!(enabled, vec!["sharethrough"]);
    }

    #[test]
    fn timeout_precedence() {
        let manager = ConfigManager::from_source(&StaticConfigSource(CONFIG)).unwrap();
        let sharethrough = &manager.config().bidders["sharethrough"];
        let richaudience = &manager.config().bidders["richaudience"];
        assert_eq!(manager.bidder_timeout(sharethrough, Some(800)), Duration::from_millis(300));
        assert_eq!(manager.bidder_timeout(richaudience, Some(800)), Duration::from_millis(800));
        assert_eq!(manager.bidder_timeout(richaudience, None), Duration::from_millis(500));
        assert_eq!(manager.bidder_timeout(richaudience, Some(0)), Duration::from_millis(500));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = FileConfigSource::new("/nonexistent/bidders.json").load().unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = ConfigManager::from_source(&StaticConfigSource("{not json")).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }
}
