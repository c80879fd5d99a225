// src/bidding/catalog.rs

use std::sync::Arc;

use crate::bidder::richaudience::RichaudienceBidder;
use crate::bidder::sharethrough::SharethroughBidder;
use crate::bidding::requester::{BidderRequester, HttpBidderRequester};
use crate::config::{BidderConfig, ConfigError, ConfigManager};

pub const RICHAUDIENCE: &str = "richaudience";
pub const SHARETHROUGH: &str = "sharethrough";

/// 一个已注册的 bidder：名称、配置和调用入口
#[derive(Clone)]
pub struct BidderEntry {
    pub name: String,
    pub config: BidderConfig,
    pub requester: Arc<dyn BidderRequester>,
}

/// 启动时构建一次的 bidder 注册表，之后只读
#[derive(Clone, Default)]
pub struct BidderCatalog {
    entries: Vec<BidderEntry>,
}

impl BidderCatalog {
    pub fn new(entries: Vec<BidderEntry>) -> Self {
        Self { entries }
    }

    /// 按配置实例化所有启用的 bidder；未知名称或非法 endpoint 直接报错
    pub fn from_config(config: &ConfigManager) -> Result<Self, ConfigError> {
        let entries = config
            .enabled_bidders()
            .map(|(name, bidder)| {
                Ok(BidderEntry {
                    name: name.to_string(),
                    config: bidder.clone(),
                    requester: build_requester(name, &bidder.endpoint)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[BidderEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&BidderEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn build_requester(name: &str, endpoint: &str) -> Result<Arc<dyn BidderRequester>, ConfigError> {
    match name {
        RICHAUDIENCE => Ok(Arc::new(HttpBidderRequester::new(name, RichaudienceBidder::new(endpoint)?))),
        SHARETHROUGH => Ok(Arc::new(HttpBidderRequester::new(name, SharethroughBidder::new(endpoint)?))),
        other => Err(ConfigError::UnknownBidder(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::collections::BTreeMap;

    fn bidder(endpoint: &str, enabled: bool) -> BidderConfig {
        BidderConfig {
            enabled,
            endpoint: endpoint.to_string(),
            timeout_ms: None,
        }
    }

    fn manager(bidders: Vec<(&str, BidderConfig)>) -> ConfigManager {
        ConfigManager::new(AppConfig {
            default_timeout_ms: 1000,
            bidders: bidders
                .into_iter()
                .map(|(name, config)| (name.to_string(), config))
                .collect::<BTreeMap<_, _>>(),
        })
    }

    #[test]
    fn builds_enabled_bidders() {
        let config = manager(vec![
            (RICHAUDIENCE, bidder("http://ortb.richaudience.com/ortb/?bidder=pbs", true)),
            (SHARETHROUGH, bidder("http://btlr.sharethrough.com/FGMrCMMc/v1", false)),
        ]);
        let catalog = BidderCatalog::from_config(&config).unwrap();
        assert_eq!(catalog.len(), 1);
        let entry = catalog.get(RICHAUDIENCE).unwrap();
        assert_eq!(entry.requester.name(), RICHAUDIENCE);
        assert!(catalog.get(SHARETHROUGH).is_none());
    }

    #[test]
    fn unknown_bidder_is_rejected() {
        let config = manager(vec![("appnexus", bidder("http://ib.adnxs.com/openrtb2", true))]);
        let err = BidderCatalog::from_config(&config).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownBidder(name) if name == "appnexus"));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let config = manager(vec![(SHARETHROUGH, bidder("not a url", true))]);
        let err = BidderCatalog::from_config(&config).err().unwrap();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn disabled_unknown_bidders_are_ignored() {
        let config = manager(vec![("appnexus", bidder("http://ib.adnxs.com/openrtb2", false))]);
        assert!(BidderCatalog::from_config(&config).unwrap().is_empty());
    }
}
