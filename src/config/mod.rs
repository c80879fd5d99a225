pub mod config_manager;

use thiserror::Error;

pub use config_manager::{AppConfig, BidderConfig, ConfigManager, ConfigSource, FileConfigSource};

/// 启动阶段的配置错误；出现即终止启动
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("unknown bidder `{0}`")]
    UnknownBidder(String),

    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
}
