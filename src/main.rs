// src/main.rs

use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use rust_hb::api::{self, AppState};
use rust_hb::bidding::BidderCatalog;
use rust_hb::config::{ConfigManager, FileConfigSource};
use rust_hb::logging;

#[derive(Parser, Debug)]
#[command(version, about = "OpenRTB header bidding proxy")]
struct CliArgs {
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
    #[arg(long, default_value = "logs")]
    log_dir: String,
    #[arg(long, default_value = "static/bidders.json")]
    config: String,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // 初始化全局 tracing 日志；guard 需要活到进程结束
    let _guard = logging::init(&args.log_dir).expect("Unable to set global tracing subscriber");

    // 读取 bidder 配置并实例化所有启用的适配器
    let config = ConfigManager::from_source(&FileConfigSource::new(&args.config))
        .unwrap_or_else(|e| panic!("Unable to load {}: {}", args.config, e));
    let catalog = BidderCatalog::from_config(&config).unwrap_or_else(|e| panic!("Invalid bidder config: {}", e));
    info!(
        bidders = ?catalog.entries().iter().map(|entry| entry.name.as_str()).collect::<Vec<_>>(),
        "bidder catalog ready"
    );

    let state = Arc::new(AppState {
        config: Arc::new(config),
        catalog: Arc::new(catalog),
        client: reqwest::Client::new(),
    });

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Unable to bind {}: {}", addr, e));
    info!("header bidding server running at http://{}", addr);

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", e);
        }
        info!("Shutting down gracefully...");
    };
    if let Err(e) = axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!("server error: {}", e);
    }
    info!("header bidding server shut down.");
}
