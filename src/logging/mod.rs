// src/logging/mod.rs

pub mod auction_log;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// 初始化全局 tracing：
/// - JSON 日志按小时滚动写入 `log_dir/rust_hb.json`
/// - 同时输出可读格式到 stdout
///
/// 返回的 guard 必须在进程退出前一直持有，否则缓冲中的日志会丢失。
pub fn init(log_dir: &str) -> Result<WorkerGuard, tracing_subscriber::util::TryInitError> {
    let log_file = rolling::hourly(log_dir, "rust_hb.json");
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    Registry::default()
        .with(filter)
        .with(fmt::layer().json().with_writer(non_blocking))
        .with(fmt::layer().with_target(false))
        .try_init()?;
    Ok(guard)
}
