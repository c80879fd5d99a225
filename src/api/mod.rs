pub mod handlers;

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::bidding::BidderCatalog;
use crate::config::ConfigManager;

/// 各请求共享的只读状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigManager>,
    pub catalog: Arc<BidderCatalog>,
    pub client: reqwest::Client,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/openrtb2/auction", post(handlers::handle_auction))
        .with_state(state)
}
