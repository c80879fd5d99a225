use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;

use super::AppState;
use crate::bidding::run_auction;
use crate::openrtb::request::BidRequest;

/// 适配器默认请求已经过这一层校验
fn validate(request: &BidRequest) -> Result<(), &'static str> {
    if request.id.trim().is_empty() {
        return Err("request.id must be a non-empty string");
    }
    if request.imp.is_empty() {
        return Err("request.imp must contain at least 1 element");
    }
    Ok(())
}

/// **处理 OpenRTB 拍卖请求**
pub async fn handle_auction(State(state): State<Arc<AppState>>, Json(request): Json<BidRequest>) -> Response {
    if let Err(reason) = validate(&request) {
        info!(request_id = %request.id, reason, "rejected invalid auction request");
        return (StatusCode::BAD_REQUEST, format!("Invalid request: {}", reason)).into_response();
    }

    let response = run_auction(&request, &state.catalog, &state.config, &state.client).await;

    if response.bids().next().is_none() {
        // 204 - 无广告可填充
        return StatusCode::NO_CONTENT.into_response();
    }
    (StatusCode::OK, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::bidder::{BidType, NormalizedBid};
    use crate::bidding::{BidderCatalog, BidderEntry, BidderOutcome, BidderRequester};
    use crate::config::{AppConfig, BidderConfig, ConfigManager};
    use crate::openrtb::response::{Bid, BidResponse};
    use futures::future::{BoxFuture, FutureExt};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use tokio::net::TcpListener;
    use tokio::time::Duration;

    /// 每个 imp 出一个固定价格的 bid
    struct EchoRequester;

    impl BidderRequester for EchoRequester {
        fn name(&self) -> &str {
            "echo"
        }

        fn request_bids<'a>(
            &'a self,
            _client: &'a reqwest::Client,
            request: &'a BidRequest,
            _tmax: Duration,
        ) -> BoxFuture<'a, BidderOutcome> {
            async move {
                let bids = request
                    .imp
                    .iter()
                    .map(|imp| {
                        let bid = Bid {
                            id: format!("bid-{}", imp.id),
                            impid: imp.id.clone(),
                            price: 1.25,
                            adm: Some("<div></div>".into()),
                            ..Default::default()
                        };
                        NormalizedBid::new(bid, BidType::Banner, None)
                    })
                    .collect();
                BidderOutcome {
                    bidder: "echo".into(),
                    requests: 1,
                    bids,
                    ..Default::default()
                }
            }
            .boxed()
        }
    }

    async fn start_server() -> String {
        let catalog = BidderCatalog::new(vec![BidderEntry {
            name: "echo".into(),
            config: BidderConfig {
                enabled: true,
                endpoint: "http://echo.example/".into(),
                timeout_ms: None,
            },
            requester: Arc::new(EchoRequester),
        }]);
        let state = Arc::new(AppState {
            config: Arc::new(ConfigManager::new(AppConfig {
                default_timeout_ms: 500,
                bidders: BTreeMap::new(),
            })),
            catalog: Arc::new(catalog),
            client: reqwest::Client::new(),
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{}/openrtb2/auction", addr)
    }

    async fn post(body: Value) -> reqwest::Response {
        let url = start_server().await;
        reqwest::Client::new().post(url).json(&body).send().await.unwrap()
    }

    #[tokio::test]
    async fn returns_bids_from_configured_bidders() {
        let response = post(json!({
            "id": "req-1",
            "imp": [{"id": "imp-1", "banner": {"w": 300, "h": 250}, "ext": {"prebid": {"bidder": {"echo": {}}}}}]
        }))
        .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: BidResponse = response.json().await.unwrap();
        assert_eq!(body.id, "req-1");
        let bids: Vec<_> = body.bids().collect();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].impid, "imp-1");
        assert_eq!(bids[0].ext.as_ref().unwrap()["origbidcur"], "USD");
    }

    #[tokio::test]
    async fn no_bids_is_no_content() {
        let response = post(json!({
            "id": "req-1",
            "imp": [{"id": "imp-1", "banner": {"w": 300, "h": 250}, "ext": {"prebid": {"bidder": {"other": {}}}}}]
        }))
        .await;
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn invalid_request_is_bad_request() {
        let response = post(json!({"id": "req-1", "imp": []})).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = post(json!({"id": " ", "imp": [{"id": "imp-1"}]})).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn validation_messages() {
        let request = BidRequest {
            id: "req-1".into(),
            ..Default::default()
        };
        assert_eq!(validate(&request), Err("request.imp must contain at least 1 element"));
    }
}
