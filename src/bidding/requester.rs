// src/bidding/requester.rs

use futures::future::{join_all, BoxFuture, FutureExt};
use reqwest::Client;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::bidder::{AdapterError, Bidder, HttpMethod, HttpResponse, NormalizedBid, OutboundRequest};
use crate::openrtb::request::BidRequest;

/// 单个 bidder 一次拍卖的结果
#[derive(Debug, Clone, Default)]
pub struct BidderOutcome {
    pub bidder: String,
    pub requests: usize,
    pub bids: Vec<NormalizedBid>,
    pub errors: Vec<AdapterError>,
    pub elapsed_ms: u128,
}

/// 宿主侧对一个 bidder 的调用入口；屏蔽各适配器不同的 payload 类型
pub trait BidderRequester: Send + Sync {
    fn name(&self) -> &str;

    fn request_bids<'a>(
        &'a self,
        client: &'a Client,
        request: &'a BidRequest,
        tmax: Duration,
    ) -> BoxFuture<'a, BidderOutcome>;
}

/// 用 reqwest 把适配器产出的请求真正发出去
pub struct HttpBidderRequester<B> {
    name: String,
    bidder: B,
}

impl<B: Bidder> HttpBidderRequester<B> {
    pub fn new(name: &str, bidder: B) -> Self {
        Self {
            name: name.to_string(),
            bidder,
        }
    }

    async fn execute(
        &self,
        client: &Client,
        outbound: &OutboundRequest<B::Payload>,
        tmax: Duration,
    ) -> Result<HttpResponse, AdapterError> {
        let mut builder = match outbound.method {
            HttpMethod::Get => client.get(&outbound.uri),
            HttpMethod::Post => client.post(&outbound.uri).body(outbound.body.clone()),
        };
        for (name, value) in outbound.headers.iter() {
            builder = builder.header(name, value);
        }

        let call = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(HttpResponse { status, body })
        };

        match timeout(tmax, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(timeout_error(tmax)),
            Ok(Err(e)) => Err(AdapterError::Generic(e.to_string())),
            Err(_) => Err(timeout_error(tmax)),
        }
    }
}

fn timeout_error(tmax: Duration) -> AdapterError {
    AdapterError::Timeout(format!("Timeout exceeded after {}ms", tmax.as_millis()))
}

/// HTTP 状态码到错误的映射；`Ok(false)` 表示无竞价（204），`Ok(true)` 表示交给适配器解析
pub fn check_status(status: u16) -> Result<bool, AdapterError> {
    match status {
        200 => Ok(true),
        204 => Ok(false),
        400 => Err(AdapterError::bad_input(format!(
            "Unexpected status code: {}. Run with request.debug = 1 for more info",
            status
        ))),
        _ => Err(AdapterError::bad_server_response(format!(
            "Unexpected status code: {}. Run with request.debug = 1 for more info",
            status
        ))),
    }
}

impl<B: Bidder + 'static> BidderRequester for HttpBidderRequester<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn request_bids<'a>(
        &'a self,
        client: &'a Client,
        request: &'a BidRequest,
        tmax: Duration,
    ) -> BoxFuture<'a, BidderOutcome> {
        async move {
            let start = Instant::now();
            let prepared = self.bidder.prepare(request);
            let mut errors = prepared.errors;
            let outbound = prepared.values;

            // 同一个 bidder 的多个请求（例如 Sharethrough 按 imp 拆分）并发发送
            let responses = join_all(outbound.iter().map(|req| self.execute(client, req, tmax))).await;

            let mut bids = Vec::new();
            for (req, response) in outbound.iter().zip(responses) {
                debug!(bidder = %self.name, uri = %req.uri, ok = response.is_ok(), "bidder call finished");
                let response = match response {
                    Ok(response) => response,
                    Err(error) => {
                        errors.push(error);
                        continue;
                    }
                };
                match check_status(response.status) {
                    Ok(true) => {
                        let result = self.bidder.interpret(req, &response);
                        bids.extend(result.values);
                        errors.extend(result.errors);
                    }
                    Ok(false) => {}
                    Err(error) => errors.push(error),
                }
            }

            BidderOutcome {
                bidder: self.name.clone(),
                requests: outbound.len(),
                bids,
                errors,
                elapsed_ms: start.elapsed().as_millis(),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidder::richaudience::RichaudienceBidder;
    use crate::openrtb::request::{Banner, Device, Format, Imp, Site};
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    /// 本地 mock bidder：`/bid` 回显每个 imp 的竞价，`/empty` 返回 204，
    /// `/error` 返回 500，`/slow` 超时
    async fn start_mock_bidder() -> String {
        async fn bid(Json(request): Json<Value>) -> Json<Value> {
            let bids: Vec<Value> = request["imp"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|imp| json!({"id": format!("bid-{}", imp["id"].as_str().unwrap_or_default()), "impid": imp["id"], "price": 2.5}))
                .collect();
            Json(json!({"id": request["id"], "cur": "EUR", "seatbid": [{"bid": bids}]}))
        }

        let app = Router::new()
            .route("/bid", post(bid))
            .route("/empty", post(|| async { StatusCode::NO_CONTENT }))
            .route("/error", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/bad", post(|| async { StatusCode::BAD_REQUEST }))
            .route(
                "/slow",
                post(|| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    StatusCode::NO_CONTENT
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> BidRequest {
        BidRequest {
            id: "req-1".into(),
            imp: vec![Imp {
                id: "imp-1".into(),
                banner: Some(Banner {
                    format: Some(vec![Format::new(300, 250)]),
                    ..Default::default()
                }),
                ext: Some(json!({"bidder": {"pid": "abc"}})),
                ..Default::default()
            }],
            site: Some(Site {
                page: Some("https://pub.example/".into()),
                ..Default::default()
            }),
            device: Some(Device {
                ip: Some("1.2.3.4".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn run(path: &str, tmax: Duration) -> BidderOutcome {
        let base = start_mock_bidder().await;
        let requester = HttpBidderRequester::new(
            "richaudience",
            RichaudienceBidder::new(&format!("{}{}", base, path)).unwrap(),
        );
        let request = request();
        requester.request_bids(&Client::new(), &request, tmax).await
    }

    #[tokio::test]
    async fn round_trip_through_mock_bidder() {
        let outcome = run("/bid", Duration::from_secs(2)).await;
        assert_eq!(outcome.bidder, "richaudience");
        assert_eq!(outcome.requests, 1);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.bids.len(), 1);
        assert_eq!(outcome.bids[0].bid.impid, "imp-1");
        assert_eq!(outcome.bids[0].currency, "EUR");
    }

    #[tokio::test]
    async fn no_content_means_no_bids_and_no_errors() {
        let outcome = run("/empty", Duration::from_secs(2)).await;
        assert!(outcome.bids.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let outcome = run("/error", Duration::from_secs(2)).await;
        assert!(matches!(outcome.errors.as_slice(), [AdapterError::BadServerResponse(msg)] if msg.contains("500")));

        let outcome = run("/bad", Duration::from_secs(2)).await;
        assert!(matches!(outcome.errors.as_slice(), [AdapterError::BadInput(msg)] if msg.contains("400")));
    }

    #[tokio::test]
    async fn slow_bidder_times_out() {
        let outcome = run("/slow", Duration::from_millis(50)).await;
        assert!(outcome.bids.is_empty());
        assert!(matches!(outcome.errors.as_slice(), [AdapterError::Timeout(_)]));
    }

    #[tokio::test]
    async fn adapter_errors_skip_the_network() {
        let requester = HttpBidderRequester::new(
            "richaudience",
            RichaudienceBidder::new("http://127.0.0.1:9/unreachable").unwrap(),
        );
        let mut request = request();
        request.device = None;
        let outcome = requester.request_bids(&Client::new(), &request, Duration::from_secs(1)).await;
        assert_eq!(outcome.requests, 0);
        assert_eq!(outcome.errors, vec![AdapterError::bad_input("Device IP is required.")]);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(check_status(200), Ok(true));
        assert_eq!(check_status(204), Ok(false));
        assert!(matches!(check_status(400), Err(AdapterError::BadInput(_))));
        assert!(matches!(check_status(503), Err(AdapterError::BadServerResponse(_))));
    }
}
