// src/bidding/engine.rs

use futures::future::join_all;
use reqwest::Client;
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use tokio::time::{timeout, Duration};
use tracing::warn;

use crate::bidder::{AdapterError, NormalizedBid, DEFAULT_CURRENCY};
use crate::bidding::catalog::{BidderCatalog, BidderEntry};
use crate::bidding::requester::BidderOutcome;
use crate::config::ConfigManager;
use crate::logging::auction_log::AuctionLog;
use crate::openrtb::request::BidRequest;
use crate::openrtb::response::{Bid, BidResponse, SeatBid};

/// 为单个 bidder 裁剪请求：
/// - 只保留带该 bidder 参数的 imp（`imp.ext.prebid.bidder.<name>` 或旧式 `imp.ext.<name>`）
/// - imp.ext 改写成 `{"bidder": <params>}`
/// - `user.ext.prebid.buyeruids.<name>` 写入 `user.buyeruid`
///
/// 没有任何 imp 时返回 `None`，该 bidder 不参与本次拍卖。
pub fn request_for_bidder(request: &BidRequest, bidder: &str) -> Option<BidRequest> {
    let imp: Vec<_> = request
        .imp
        .iter()
        .filter_map(|imp| {
            let params = bidder_params(imp.ext.as_ref()?, bidder)?;
            let mut imp = imp.clone();
            imp.ext = Some(json!({ "bidder": params }));
            Some(imp)
        })
        .collect();
    if imp.is_empty() {
        return None;
    }

    let mut split = BidRequest {
        imp,
        ..request.clone()
    };
    if let Some(user) = split.user.as_mut() {
        let buyeruid = user
            .ext_user()
            .and_then(|ext| ext.prebid)
            .and_then(|prebid| prebid.buyeruids.get(bidder).cloned());
        if buyeruid.is_some() {
            user.buyeruid = buyeruid;
        }
    }
    Some(split)
}

fn bidder_params(ext: &Value, bidder: &str) -> Option<Value> {
    ext.get("prebid")
        .and_then(|prebid| prebid.get("bidder"))
        .and_then(|bidders| bidders.get(bidder))
        .or_else(|| ext.get(bidder))
        .cloned()
}

async fn call_bidder(entry: &BidderEntry, client: &Client, request: &BidRequest, tmax: Duration) -> BidderOutcome {
    match timeout(tmax, entry.requester.request_bids(client, request, tmax)).await {
        Ok(outcome) => outcome,
        Err(_) => BidderOutcome {
            bidder: entry.name.clone(),
            errors: vec![AdapterError::Timeout(format!(
                "Timeout exceeded after {}ms",
                tmax.as_millis()
            ))],
            elapsed_ms: tmax.as_millis(),
            ..Default::default()
        },
    }
}

/// 丢弃 impid 不在原始请求中的 bid，并记一条错误
fn take_valid_bids(outcome: &mut BidderOutcome, imp_ids: &HashSet<&str>, request_id: &str) -> Vec<Bid> {
    let mut bids = Vec::new();
    for normalized in std::mem::take(&mut outcome.bids) {
        if imp_ids.contains(normalized.bid.impid.as_str()) {
            bids.push(response_bid(normalized));
            continue;
        }
        warn!(
            request_id = %request_id,
            bidder = %outcome.bidder,
            bid_id = %normalized.bid.id,
            impid = %normalized.bid.impid,
            "dropping bid for unknown imp"
        );
        outcome.errors.push(AdapterError::bad_server_response(format!(
            "Bid \"{}\" has no corresponding imp \"{}\"",
            normalized.bid.id, normalized.bid.impid
        )));
    }
    bids
}

/// 在 bid.ext 上补充 `prebid.type` 与 `origbidcur`，保留 bidder 自带的其它字段
fn response_bid(normalized: NormalizedBid) -> Bid {
    let NormalizedBid {
        mut bid,
        bid_type,
        currency,
    } = normalized;
    let mut ext = match bid.ext.take() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    match ext.get_mut("prebid") {
        Some(Value::Object(prebid)) => {
            prebid.insert("type".to_string(), json!(bid_type));
        }
        _ => {
            ext.insert("prebid".to_string(), json!({ "type": bid_type }));
        }
    }
    ext.insert("origbidcur".to_string(), json!(currency));
    bid.ext = Some(Value::Object(ext));
    bid
}

fn error_list(errors: &[AdapterError]) -> Value {
    Value::Array(
        errors
            .iter()
            .map(|error| json!({ "code": error.code(), "message": error.to_string() }))
            .collect(),
    )
}

/// 处理一次拍卖：拆分请求、并发调用所有 bidder、汇总成一个 `BidResponse`
pub async fn run_auction(
    request: &BidRequest,
    catalog: &BidderCatalog,
    config: &ConfigManager,
    client: &Client,
) -> BidResponse {
    let calls: Vec<(&BidderEntry, BidRequest, Duration)> = catalog
        .entries()
        .iter()
        .filter_map(|entry| {
            let split = request_for_bidder(request, &entry.name)?;
            let tmax = config.bidder_timeout(&entry.config, request.tmax);
            Some((entry, split, tmax))
        })
        .collect();

    let outcomes = join_all(
        calls
            .iter()
            .map(|(entry, split, tmax)| call_bidder(entry, client, split, *tmax)),
    )
    .await;

    let imp_ids: HashSet<&str> = request.imp.iter().map(|imp| imp.id.as_str()).collect();
    let mut log = AuctionLog::new(&request.id, request.imp.len());
    let mut seatbids = Vec::new();
    let mut errors = Map::new();

    for ((entry, _, tmax), mut outcome) in calls.iter().zip(outcomes) {
        let bids = take_valid_bids(&mut outcome, &imp_ids, &request.id);
        log.add_bidder_call(&outcome, bids.len(), tmax.as_millis());

        if !outcome.errors.is_empty() {
            errors.insert(entry.name.clone(), error_list(&outcome.errors));
        }
        if !bids.is_empty() {
            seatbids.push(SeatBid {
                bid: Some(bids),
                seat: Some(entry.name.clone()),
                group: Some(0),
            });
        }
    }
    log.emit();

    BidResponse {
        id: request.id.clone(),
        seatbid: Some(seatbids),
        cur: Some(DEFAULT_CURRENCY.to_string()),
        ext: (!errors.is_empty()).then(|| json!({ "errors": errors })),
        ..Default::default()
    }
}
