// src/logging/auction_log.rs

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bidding::requester::BidderOutcome;

/// **一次拍卖的聚合日志**
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuctionLog {
    pub timestamp: String,        // 记录时间
    pub log_type: String,         // 固定为 "auction"
    pub request_id: String,       // OpenRTB `BidRequest.id`
    pub imp_count: usize,         // 请求中的 imp 数
    pub status: String,           // "success" / "no_bids"
    pub bid_count: usize,         // 最终返回的 bid 数
    pub bidder_calls: Vec<BidderCallLog>,
}

/// **单个 bidder 的调用日志**
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BidderCallLog {
    pub bidder: String,
    pub requests: usize,          // 发往该 bidder 的 HTTP 请求数
    pub bids: usize,              // 通过校验的 bid 数
    pub timeout_ms: u128,
    pub elapsed_ms: u128,
    pub errors: Vec<String>,
}

impl AuctionLog {
    pub fn new(request_id: &str, imp_count: usize) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            log_type: "auction".to_string(),
            request_id: request_id.to_string(),
            imp_count,
            status: "no_bids".to_string(),
            bid_count: 0,
            bidder_calls: Vec::new(),
        }
    }

    /// `accepted` 为该 bidder 通过 impid 校验后保留的 bid 数
    pub fn add_bidder_call(&mut self, outcome: &BidderOutcome, accepted: usize, timeout_ms: u128) {
        self.bidder_calls.push(BidderCallLog {
            bidder: outcome.bidder.clone(),
            requests: outcome.requests,
            bids: accepted,
            timeout_ms,
            elapsed_ms: outcome.elapsed_ms,
            errors: outcome.errors.iter().map(ToString::to_string).collect(),
        });
        self.bid_count += accepted;
        if self.bid_count > 0 {
            self.status = "success".to_string();
        }
    }

    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(line) => info!(target: "auction", auction = %line),
            Err(e) => info!(target: "auction", request_id = %self.request_id, "unable to serialize auction log: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidder::AdapterError;

    #[test]
    fn tracks_status_and_counts() {
        let mut log = AuctionLog::new("req-1", 2);
        assert_eq!(log.status, "no_bids");

        let failed = BidderOutcome {
            bidder: "richaudience".into(),
            requests: 1,
            errors: vec![AdapterError::bad_input("Device IP is required.")],
            ..Default::default()
        };
        log.add_bidder_call(&failed, 0, 1000);
        assert_eq!(log.status, "no_bids");
        assert_eq!(log.bidder_calls[0].errors, vec!["Device IP is required.".to_string()]);

        let ok = BidderOutcome {
            bidder: "sharethrough".into(),
            requests: 2,
            ..Default::default()
        };
        log.add_bidder_call(&ok, 2, 800);
        assert_eq!(log.status, "success");
        assert_eq!(log.bid_count, 2);

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["log_type"], "auction");
        assert_eq!(json["bidder_calls"][1]["timeout_ms"], 800);
    }
}
