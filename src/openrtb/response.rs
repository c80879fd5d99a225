use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 数组里的 null 元素直接丢弃（部分 bidder 会返回 `"seatbid": [null]`）
fn skip_null_items<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items: Option<Vec<Option<T>>> = Option::deserialize(deserializer)?;
    Ok(items.map(|items| items.into_iter().flatten().collect()))
}

/// OpenRTB Bid Response
///
/// `seatbid` 允许为 null 或缺失，bidder 的 204 风格空响应也能解析。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BidResponse {
    pub id: String,
    #[serde(default, deserialize_with = "skip_null_items", skip_serializing_if = "Option::is_none")]
    pub seatbid: Option<Vec<SeatBid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customdata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SeatBid {
    #[serde(default, deserialize_with = "skip_null_items", skip_serializing_if = "Option::is_none")]
    pub bid: Option<Vec<Bid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Bid {
    pub id: String,
    pub impid: String,
    #[serde(default)]
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>, // Ad markup (HTML or URL)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adomain: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    /// burl / lurl / mtype 等未建模字段，原样透传
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BidResponse {
    /// 依次展开所有 seatbid 下的 bid，跳过 null 的 seatbid / bid 列表
    pub fn bids(&self) -> impl Iterator<Item = &Bid> {
        self.seatbid
            .iter()
            .flatten()
            .filter_map(|seatbid| seatbid.bid.as_ref())
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_seatbids_and_bid_lists_are_skipped() {
        let body = r#"{"id":"r","cur":"EUR","seatbid":[null,{"bid":null},{"bid":[null,{"id":"b","impid":"1","price":0.5}]}]}"#;
        let response: BidResponse = serde_json::from_str(body).unwrap();
        let ids: Vec<&str> = response.bids().map(|bid| bid.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn unmodeled_bid_fields_survive_and_price_defaults_to_zero() {
        let body = r#"{"id":"r","seatbid":[{"bid":[{"id":"b","impid":"1","burl":"https://bill.example/b","mtype":1}]}]}"#;
        let response: BidResponse = serde_json::from_str(body).unwrap();
        let bid = response.bids().next().unwrap();
        assert_eq!(bid.price, 0.0);
        assert_eq!(bid.extra["burl"], "https://bill.example/b");

        let json = serde_json::to_value(bid).unwrap();
        assert_eq!(json["mtype"], 1);
    }

    #[test]
    fn missing_seatbid_has_no_bids() {
        let response: BidResponse = serde_json::from_str(r#"{"id":"r"}"#).unwrap();
        assert_eq!(response.bids().count(), 0);
    }
}
