// src/bidder/mod.rs

//! Bidder 适配器契约。
//!
//! 每个适配器都是一对纯函数：
//! - `prepare`：`BidRequest` → 若干出站 HTTP 描述 + 错误列表
//! - `interpret`：出站描述 + bidder 的 HTTP 响应 → 归一化的 bid + 错误列表
//!
//! 适配器本身不做 IO，也不持有可变状态；真正发请求的是 `bidding::requester`。

pub mod http_util;
pub mod request_util;
pub mod richaudience;
pub mod sharethrough;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::openrtb::request::BidRequest;
use crate::openrtb::response::Bid;

/// 适配器错误。错误不会中断整批处理，而是和部分结果一起返回。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// 调用方请求不合法（缺字段、imp.ext 无法解析等）
    #[error("{0}")]
    BadInput(String),
    /// bidder 返回了无法解析的响应或空的创意
    #[error("{0}")]
    BadServerResponse(String),
    /// 宿主侧：bidder 超时
    #[error("{0}")]
    Timeout(String),
    /// 宿主侧：网络等其它失败
    #[error("{0}")]
    Generic(String),
}

impl AdapterError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        AdapterError::BadInput(message.into())
    }

    pub fn bad_server_response(message: impl Into<String>) -> Self {
        AdapterError::BadServerResponse(message.into())
    }

    /// 拍卖响应 `ext.errors` 中使用的数字错误码
    pub fn code(&self) -> i32 {
        match self {
            AdapterError::Timeout(_) => 1,
            AdapterError::BadInput(_) => 2,
            AdapterError::BadServerResponse(_) => 3,
            AdapterError::Generic(_) => 999,
        }
    }
}

/// 适配器的返回值：结果列表和错误列表并存
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterResult<T> {
    pub values: Vec<T>,
    pub errors: Vec<AdapterError>,
}

impl<T> AdapterResult<T> {
    pub fn of(values: Vec<T>, errors: Vec<AdapterError>) -> Self {
        Self { values, errors }
    }

    pub fn with_values(values: Vec<T>) -> Self {
        Self::of(values, Vec::new())
    }

    pub fn with_value(value: T) -> Self {
        Self::with_values(vec![value])
    }

    /// 整批失败：没有结果，只有一个错误
    pub fn with_error(error: AdapterError) -> Self {
        Self::of(Vec::new(), vec![error])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// 多值 header 集合，保留插入顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个 header（同名不覆盖）
    pub fn add(mut self, name: &str, value: &str) -> Self {
        self.entries.push((name.to_string(), value.to_string()));
        self
    }

    /// 按名称（大小写不敏感）取第一个值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 出站请求描述。`payload` 对传输层不透明，会随响应原样交回 `interpret`。
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest<P> {
    pub method: HttpMethod,
    pub uri: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub payload: P,
}

/// bidder 返回的原始 HTTP 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BidType {
    Banner,
    Video,
    Native,
    Audio,
}

/// 归一化后的 bid；`currency` 永远非空
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBid {
    pub bid: Bid,
    pub bid_type: BidType,
    pub currency: String,
}

pub const DEFAULT_CURRENCY: &str = "USD";

impl NormalizedBid {
    /// 上游没有币种（或为空）时回落到 USD
    pub fn new(bid: Bid, bid_type: BidType, currency: Option<&str>) -> Self {
        let currency = currency
            .map(str::trim)
            .filter(|cur| !cur.is_empty())
            .unwrap_or(DEFAULT_CURRENCY)
            .to_string();
        Self { bid, bid_type, currency }
    }
}

/// 适配器契约。实例在进程启动时创建一次，之后被多个拍卖并发调用，
/// 因此必须是 `Send + Sync` 且不含内部可变状态。
pub trait Bidder: Send + Sync {
    type Payload: Clone + Send + Sync + 'static;

    fn prepare(&self, request: &BidRequest) -> AdapterResult<OutboundRequest<Self::Payload>>;

    fn interpret(
        &self,
        request: &OutboundRequest<Self::Payload>,
        response: &HttpResponse,
    ) -> AdapterResult<NormalizedBid>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_multi_valued_and_case_insensitive() {
        let headers = Headers::new()
            .add("X-Forwarded-For", "1.1.1.1")
            .add("x-forwarded-for", "2.2.2.2");
        assert_eq!(headers.get("X-FORWARDED-FOR"), Some("1.1.1.1"));
        assert_eq!(headers.get_all("x-forwarded-for").count(), 2);
        assert!(headers.get("Referer").is_none());
    }

    #[test]
    fn header_value_outlives_lookup_key() {
        let headers = Headers::new().add("Origin", "https://pub.example");
        let origin = {
            let key = String::from("origin");
            headers.get(&key)
        };
        assert_eq!(origin, Some("https://pub.example"));
    }

    #[test]
    fn currency_falls_back_to_usd() {
        let bid = Bid::default();
        assert_eq!(NormalizedBid::new(bid.clone(), BidType::Banner, None).currency, "USD");
        assert_eq!(NormalizedBid::new(bid.clone(), BidType::Banner, Some(" ")).currency, "USD");
        assert_eq!(NormalizedBid::new(bid, BidType::Banner, Some("EUR")).currency, "EUR");
    }

    #[test]
    fn error_codes_match_auction_ext() {
        assert_eq!(AdapterError::bad_input("x").code(), 2);
        assert_eq!(AdapterError::bad_server_response("x").code(), 3);
        assert_eq!(AdapterError::Timeout("x".into()).code(), 1);
        assert_eq!(AdapterError::bad_input("Device IP is required.").to_string(), "Device IP is required.");
    }
}
