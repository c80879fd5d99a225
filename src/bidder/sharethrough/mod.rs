// src/bidder/sharethrough/mod.rs

//! Sharethrough：非 OpenRTB 适配器。
//!
//! 每个 imp 拆成一个独立请求，参数编码在 query string 里，请求体是一个很小的 JSON；
//! 响应是私有的创意格式，需要改写成 OpenRTB bid。

pub mod markup;
pub mod model;
pub mod uri;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use url::Url;

use self::model::{ExtImpSharethrough, RequestBody, SharethroughResponse};
use self::uri::StrUriParameters;
use super::request_util::{self, PrivacySignals, UserInfo};
use super::{
    http_util, AdapterError, AdapterResult, BidType, Bidder, Headers, HttpMethod, HttpResponse,
    NormalizedBid, OutboundRequest, DEFAULT_CURRENCY,
};
use crate::config::ConfigError;
use crate::openrtb::request::{BidRequest, Device, Imp};
use crate::openrtb::response::Bid;

pub const VERSION: &str = "8";
pub const SUPPLY_ID: &str = "FGMrCMMc";
/// `test == 1` 时使用的固定时钟（Unix 毫秒）
pub const TEST_CLOCK_MILLIS: i64 = 1_604_455_678_999;

pub fn test_clock() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(TEST_CLOCK_MILLIS).unwrap_or_default()
}

#[derive(Deserialize)]
struct ExtImpBidder {
    bidder: ExtImpSharethrough,
}

/// 整个请求共用、只计算一次的值
struct RequestContext<'a> {
    privacy: PrivacySignals,
    user: UserInfo,
    can_auto_play: bool,
    ad_request_at: String,
    body: RequestBody,
    headers: &'a Headers,
}

pub struct SharethroughBidder {
    endpoint_url: Url,
}

impl SharethroughBidder {
    pub fn new(endpoint_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint_url: http_util::validate_url(endpoint_url)?,
        })
    }

    fn parse_imp_ext(imp: &Imp) -> Result<ExtImpSharethrough, AdapterError> {
        let ext = imp.ext.clone().unwrap_or_default();
        serde_json::from_value::<ExtImpBidder>(ext)
            .map(|ext| ext.bidder)
            .map_err(|e| {
                AdapterError::bad_input(format!("Error occurred parsing sharethrough parameters {}", e))
            })
    }

    fn make_headers(device: Option<&Device>, page: &str) -> Headers {
        let mut headers = http_util::headers();
        if let Some(origin) = origin(page) {
            headers = headers.add("Origin", &origin);
        }
        headers = headers.add("Referer", page);
        if let Some(ip) = device.and_then(|device| device.ip.as_deref()) {
            headers = headers.add("X-Forwarded-For", ip);
        }
        if let Some(ua) = device.and_then(|device| device.ua.as_deref()) {
            headers = headers.add("User-Agent", ua);
        }
        headers
    }

    fn uri_parameters(imp: &Imp, ext: &ExtImpSharethrough, ctx: &RequestContext<'_>) -> StrUriParameters {
        let size = request_util::select_size(imp.banner.as_ref(), ext.iframe_size.as_deref());
        StrUriParameters {
            pkey: ext.pkey.clone(),
            bid_id: imp.id.clone(),
            consent_required: ctx.privacy.consent_required,
            consent_string: ctx.user.consent.clone(),
            us_privacy_signal: ctx.privacy.us_privacy.clone(),
            instant_play_capable: ctx.can_auto_play,
            iframe: ext.iframe,
            height: size.height,
            width: size.width,
            ttd_uid: ctx.user.ttd_uid.clone(),
            stx_uid: ctx.user.stx_uid.clone(),
            gpid: ext
                .data
                .as_ref()
                .and_then(|data| data.pbadslot.clone())
                .unwrap_or_default(),
        }
    }

    fn make_request(&self, imp: &Imp, ctx: &RequestContext<'_>) -> Result<OutboundRequest<RequestBody>, AdapterError> {
        let ext = Self::parse_imp_ext(imp)?;
        let params = Self::uri_parameters(imp, &ext, ctx);
        let uri = uri::build_url(&self.endpoint_url, &ctx.ad_request_at, &params)?;
        let payload = RequestBody {
            bidfloor: ext.bidfloor,
            ..ctx.body.clone()
        };
        let body = serde_json::to_vec(&payload).map_err(|e| AdapterError::bad_input(e.to_string()))?;

        Ok(OutboundRequest {
            method: HttpMethod::Post,
            uri,
            headers: ctx.headers.clone(),
            body,
            payload,
        })
    }

    fn to_bid(
        response_body: &str,
        response: &SharethroughResponse,
        request: &OutboundRequest<RequestBody>,
    ) -> Result<NormalizedBid, AdapterError> {
        let creative = response
            .creatives
            .first()
            .ok_or_else(|| AdapterError::bad_server_response("No creative provided"))?;

        let params = uri::url_to_parameters(&request.uri)?;
        let ad_request_at = uri::ad_request_at(&request.uri).unwrap_or_else(|| {
            if request.payload.test {
                test_clock()
            } else {
                Utc::now()
            }
        });
        let adm = markup::ad_markup(response_body, response, &params, ad_request_at);

        let bid = Bid {
            id: response.bid_id.clone(),
            adid: Some(response.adserver_request_id.clone()),
            impid: params.bid_id.clone(),
            price: creative.cpm,
            cid: creative.metadata.campaign_key.clone(),
            crid: creative.metadata.creative_key.clone(),
            dealid: creative.metadata.deal_id.clone(),
            adm: Some(adm),
            h: Some(params.height),
            w: Some(params.width),
            ..Default::default()
        };
        Ok(NormalizedBid::new(bid, BidType::Banner, Some(DEFAULT_CURRENCY)))
    }
}

impl Bidder for SharethroughBidder {
    type Payload = RequestBody;

    fn prepare(&self, request: &BidRequest) -> AdapterResult<OutboundRequest<RequestBody>> {
        let Some(page) = request.site_page() else {
            return AdapterResult::with_error(AdapterError::bad_input("site.page is required"));
        };

        let test = request.is_test();
        let now = if test { test_clock() } else { Utc::now() };
        let tmax = request.tmax.unwrap_or(0);
        let deadline = i64::try_from(tmax)
            .ok()
            .and_then(Duration::try_milliseconds)
            .and_then(|tmax| now.checked_add_signed(tmax))
            .unwrap_or(now);

        let device = request.device.as_ref();
        let headers = Self::make_headers(device, page);
        let ctx = RequestContext {
            privacy: request_util::privacy_signals(request),
            user: request_util::user_info(request.user.as_ref()),
            can_auto_play: request_util::can_auto_play_video(device.and_then(|device| device.ua.as_deref())),
            ad_request_at: markup::format_date(now),
            body: RequestBody {
                badv: request.badv.clone().unwrap_or_default(),
                tmax,
                deadline: markup::format_date(deadline),
                test,
                bidfloor: None,
            },
            headers: &headers,
        };

        let mut requests = Vec::with_capacity(request.imp.len());
        let mut errors = Vec::new();
        for imp in &request.imp {
            match self.make_request(imp, &ctx) {
                Ok(outbound) => requests.push(outbound),
                Err(error) => errors.push(error),
            }
        }
        AdapterResult::of(requests, errors)
    }

    fn interpret(&self, request: &OutboundRequest<RequestBody>, response: &HttpResponse) -> AdapterResult<NormalizedBid> {
        let parsed: SharethroughResponse = match serde_json::from_str(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => return AdapterResult::with_error(AdapterError::bad_server_response(e.to_string())),
        };

        match Self::to_bid(&response.body, &parsed, request) {
            Ok(bid) => AdapterResult::with_value(bid),
            Err(error) => AdapterResult::with_error(error),
        }
    }
}

/// `<scheme>://<host>`；页面地址无法解析时返回 `None`
fn origin(page: &str) -> Option<String> {
    let url = Url::parse(page).ok()?;
    let host = url.host_str()?;
    Some(format!("{}://{}", url.scheme(), host))
}
