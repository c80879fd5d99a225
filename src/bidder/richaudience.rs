// src/bidder/richaudience.rs

//! Richaudience：OpenRTB 透传型适配器，只对请求做少量整形。

use serde::Deserialize;
use url::Url;

use super::http_util;
use super::{
    AdapterError, AdapterResult, BidType, Bidder, HttpMethod, HttpResponse, NormalizedBid,
    OutboundRequest, DEFAULT_CURRENCY,
};
use crate::config::ConfigError;
use crate::openrtb::request::{BidRequest, Imp};
use crate::openrtb::response::BidResponse;

/// imp.ext 的外层：`{"bidder": {...}}`
#[derive(Deserialize, Debug, Clone)]
struct ExtImpBidder<T> {
    bidder: T,
}

/// imp.ext.bidder 中 Richaudience 的参数
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExtImpRichaudience {
    pub pid: Option<String>,
    #[serde(rename = "supplyType")]
    pub supply_type: Option<String>,
    pub bidfloorcur: Option<String>,
    pub test: Option<bool>,
}

pub struct RichaudienceBidder {
    endpoint_url: Url,
}

impl RichaudienceBidder {
    pub fn new(endpoint_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint_url: http_util::validate_url(endpoint_url)?,
        })
    }

    fn validate_request(request: &BidRequest) -> Result<(), AdapterError> {
        let has_ip = request.device.as_ref().is_some_and(|device| {
            !is_blank(device.ip.as_deref()) || !is_blank(device.ipv6.as_deref())
        });
        if has_ip {
            Ok(())
        } else {
            Err(AdapterError::bad_input("Device IP is required."))
        }
    }

    fn validate_imp(imp: &Imp) -> Result<(), AdapterError> {
        let has_size = imp.banner.as_ref().is_some_and(|banner| {
            banner.w.is_some()
                || banner.h.is_some()
                || banner.format.as_ref().is_some_and(|formats| !formats.is_empty())
        });
        if has_size {
            Ok(())
        } else {
            Err(AdapterError::bad_input(format!(
                "Banner W/H/Format is required. ImpId: {}",
                imp.id
            )))
        }
    }

    fn parse_imp_ext(imp: &Imp) -> Result<ExtImpRichaudience, AdapterError> {
        let invalid = || AdapterError::bad_input(format!("Invalid ext. Imp.Id: {}", imp.id));
        let ext = imp.ext.clone().ok_or_else(invalid)?;
        serde_json::from_value::<ExtImpBidder<ExtImpRichaudience>>(ext)
            .map(|ext| ext.bidder)
            .map_err(|_| invalid())
    }

    fn modify_imp(imp: &Imp, ext: &ExtImpRichaudience, secure: bool) -> Imp {
        let bidfloorcur = non_blank(ext.bidfloorcur.as_deref())
            .or_else(|| non_blank(imp.bidfloorcur.as_deref()))
            .unwrap_or(DEFAULT_CURRENCY);
        let tagid = non_blank(ext.pid.as_deref())
            .map(str::to_string)
            .or_else(|| imp.tagid.clone());

        Imp {
            secure: Some(i32::from(secure)),
            tagid,
            bidfloorcur: Some(bidfloorcur.to_string()),
            ..imp.clone()
        }
    }

    fn modify_request(request: &BidRequest, page_url: Option<&Url>, imps: Vec<Imp>, test: bool) -> BidRequest {
        let mut modified = BidRequest {
            imp: imps,
            test: Some(i32::from(test)),
            ..request.clone()
        };

        // 页面 URL 可解析且 site.domain 为空时，用页面 host 回填
        if let (Some(host), Some(site)) = (page_url.and_then(Url::host_str), modified.site.as_mut()) {
            if is_blank(site.domain.as_deref()) {
                site.domain = Some(host.to_string());
            }
        }
        modified
    }

    fn build_request(&self, request: &BidRequest) -> Result<OutboundRequest<BidRequest>, AdapterError> {
        Self::validate_request(request)?;

        let page_url = request.site_page().and_then(|page| Url::parse(page).ok());
        let secure = page_url.as_ref().is_some_and(|url| url.scheme() == "https");

        let mut imps = Vec::with_capacity(request.imp.len());
        let mut test = false;
        for imp in &request.imp {
            Self::validate_imp(imp)?;
            let ext = Self::parse_imp_ext(imp)?;
            test |= ext.test == Some(true);
            imps.push(Self::modify_imp(imp, &ext, secure));
        }

        let modified = Self::modify_request(request, page_url.as_ref(), imps, test);
        let body = serde_json::to_vec(&modified).map_err(|e| AdapterError::bad_input(e.to_string()))?;
        Ok(OutboundRequest {
            method: HttpMethod::Post,
            uri: self.endpoint_url.to_string(),
            headers: http_util::headers(),
            body,
            payload: modified,
        })
    }
}

impl Bidder for RichaudienceBidder {
    type Payload = BidRequest;

    /// 任何 bad_input 都会让整批请求失败：不产出请求，只返回这一个错误
    fn prepare(&self, request: &BidRequest) -> AdapterResult<OutboundRequest<BidRequest>> {
        match self.build_request(request) {
            Ok(outbound) => AdapterResult::with_value(outbound),
            Err(error) => AdapterResult::with_error(error),
        }
    }

    fn interpret(&self, _request: &OutboundRequest<BidRequest>, response: &HttpResponse) -> AdapterResult<NormalizedBid> {
        let bid_response: BidResponse = match serde_json::from_str(&response.body) {
            Ok(bid_response) => bid_response,
            Err(e) => return AdapterResult::with_error(AdapterError::bad_server_response(e.to_string())),
        };

        let bids = bid_response
            .bids()
            .map(|bid| NormalizedBid::new(bid.clone(), BidType::Banner, bid_response.cur.as_deref()))
            .collect();
        AdapterResult::with_values(bids)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    non_blank(value).is_none()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
