// src/bidder/sharethrough/uri.rs

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use url::Url;

use super::{SUPPLY_ID, VERSION};
use crate::bidder::AdapterError;

/// 编码进 Sharethrough 请求 URL 的参数。可选字符串为空表示不出现在 URL 中。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrUriParameters {
    pub pkey: String,
    pub bid_id: String,
    pub consent_required: bool,
    pub consent_string: String,
    pub us_privacy_signal: String,
    pub instant_play_capable: bool,
    pub iframe: bool,
    pub height: i32,
    pub width: i32,
    pub ttd_uid: String,
    pub stx_uid: String,
    pub gpid: String,
}

const PLACEMENT_KEY: &str = "placement_key";
const BID_ID: &str = "bidId";
const CONSENT_REQUIRED: &str = "consent_required";
const CONSENT_STRING: &str = "consent_string";
const US_PRIVACY: &str = "us_privacy";
const INSTANT_PLAY_CAPABLE: &str = "instant_play_capable";
const STAY_IN_IFRAME: &str = "stayInIframe";
const HEIGHT: &str = "height";
const WIDTH: &str = "width";
const AD_REQUEST_AT: &str = "adRequestAt";
const SUPPLY_ID_KEY: &str = "supplyId";
const STR_VERSION: &str = "strVersion";
const TTD_UID: &str = "ttduid";
const STX_UID: &str = "stxuid";
const GPID: &str = "gpid";

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// 构造请求 URL。key 的顺序固定；所有值都做 percent-encode；空的可选值整个省略。
pub fn build_url(endpoint: &Url, ad_request_at: &str, params: &StrUriParameters) -> Result<String, AdapterError> {
    if params.pkey.trim().is_empty() {
        return Err(AdapterError::bad_input(format!(
            "placement_key is required. ImpId: {}",
            params.bid_id
        )));
    }
    if params.bid_id.trim().is_empty() {
        return Err(AdapterError::bad_input("imp.id is required"));
    }

    let mut url = endpoint.clone();
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair(PLACEMENT_KEY, &params.pkey)
            .append_pair(BID_ID, &params.bid_id)
            .append_pair(CONSENT_REQUIRED, flag(params.consent_required));
        append_optional(&mut query, CONSENT_STRING, &params.consent_string);
        append_optional(&mut query, US_PRIVACY, &params.us_privacy_signal);
        query
            .append_pair(INSTANT_PLAY_CAPABLE, flag(params.instant_play_capable))
            .append_pair(STAY_IN_IFRAME, flag(params.iframe))
            .append_pair(HEIGHT, &params.height.to_string())
            .append_pair(WIDTH, &params.width.to_string())
            .append_pair(AD_REQUEST_AT, ad_request_at)
            .append_pair(SUPPLY_ID_KEY, SUPPLY_ID)
            .append_pair(STR_VERSION, VERSION);
        append_optional(&mut query, TTD_UID, &params.ttd_uid);
        append_optional(&mut query, STX_UID, &params.stx_uid);
        append_optional(&mut query, GPID, &params.gpid);
    }
    Ok(url.into())
}

fn append_optional(query: &mut url::form_urlencoded::Serializer<'_, url::UrlQuery<'_>>, key: &str, value: &str) {
    if !value.is_empty() {
        query.append_pair(key, value);
    }
}

fn query_map(uri: &str) -> Result<HashMap<String, String>, AdapterError> {
    let url = Url::parse(uri).map_err(|e| AdapterError::bad_server_response(format!("invalid request uri: {}", e)))?;
    Ok(url.query_pairs().into_owned().collect())
}

/// `build_url` 的逆过程：从出站 URL 还原参数
pub fn url_to_parameters(uri: &str) -> Result<StrUriParameters, AdapterError> {
    let query = query_map(uri)?;
    let text = |key: &str| query.get(key).cloned().unwrap_or_default();
    let boolean = |key: &str| query.get(key).is_some_and(|value| value == "1" || value == "true");
    let number = |key: &str| -> Result<i32, AdapterError> {
        query
            .get(key)
            .map(|value| value.parse::<i32>())
            .transpose()
            .map(Option::unwrap_or_default)
            .map_err(|e| AdapterError::bad_server_response(format!("invalid {} in request uri: {}", key, e)))
    };

    Ok(StrUriParameters {
        pkey: text(PLACEMENT_KEY),
        bid_id: text(BID_ID),
        consent_required: boolean(CONSENT_REQUIRED),
        consent_string: text(CONSENT_STRING),
        us_privacy_signal: text(US_PRIVACY),
        instant_play_capable: boolean(INSTANT_PLAY_CAPABLE),
        iframe: boolean(STAY_IN_IFRAME),
        height: number(HEIGHT)?,
        width: number(WIDTH)?,
        ttd_uid: text(TTD_UID),
        stx_uid: text(STX_UID),
        gpid: text(GPID),
    })
}

/// 出站 URL 中记录的请求时间
pub fn ad_request_at(uri: &str) -> Option<DateTime<Utc>> {
    let query = query_map(uri).ok()?;
    let raw = query.get(AD_REQUEST_AT)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
