// src/bidder/sharethrough/markup.rs

//! 把 Sharethrough 私有响应改写成放进 `bid.adm` 的 HTML。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};

use super::model::SharethroughResponse;
use super::uri::StrUriParameters;

/// 托管渲染脚本；没有 beacon 时引用它
pub const HOSTED_TAG: &str = r#"<script src="//native.sharethrough.com/assets/sfp.js"></script>"#;

const AD_TEMPLATE: &str = r#"<img src="//b.sharethrough.com/butler?type=s2s-win&arid=${ADSERVER_REQUEST_ID}&adReceivedAt=${AD_REQUEST_AT}" />
<div data-str-native-key="${PLACEMENT_KEY}" data-stx-response-name="${RESPONSE_NAME}" data-str-bid-id="${BID_ID}" data-str-campaign-key="${CAMPAIGN_KEY}" data-str-creative-key="${CREATIVE_KEY}" data-str-deal-id="${DEAL_ID}" style="width:${WIDTH}px;height:${HEIGHT}px;"></div>
<script>window["${RESPONSE_NAME}"] = "${ENCODED_RESPONSE}";</script>
${AD_MARKUP}"#;

const IFRAME_TEMPLATE: &str = r#"<!DOCTYPE html><html><head><meta charset="utf-8"><style>html,body{margin:0;padding:0;overflow:hidden;width:${WIDTH}px;height:${HEIGHT}px;}</style></head><body>${AD_MARKUP}</body></html>"#;

/// `yyyy-MM-dd'T'HH:mm:ssXXX`，UTC 下偏移写作 `Z`
pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 生成广告 markup：
/// - 第一个创意带 beacon 时逐个内嵌，否则引用托管脚本
/// - 请求了 iframe 时再包一层 `width × height` 的最小文档
pub fn ad_markup(
    response_body: &str,
    response: &SharethroughResponse,
    params: &StrUriParameters,
    ad_request_at: DateTime<Utc>,
) -> String {
    let creative = response.creatives.first();
    let metadata = creative.map(|creative| &creative.metadata);
    let beacon_markup = creative
        .and_then(|creative| creative.creative.beacons.as_ref())
        .map(|beacons| {
            beacons
                .iter()
                .flat_map(|(kind, urls)| urls.iter().map(move |url| beacon_tag(kind, url)))
                .collect::<Vec<_>>()
        })
        .filter(|tags| !tags.is_empty())
        .map(|tags| tags.join("\n"))
        .unwrap_or_else(|| HOSTED_TAG.to_string());

    let width = params.width.to_string();
    let height = params.height.to_string();
    let date = format_date(ad_request_at);
    let field = |value: Option<&String>| html_escape(value.map(String::as_str).unwrap_or_default());
    let adserver_request_id = html_escape(&response.adserver_request_id);
    let placement_key = html_escape(&params.pkey);
    let name = response_name(&response.bid_id);
    let bid_id = html_escape(&response.bid_id);
    let campaign_key = field(metadata.and_then(|m| m.campaign_key.as_ref()));
    let creative_key = field(metadata.and_then(|m| m.creative_key.as_ref()));
    let deal_id = field(metadata.and_then(|m| m.deal_id.as_ref()));
    let encoded_response = STANDARD.encode(response_body.as_bytes());

    let markup = fill_template(
        AD_TEMPLATE,
        &[
            ("ADSERVER_REQUEST_ID", adserver_request_id.as_str()),
            ("AD_REQUEST_AT", date.as_str()),
            ("PLACEMENT_KEY", placement_key.as_str()),
            ("RESPONSE_NAME", name.as_str()),
            ("BID_ID", bid_id.as_str()),
            ("CAMPAIGN_KEY", campaign_key.as_str()),
            ("CREATIVE_KEY", creative_key.as_str()),
            ("DEAL_ID", deal_id.as_str()),
            ("WIDTH", width.as_str()),
            ("HEIGHT", height.as_str()),
            ("ENCODED_RESPONSE", encoded_response.as_str()),
            ("AD_MARKUP", beacon_markup.as_str()),
        ],
    );

    if params.iframe {
        fill_template(
            IFRAME_TEMPLATE,
            &[("WIDTH", width.as_str()), ("HEIGHT", height.as_str()), ("AD_MARKUP", markup.as_str())],
        )
    } else {
        markup
    }
}

fn beacon_tag(kind: &str, url: &str) -> String {
    format!(
        r#"<img src="{}" data-str-beacon="{}" style="display:none;" />"#,
        html_escape(url),
        html_escape(kind)
    )
}

/// 渲染脚本读取的全局变量名，只保留安全字符
fn response_name(bid_id: &str) -> String {
    let sanitized: String = bid_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("str_response_{}", sanitized)
}

fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 单遍替换 `${NAME}` 占位符；替换进来的值不会被再次展开，未知占位符原样保留
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };
        let name = &tail[2..end];
        match values.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    out
}
