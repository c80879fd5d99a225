use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// imp.ext.bidder 中 Sharethrough 的参数
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtImpSharethrough {
    pub pkey: String,
    #[serde(default)]
    pub iframe: bool,
    /// `[w, h]`
    pub iframe_size: Option<Vec<i64>>,
    pub bidfloor: Option<f64>,
    pub data: Option<ExtData>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExtData {
    pub pbadslot: Option<String>,
}

/// 发往 Sharethrough 的 JSON 请求体，同时作为出站请求的 payload
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RequestBody {
    pub badv: Vec<String>,
    pub tmax: u64,
    pub deadline: String,
    pub test: bool,
    pub bidfloor: Option<f64>,
}

/// Sharethrough 私有响应格式
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharethroughResponse {
    #[serde(default)]
    pub adserver_request_id: String,
    #[serde(default)]
    pub bid_id: String,
    #[serde(default)]
    pub creatives: Vec<Creative>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Creative {
    pub cpm: f64,
    #[serde(default)]
    pub creative: CreativeDetails,
    #[serde(default)]
    pub metadata: CreativeMetadata,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreativeDetails {
    /// 按事件类型分组的 beacon 地址，例如 `impression` / `visible` / `click`
    pub beacons: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreativeMetadata {
    pub campaign_key: Option<String>,
    pub creative_key: Option<String>,
    pub deal_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_decodes_with_fields_the_markup_never_reads() {
        let body = r#"{
            "adserverRequestId": "arid",
            "bidId": "bid",
            "stxUserId": "stx-1",
            "creatives": [{
                "cpm": 2.0,
                "auctionWinId": "win-1",
                "creative": {"title": "t", "description": "d", "beacons": {"click": ["https://c.example"]}},
                "metadata": {"dealId": "deal"}
            }]
        }"#;
        let response: SharethroughResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.bid_id, "bid");
        let creative = &response.creatives[0];
        assert_eq!(creative.cpm, 2.0);
        assert_eq!(creative.metadata.deal_id.as_deref(), Some("deal"));
        let beacons = creative.creative.beacons.as_ref().unwrap();
        assert_eq!(beacons["click"], vec!["https://c.example".to_string()]);
    }
}
