use url::Url;

use super::Headers;
use crate::config::ConfigError;

pub const APPLICATION_JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";
pub const OPENRTB_VERSION: &str = "2.5";

/// 校验 endpoint：必须是带 http/https scheme 的绝对地址
pub fn validate_url(endpoint: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };
    let url = Url::parse(endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(invalid("missing host".to_string())),
        other => Err(invalid(format!("unsupported scheme `{}`", other))),
    }
}

/// 所有适配器共用的基础 header
pub fn headers() -> Headers {
    Headers::new()
        .add("Content-Type", APPLICATION_JSON_CONTENT_TYPE)
        .add("Accept", APPLICATION_JSON)
        .add("x-openrtb-version", OPENRTB_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_http_urls() {
        assert!(validate_url("http://ortb.richaudience.com/ortb/?bidder=pbs").is_ok());
        assert!(validate_url("https://btlr.sharethrough.com/FGMrCMMc/v1").is_ok());
    }

    #[test]
    fn rejects_relative_and_non_http_urls() {
        assert!(validate_url("/ortb").is_err());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("ftp://example.com/bid").is_err());
    }

    #[test]
    fn common_headers() {
        let headers = headers();
        assert_eq!(headers.get("content-type"), Some("application/json;charset=utf-8"));
        assert_eq!(headers.get("Accept"), Some("application/json"));
        assert_eq!(headers.get("x-openrtb-version"), Some("2.5"));
        assert_eq!(headers.len(), 3);
    }
}
