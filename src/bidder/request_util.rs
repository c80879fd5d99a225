// src/bidder/request_util.rs

use crate::openrtb::request::{Banner, BidRequest, User};

/// The Trade Desk 的 eid source
pub const TTD_EID_SOURCE: &str = "adserver.org";

/// regs.ext 中的隐私信号
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivacySignals {
    pub consent_required: bool,
    pub us_privacy: String,
}

pub fn privacy_signals(request: &BidRequest) -> PrivacySignals {
    let ext = request.ext_regs().unwrap_or_default();
    PrivacySignals {
        consent_required: ext.gdpr == Some(1),
        us_privacy: ext.us_privacy.unwrap_or_default(),
    }
}

/// 从 user 中提取的身份信息，缺失的字段为空字符串
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub consent: String,
    pub ttd_uid: String,
    pub stx_uid: String,
}

pub fn user_info(user: Option<&User>) -> UserInfo {
    let Some(user) = user else {
        return UserInfo::default();
    };
    let ext = user.ext_user().unwrap_or_default();
    let ttd_uid = ext
        .eids
        .iter()
        .flatten()
        .filter(|eid| eid.source == TTD_EID_SOURCE)
        .flat_map(|eid| eid.uids.iter())
        .map(|uid| uid.id.as_str())
        .find(|id| !id.is_empty())
        .unwrap_or_default()
        .to_string();

    UserInfo {
        consent: ext.consent.unwrap_or_default(),
        ttd_uid,
        stx_uid: user.buyeruid.clone().unwrap_or_default(),
    }
}

const MIN_ANDROID_AUTO_PLAY: (u32, u32) = (5, 0);
const MIN_IOS_AUTO_PLAY: (u32, u32) = (8, 0);

/// 判断浏览器能否自动播放视频。
///
/// 只识别两类老系统：Android 5.0 以下、iOS 8.0 以下返回 `false`；
/// 其余情况（桌面、新系统、UA 无法解析）一律视为可以自动播放。
pub fn can_auto_play_video(user_agent: Option<&str>) -> bool {
    let Some(ua) = user_agent else {
        return true;
    };

    if let Some(version) = android_version(ua) {
        return version >= MIN_ANDROID_AUTO_PLAY;
    }
    if is_ios(ua) {
        if let Some(version) = ios_version(ua) {
            return version >= MIN_IOS_AUTO_PLAY;
        }
    }
    true
}

fn is_ios(ua: &str) -> bool {
    ["iPhone", "iPad", "iPod"].iter().any(|device| ua.contains(device))
}

/// `Android 4.4.2;` -> (4, 4)
fn android_version(ua: &str) -> Option<(u32, u32)> {
    ua.match_indices("Android ")
        .find_map(|(idx, marker)| parse_version(&ua[idx + marker.len()..], '.'))
}

/// `CPU iPhone OS 13_2 like Mac OS X` -> (13, 2)；`Mac OS X` 本身不含数字，会被跳过
fn ios_version(ua: &str) -> Option<(u32, u32)> {
    ua.match_indices(" OS ")
        .find_map(|(idx, marker)| parse_version(&ua[idx + marker.len()..], '_'))
}

fn parse_version(rest: &str, separator: char) -> Option<(u32, u32)> {
    let major_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let major = rest[..major_len].parse::<u32>().ok()?;
    let minor = rest[major_len..]
        .strip_prefix(separator)
        .map(|tail| {
            let len = tail.find(|c: char| !c.is_ascii_digit()).unwrap_or(tail.len());
            tail[..len].parse::<u32>().unwrap_or(0)
        })
        .unwrap_or(0);
    Some((major, minor))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const SENTINEL: Size = Size { width: 1, height: 1 };

    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }
}

/// 为 banner 选出唯一尺寸，优先级：
/// 1. iframeSize（`[w, h]`，两者都为正）
/// 2. banner.format 中面积最大的一个
/// 3. banner.w / banner.h 都存在
/// 4. 1x1 占位
pub fn select_size(banner: Option<&Banner>, iframe_size: Option<&[i64]>) -> Size {
    if let Some([w, h, ..]) = iframe_size {
        if *w > 0 && *h > 0 {
            if let (Ok(w), Ok(h)) = (i32::try_from(*w), i32::try_from(*h)) {
                return Size::new(w, h);
            }
        }
    }

    let Some(banner) = banner else {
        return Size::SENTINEL;
    };

    let largest = banner
        .format
        .iter()
        .flatten()
        .map(|format| Size::new(format.w, format.h))
        .fold(None::<Size>, |best, size| match best {
            Some(best) if best.area() >= size.area() => Some(best),
            _ => Some(size),
        });
    if let Some(size) = largest {
        return size;
    }

    match (banner.w, banner.h) {
        (Some(w), Some(h)) => Size::new(w, h),
        _ => Size::SENTINEL,
    }
}
