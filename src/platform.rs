// src/platform.rs

use crate::models::PlatformTag;
use regex::Regex;
use std::sync::LazyLock;

const SHORTS_ID_LEN: usize = 11;

/// 各平台的主机匹配规则，按顺序匹配，先到先得
static PLATFORM_PATTERNS: LazyLock<Vec<(PlatformTag, Regex)>> = LazyLock::new(|| {
    [
        (PlatformTag::VideoSite, r"youtube\.com|youtu\.be"),
        (PlatformTag::PinBoard, r"pinterest\.(?:com|[a-z]{2}|co\.[a-z]{2}|com\.[a-z]{2})|pin\.it"),
        (PlatformTag::PhotoSocial, r"instagram\.com|instagr\.am"),
        (PlatformTag::ThreadedSocial, r"threads\.net|threads\.com"),
        (PlatformTag::ShortVideo, r"tiktok\.com"),
        (PlatformTag::SocialVideoSite, r"facebook\.com|fb\.watch|fb\.me"),
        (PlatformTag::MusicStream, r"spotify\.com"),
        (PlatformTag::Microblog, r"twitter\.com|x\.com|t\.co"),
    ]
    .into_iter()
    .map(|(tag, hosts)| {
        let pattern =
            format!(r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*(?:{})(?::\d+)?(?:[/?#]|$)", hosts);
        (tag, Regex::new(&pattern).unwrap())
    })
    .collect()
});

/// 提取器内部的搜索查询方案 (例如 `ytsearch1:关键字`)
static SEARCH_SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^ytsearch(?:date|all)?\d*:").unwrap());

static SHORTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.|m\.)?youtube\.com/shorts/([A-Za-z0-9_-]+)").unwrap()
});

/// 仅根据 URL 形态判断所属平台，不进行任何网络访问
pub fn identify(url: &str) -> PlatformTag {
    let url = url.trim();
    if SEARCH_SCHEME_RE.is_match(url) {
        return PlatformTag::VideoSite;
    }
    PLATFORM_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(url))
        .map_or(PlatformTag::Unknown, |(tag, _)| *tag)
}

/// 将短视频路径改写为规范的长链接；无法解析出完整 ID 时原样返回
pub fn normalize(url: &str) -> String {
    let url = url.trim();
    let Some(caps) = SHORTS_RE.captures(url) else {
        return url.to_string();
    };
    let id = &caps[1];
    if id.len() < SHORTS_ID_LEN {
        log::debug!("短视频 ID 长度不足，保留原链接: {}", url);
        return url.to_string();
    }
    let canonical = format!("https://www.youtube.com/watch?v={}", &id[..SHORTS_ID_LEN]);
    log::debug!("短视频链接已规范化: {} -> {}", url, canonical);
    canonical
}
