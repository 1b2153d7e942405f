// src/classifier.rs

use crate::{
    constants,
    models::{ContentType, FormatInfo, PlatformTag, ProbeInfo},
    platform,
};
use url::Url;

/// 仅依据 URL 的判定规则；规则命中时具有权威性
pub fn classify_url(url: &str) -> Option<ContentType> {
    let lower = url.trim().to_lowercase();
    let path = Url::parse(&lower)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| lower.clone());

    if constants::IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || constants::IMAGE_HOSTS.iter().any(|host| lower.contains(host))
    {
        return Some(ContentType::Image);
    }

    match platform::identify(&lower) {
        PlatformTag::PhotoSocial => {
            if path.contains("/reel/") || path.contains("/reels/") || path.contains("/tv/") {
                Some(ContentType::Video)
            } else if path.contains("/p/") || path.contains("/stories/") {
                Some(ContentType::Mixed)
            } else {
                None
            }
        }
        PlatformTag::ThreadedSocial | PlatformTag::PinBoard => Some(ContentType::Mixed),
        PlatformTag::SocialVideoSite => {
            if lower.contains("photo.php") || path.contains("/photos/") {
                Some(ContentType::Image)
            } else if lower.contains("video.php") || path.contains("/videos/") || path.contains("/reel/") {
                Some(ContentType::Video)
            } else {
                Some(ContentType::Mixed)
            }
        }
        PlatformTag::Microblog => {
            if path.contains("/photo/") {
                Some(ContentType::Image)
            } else if path.contains("/video/") {
                Some(ContentType::Video)
            } else {
                Some(ContentType::Mixed)
            }
        }
        PlatformTag::MusicStream => Some(ContentType::Audio),
        _ => None,
    }
}

/// 根据探测到的格式列表判定类型：有视频编码 => 视频，否则有音频编码 => 音频，否则图片
pub fn classify_probe(probe: &ProbeInfo) -> ContentType {
    if probe.is_multi_item() {
        return ContentType::Mixed;
    }
    if let [only] = probe.item_types.as_slice() {
        return *only;
    }
    if probe.formats.iter().any(FormatInfo::has_video) {
        ContentType::Video
    } else if probe.formats.iter().any(FormatInfo::has_audio) {
        ContentType::Audio
    } else {
        ContentType::Image
    }
}

/// 判定内容类型。
///
/// URL 规则先行。规则给出 `Mixed` 而探测结果表明只有单个元素时，
/// 以探测结果为准；多元素帖子保持 `Mixed`。规则与探测都无法判定时
/// 默认 `Mixed`，交给提取策略链实际确定。
pub fn classify(url: &str, probe: Option<&ProbeInfo>) -> ContentType {
    match (classify_url(url), probe) {
        (Some(ContentType::Mixed), Some(probe)) if !probe.is_multi_item() => classify_probe(probe),
        (Some(kind), _) => kind,
        (None, Some(probe)) => classify_probe(probe),
        (None, None) => ContentType::Mixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_with(vcodec: Option<&str>, acodec: Option<&str>) -> ProbeInfo {
        ProbeInfo {
            formats: vec![FormatInfo {
                vcodec: vcodec.map(str::to_string),
                acodec: acodec.map(str::to_string),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_url_rules() {
        let cases = [
            ("https://i.imgur.com/abc.png", ContentType::Image),
            ("https://example.com/pic.JPG?x=1", ContentType::Image),
            ("https://i.pinimg.com/originals/a.webp", ContentType::Image),
            ("https://www.instagram.com/reel/Cabc/", ContentType::Video),
            ("https://www.instagram.com/p/DK_2g5CzKwQ/?img_index=1", ContentType::Mixed),
            ("https://www.threads.net/@u/post/abc", ContentType::Mixed),
            ("https://www.facebook.com/photo.php?fbid=1", ContentType::Image),
            ("https://www.facebook.com/user/videos/123", ContentType::Video),
            ("https://x.com/u/status/1/photo/1", ContentType::Image),
            ("https://x.com/u/status/1/video/1", ContentType::Video),
        ];
        for (url, expected) in cases {
            assert_eq!(classify(url, None), expected, "url: {}", url);
        }
    }

    #[test]
    fn test_probe_fallback() {
        let url = "https://www.youtube.com/watch?v=4H-ckF9H_y0";
        assert_eq!(classify_url(url), None);
        assert_eq!(classify(url, Some(&probe_with(Some("avc1"), Some("mp4a")))), ContentType::Video);
        assert_eq!(classify(url, Some(&probe_with(Some("none"), Some("opus")))), ContentType::Audio);
        assert_eq!(classify(url, Some(&probe_with(Some("none"), Some("none")))), ContentType::Image);
        // 无规则、无探测时默认 Mixed
        assert_eq!(classify(url, None), ContentType::Mixed);
    }

    #[test]
    fn test_single_item_mixed_resolves_to_probe() {
        let url = "https://www.instagram.com/p/DK_2g5CzKwQ/";
        let single = ProbeInfo { item_types: vec![ContentType::Video], ..Default::default() };
        assert_eq!(classify(url, Some(&single)), ContentType::Video);

        let carousel = ProbeInfo {
            item_types: vec![ContentType::Image, ContentType::Video, ContentType::Image],
            ..Default::default()
        };
        assert_eq!(classify(url, Some(&carousel)), ContentType::Mixed);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let url = "https://www.pinterest.com/pin/123/";
        let first = classify(url, None);
        for _ in 0..5 {
            assert_eq!(classify(url, None), first);
        }
    }
}
