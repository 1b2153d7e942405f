// src/models/api.rs

use super::{ContentType, FormatInfo, ProbeInfo};
use serde::Deserialize;

// --- 通用提取器 (yt-dlp -J) 输出 ---

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ExtractorFormat {
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RequestedDownload {
    pub filepath: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ExtractorInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    #[serde(default)]
    pub formats: Vec<ExtractorFormat>,
    #[serde(default)]
    pub entries: Vec<ExtractorInfo>,
    #[serde(default)]
    pub requested_downloads: Vec<RequestedDownload>,
    #[serde(rename = "_filename")]
    pub filename: Option<String>,
}

impl ExtractorInfo {
    pub fn uploader_name(&self) -> Option<&str> {
        self.uploader.as_deref().or(self.channel.as_deref())
    }

    /// 搜索结果 (`ytsearch1:`) 是播放列表，时长只出现在条目中
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration.or_else(|| self.entries.first().and_then(|e| e.duration))
    }

    /// 提取器报告的输出文件，顶层没有时取自条目
    pub fn downloaded_files(&self) -> impl Iterator<Item = &str> {
        self.requested_downloads
            .iter()
            .chain(self.entries.iter().flat_map(|e| e.requested_downloads.iter()))
            .filter_map(|d| d.filepath.as_deref())
            .chain(self.filename.as_deref())
    }

    fn own_formats(&self) -> Vec<FormatInfo> {
        let mut formats: Vec<FormatInfo> = self
            .formats
            .iter()
            .map(|f| FormatInfo { vcodec: f.vcodec.clone(), acodec: f.acodec.clone() })
            .collect();
        // 部分站点只在顶层给出编码信息
        if formats.is_empty() && (self.vcodec.is_some() || self.acodec.is_some()) {
            formats.push(FormatInfo { vcodec: self.vcodec.clone(), acodec: self.acodec.clone() });
        }
        formats
    }

    fn own_type(&self) -> ContentType {
        let formats = self.own_formats();
        if formats.iter().any(FormatInfo::has_video) {
            ContentType::Video
        } else if formats.iter().any(FormatInfo::has_audio) {
            ContentType::Audio
        } else {
            ContentType::Image
        }
    }

    pub fn into_probe(self) -> ProbeInfo {
        let item_types = if self.entries.is_empty() {
            Vec::new()
        } else {
            self.entries.iter().map(ExtractorInfo::own_type).collect()
        };
        let mut formats = self.own_formats();
        for entry in &self.entries {
            formats.extend(entry.own_formats());
        }
        ProbeInfo {
            uploader: self.uploader_name().map(str::to_string),
            title: self.title,
            duration_seconds: self.duration,
            formats,
            item_types,
        }
    }
}

// --- 照片社交平台帖子详情接口 ---

#[derive(Deserialize, Debug, Clone)]
pub struct PostInfoResponse {
    #[serde(default)]
    pub items: Vec<PostItem>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PostItem {
    pub media_type: u8,
    pub caption: Option<PostCaption>,
    pub user: Option<PostUser>,
    pub image_versions2: Option<ImageVersions>,
    pub video_versions: Option<Vec<MediaCandidate>>,
    pub video_duration: Option<f64>,
    pub carousel_media: Option<Vec<PostItem>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PostCaption {
    pub text: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PostUser {
    pub username: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ImageVersions {
    #[serde(default)]
    pub candidates: Vec<MediaCandidate>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MediaCandidate {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// 帖子中的单个媒体元素 (已解析出直链)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMedia {
    pub url: String,
    pub content_type: ContentType,
}

impl PostItem {
    const VIDEO: u8 = 2;

    fn direct_media(&self) -> Option<PostMedia> {
        if self.media_type == Self::VIDEO
            && let Some(video) = self.video_versions.as_ref().and_then(|v| v.first())
        {
            return Some(PostMedia { url: video.url.clone(), content_type: ContentType::Video });
        }
        let image = self.image_versions2.as_ref()?.candidates.first()?;
        Some(PostMedia { url: image.url.clone(), content_type: ContentType::Image })
    }

    /// 按源顺序展开帖子中的全部媒体
    pub fn media(&self) -> Vec<PostMedia> {
        match &self.carousel_media {
            Some(children) if !children.is_empty() => {
                children.iter().filter_map(PostItem::direct_media).collect()
            }
            _ => self.direct_media().into_iter().collect(),
        }
    }

    pub fn caption_text(&self) -> Option<&str> {
        self.caption.as_ref().map(|c| c.text.as_str()).filter(|t| !t.trim().is_empty())
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carousel_media_keeps_source_order() {
        let json = r#"{"items":[{"media_type":8,"carousel_media":[
            {"media_type":1,"image_versions2":{"candidates":[{"url":"https://cdn/a.jpg"}]}},
            {"media_type":2,"video_versions":[{"url":"https://cdn/b.mp4"}],
             "image_versions2":{"candidates":[{"url":"https://cdn/b.jpg"}]}},
            {"media_type":1,"image_versions2":{"candidates":[{"url":"https://cdn/c.jpg"}]}}
        ]}]}"#;
        let resp: PostInfoResponse = serde_json::from_str(json).unwrap();
        let media = resp.items[0].media();
        let urls: Vec<&str> = media.iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, ["https://cdn/a.jpg", "https://cdn/b.mp4", "https://cdn/c.jpg"]);
        assert_eq!(media[1].content_type, ContentType::Video);
    }

    #[test]
    fn test_extractor_info_probe_from_top_level_codecs() {
        let info: ExtractorInfo =
            serde_json::from_str(r#"{"title":"t","vcodec":"none","acodec":"opus"}"#).unwrap();
        let probe = info.into_probe();
        assert_eq!(probe.formats.len(), 1);
        assert!(probe.formats[0].has_audio());
        assert!(!probe.is_multi_item());
    }

    #[test]
    fn test_search_playlist_takes_duration_and_file_from_entry() {
        let json = r#"{"_type":"playlist","title":"Never Gonna Give You Up Rick Astley","entries":[
            {"title":"Rick Astley - Never Gonna Give You Up","duration":213.0,
             "requested_downloads":[{"filepath":"/tmp/w/track.mp3"}]}
        ]}"#;
        let info: ExtractorInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.duration_seconds(), Some(213.0));
        assert_eq!(info.downloaded_files().collect::<Vec<_>>(), ["/tmp/w/track.mp3"]);

        let single: ExtractorInfo = serde_json::from_str(r#"{"duration":12.5}"#).unwrap();
        assert_eq!(single.duration_seconds(), Some(12.5));
    }
}
