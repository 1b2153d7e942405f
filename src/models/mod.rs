// src/models/mod.rs

pub mod api;

use crate::{constants, error::FailureKind};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Instant,
};

/// 视频清晰度选项，对应提取器的格式选择串
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[value(name = "best")]
    Best,
    #[value(name = "1080p")]
    P1080,
    #[value(name = "720p")]
    P720,
    #[value(name = "480p")]
    P480,
    #[value(name = "360p")]
    P360,
    #[value(name = "240p")]
    P240,
    #[value(name = "144p")]
    P144,
}

impl Quality {
    pub fn format_selector(self) -> &'static str {
        use constants::formats::*;
        match self {
            Quality::Best => DEFAULT_VIDEO,
            Quality::P1080 => Q1080,
            Quality::P720 => Q720,
            Quality::P480 => Q480,
            Quality::P360 => Q360,
            Quality::P240 => Q240,
            Quality::P144 => Q144,
        }
    }
}

/// 每条链接对应一个请求，创建后不可修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    url: String,
    desired_quality: Option<Quality>,
    audio_only: bool,
}

impl MediaRequest {
    pub fn new(url: impl Into<String>, desired_quality: Option<Quality>, audio_only: bool) -> Self {
        Self {
            url: url.into().trim().to_string(),
            desired_quality,
            audio_only,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn desired_quality(&self) -> Option<Quality> {
        self.desired_quality
    }

    pub fn audio_only(&self) -> bool {
        self.audio_only
    }

    pub fn format_selector(&self) -> &'static str {
        if self.audio_only {
            constants::formats::AUDIO
        } else {
            self.desired_quality
                .map_or(constants::formats::DEFAULT_VIDEO, Quality::format_selector)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformTag {
    VideoSite,
    ShortVideo,
    PhotoSocial,
    ThreadedSocial,
    MusicStream,
    SocialVideoSite,
    PinBoard,
    Microblog,
    Unknown,
}

impl PlatformTag {
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformTag::VideoSite => "video-site",
            PlatformTag::ShortVideo => "short-video",
            PlatformTag::PhotoSocial => "photo-social",
            PlatformTag::ThreadedSocial => "threaded-social",
            PlatformTag::MusicStream => "music-stream",
            PlatformTag::SocialVideoSite => "social-video-site",
            PlatformTag::PinBoard => "pin-board",
            PlatformTag::Microblog => "microblog",
            PlatformTag::Unknown => "unknown",
        }
    }

    /// 支持多图/轮播帖子的平台
    pub fn supports_carousel(self) -> bool {
        matches!(self, PlatformTag::PhotoSocial)
    }

    /// 提取器不稳定或需要登录、值得回退到网页元数据抓取的平台
    pub fn supports_page_scrape(self) -> bool {
        matches!(
            self,
            PlatformTag::PinBoard
                | PlatformTag::PhotoSocial
                | PlatformTag::ThreadedSocial
                | PlatformTag::SocialVideoSite
        )
    }

    /// 该平台的请求使用哪个平台的登录会话
    pub fn session_platform(self) -> Option<PlatformTag> {
        match self {
            PlatformTag::PhotoSocial | PlatformTag::ThreadedSocial => Some(PlatformTag::PhotoSocial),
            PlatformTag::ShortVideo => Some(PlatformTag::ShortVideo),
            PlatformTag::VideoSite => Some(PlatformTag::VideoSite),
            _ => None,
        }
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Audio,
    Image,
    Mixed,
}

impl ContentType {
    /// 根据已下载文件的扩展名推断具体类型
    pub fn from_path(path: &Path) -> Option<ContentType> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if constants::VIDEO_FILE_EXTENSIONS.contains(&ext.as_str()) {
            Some(ContentType::Video)
        } else if constants::AUDIO_FILE_EXTENSIONS.contains(&ext.as_str()) {
            Some(ContentType::Audio)
        } else if constants::IMAGE_FILE_EXTENSIONS.contains(&ext.as_str()) {
            Some(ContentType::Image)
        } else {
            None
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContentType::Video => "video",
            ContentType::Audio => "audio",
            ContentType::Image => "image",
            ContentType::Mixed => "mixed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    Generic,
    PageScrape,
    PostDownloader,
    UnauthenticatedGeneric,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::Generic => "generic",
            StrategyKind::PageScrape => "page-scrape",
            StrategyKind::PostDownloader => "post-downloader",
            StrategyKind::UnauthenticatedGeneric => "unauthenticated-generic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub path: PathBuf,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    Single(PathBuf),
    Items(Vec<MediaItem>),
}

/// 流水线的输出。`working_directory` 由调用方在交付后删除。
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub title: String,
    pub uploader: String,
    pub duration_seconds: u64,
    pub platform: PlatformTag,
    pub content_type: ContentType,
    pub source_strategy: StrategyKind,
    pub payload: MediaPayload,
    pub created_at: DateTime<Utc>,
    pub working_directory: PathBuf,
}

impl ExtractionResult {
    pub fn primary_path(&self) -> Option<&Path> {
        match &self.payload {
            MediaPayload::Single(path) => Some(path),
            MediaPayload::Items(items) => items.first().map(|i| i.path.as_path()),
        }
    }

    pub fn paths(&self) -> Vec<&Path> {
        match &self.payload {
            MediaPayload::Single(path) => vec![path.as_path()],
            MediaPayload::Items(items) => items.iter().map(|i| i.path.as_path()).collect(),
        }
    }

    pub fn item_count(&self) -> usize {
        match &self.payload {
            MediaPayload::Single(_) => 1,
            MediaPayload::Items(items) => items.len(),
        }
    }

    /// 至少有一个文件仍在磁盘上
    pub fn has_file_on_disk(&self) -> bool {
        self.paths().iter().any(|p| p.is_file())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatInfo {
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
}

impl FormatInfo {
    fn codec_present(codec: &Option<String>) -> bool {
        codec.as_deref().is_some_and(|c| !c.is_empty() && c != "none")
    }

    pub fn has_video(&self) -> bool {
        Self::codec_present(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        Self::codec_present(&self.acodec)
    }
}

/// 预探测得到的信息：来自通用提取器的格式列表，或来自帖子接口的条目统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration_seconds: Option<f64>,
    pub formats: Vec<FormatInfo>,
    pub item_types: Vec<ContentType>,
}

impl ProbeInfo {
    pub fn item_count(&self) -> usize {
        self.item_types.len().max(1)
    }

    pub fn is_multi_item(&self) -> bool {
        self.item_types.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub timestamp: Instant,
    pub primary_path: Option<PathBuf>,
    pub result: Option<ExtractionResult>,
    pub failure: Option<FailureKind>,
}
