// src/extractor/post.rs

use super::{AcquisitionJob, ExtractionStrategy, StrategyError, StrategyOutput};
use crate::{
    client::RobustClient,
    config::AppConfig,
    constants,
    error::{AppError, AppResult},
    models::{
        ContentType, MediaItem, MediaPayload, PlatformTag, ProbeInfo, StrategyKind,
        api::{PostInfoResponse, PostItem},
    },
    session::{SessionManager, SessionRegistry, platform_headers},
    utils,
};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use dashmap::DashMap;
use log::{debug, info};
use std::sync::Arc;
use url::Url;

const POST_SEGMENTS: &[&str] = &["p", "reel", "reels", "tv"];
/// 短码前 11 位编码了媒体 ID (私密帖子的短码更长)
const SHORTCODE_ID_CHARS: usize = 11;

/// 从帖子链接中取出短码，支持 `/p/<code>` 与 `/<user>/p/<code>` 两种形式
pub fn extract_shortcode(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let code = match segments.as_slice() {
        [kind, code, ..] if POST_SEGMENTS.contains(kind) => *code,
        [_, kind, code, ..] if POST_SEGMENTS.contains(kind) => *code,
        _ => return None,
    };
    code.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .then(|| code.to_string())
}

/// 短码是媒体 ID 的 URL 安全 base64 表示
pub fn shortcode_to_media_id(shortcode: &str) -> Option<u128> {
    let code: String = shortcode.chars().take(SHORTCODE_ID_CHARS).collect();
    if code.is_empty() {
        return None;
    }
    // 左侧补 'A' (值为 0) 到 4 的倍数，使其按整字节解码
    let padded = format!("{}{}", "A".repeat((4 - code.len() % 4) % 4), code);
    let bytes = URL_SAFE_NO_PAD.decode(padded.as_bytes()).ok()?;
    Some(bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

/// 多元素帖子的专用下载器：登录后按帖子 ID 获取完整帖子对象并逐个下载
pub struct PostDownloadStrategy {
    client: Arc<RobustClient>,
    sessions: SessionRegistry,
    config: Arc<AppConfig>,
    /// 预探测时取到的帖子，供随后的下载直接使用
    prefetched: DashMap<String, PostItem>,
}

impl PostDownloadStrategy {
    pub fn new(client: Arc<RobustClient>, sessions: SessionRegistry, config: Arc<AppConfig>) -> Self {
        Self { client, sessions, config, prefetched: DashMap::new() }
    }

    fn session_for(&self, job_platform: PlatformTag) -> Option<Arc<SessionManager>> {
        self.sessions
            .for_platform(job_platform)
            .filter(|s| s.is_authenticated())
    }

    async fn fetch_post(&self, url: &str, session: &SessionManager) -> AppResult<PostItem> {
        let shortcode = extract_shortcode(url)
            .ok_or_else(|| AppError::UserInputError(format!("无法从链接中解析帖子短码: {}", url)))?;
        if let Some((_, item)) = self.prefetched.remove(&shortcode) {
            debug!("使用预探测得到的帖子 {}", shortcode);
            return Ok(item);
        }
        let media_id = shortcode_to_media_id(&shortcode)
            .ok_or_else(|| AppError::UserInputError(format!("无效的帖子短码: {}", shortcode)))?;
        let info_url = self
            .config
            .render_template(constants::templates::PHOTO_POST_INFO, &[("media_id", &media_id.to_string())])
            .ok_or_else(|| AppError::Extractor("缺少帖子详情接口模板".into()))?;

        session.rate_limited_wait().await;
        debug!("获取帖子 {} (媒体 ID {})", shortcode, media_id);
        let response: PostInfoResponse = self.client.fetch_json(&info_url, &session.get_headers()).await?;
        response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NoMediaFound(format!("帖子 {} 没有内容", shortcode)))
    }

    /// 预探测帖子的元素数量与类型
    pub async fn probe(&self, job_url: &str, platform: PlatformTag) -> AppResult<ProbeInfo> {
        let session = self
            .session_for(platform)
            .ok_or_else(|| AppError::Extractor("未登录，无法预探测帖子".into()))?;
        let item = self.fetch_post(job_url, &session).await?;
        let probe = ProbeInfo {
            title: item.caption_text().map(str::to_string),
            uploader: item.username().map(str::to_string),
            duration_seconds: item.video_duration,
            formats: Vec::new(),
            item_types: item.media().iter().map(|m| m.content_type).collect(),
        };
        if let Some(shortcode) = extract_shortcode(job_url) {
            self.prefetched.insert(shortcode, item);
        }
        Ok(probe)
    }
}

#[async_trait]
impl ExtractionStrategy for PostDownloadStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PostDownloader
    }

    fn applies_to(&self, job: &AcquisitionJob) -> bool {
        job.platform.supports_carousel()
            && extract_shortcode(&job.target).is_some()
            && self.session_for(job.platform).is_some()
    }

    async fn attempt(&self, job: &AcquisitionJob) -> Result<StrategyOutput, StrategyError> {
        let session = self
            .session_for(job.platform)
            .ok_or_else(|| AppError::Extractor("未登录".into()))?;
        let item = self.fetch_post(&job.target, &session).await?;
        let media = item.media();
        if media.is_empty() {
            return Err(AppError::NoMediaFound(job.target.clone()).into());
        }
        info!("帖子包含 {} 个媒体元素", media.len());

        let cdn_headers = platform_headers(job.platform);
        let mut items = Vec::with_capacity(media.len());
        for (index, entry) in media.iter().enumerate() {
            let base_name = format!("{}_{:02}", job.base_name, index + 1);
            let path = self
                .client
                .download_to(&entry.url, &cdn_headers, &job.working_dir, &base_name)
                .await?;
            items.push(MediaItem { path, content_type: entry.content_type });
        }

        let title = item
            .caption_text()
            .map(|c| utils::truncate_text(c.lines().next().unwrap_or(c), constants::TITLE_TRUNCATE_LENGTH));
        let (payload, content_type) = if items.len() == 1 {
            let only = items.remove(0);
            (MediaPayload::Single(only.path), only.content_type)
        } else {
            (MediaPayload::Items(items), ContentType::Mixed)
        };

        Ok(StrategyOutput {
            title,
            uploader: item.username().map(str::to_string),
            duration_seconds: item.video_duration,
            payload,
            content_type,
        })
    }
}
