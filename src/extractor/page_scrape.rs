// src/extractor/page_scrape.rs

use super::{AcquisitionJob, ExtractionStrategy, StrategyError, StrategyOutput};
use crate::{
    client::RobustClient,
    error::AppError,
    models::{ContentType, MediaPayload, StrategyKind},
    session::{SessionRegistry, platform_headers},
};
use async_trait::async_trait;
use log::{debug, info};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};
use url::Url;

static SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());
static VIDEO_SRC_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("video source[src], video[src]").unwrap());
static META_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta[content]").unwrap());
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
/// 内联脚本中的 `pinData = {...};` 之类赋值
static INLINE_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:pinData|bootstrapData|__PWS_DATA__)\s*[=:]\s*(\{.*\})\s*;?\s*$").unwrap()
});

const OG_VIDEO_KEYS: &[&str] = &["og:video", "og:video:url", "og:video:secure_url"];

/// 从页面中找到的单个代表性媒体地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedMedia {
    pub url: String,
    pub content_type: ContentType,
    pub title: Option<String>,
}

#[derive(Default)]
struct Candidates {
    videos: Vec<String>,
    images: Vec<String>,
}

impl Candidates {
    fn push(&mut self, url: Option<String>, content_type: ContentType) {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else { return };
        match content_type {
            ContentType::Image => self.images.push(url),
            _ => self.videos.push(url),
        }
    }
}

/// 解析页面 HTML：内嵌的 pin JSON、`<video>` 源、og 元标签、JSON-LD `contentUrl`。
/// 视频优先于图片。
pub fn find_media(html: &str, page_url: &str) -> Option<ScrapedMedia> {
    let document = Html::parse_document(html);
    let mut found = Candidates::default();

    // 1. 内嵌 JSON (pin 数据与 JSON-LD)
    for script in document.select(&SCRIPT_SELECTOR) {
        let text = script.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let is_ld = script.value().attr("type") == Some("application/ld+json");
        let json = serde_json::from_str::<Value>(text).ok().or_else(|| {
            INLINE_JSON_RE
                .captures(text)
                .and_then(|c| serde_json::from_str::<Value>(&c[1]).ok())
        });
        let Some(json) = json else { continue };

        if is_ld {
            for (url, kind) in ld_content_urls(&json) {
                found.push(Some(url), kind);
            }
        } else {
            found.push(best_video_from_json(&json), ContentType::Video);
            found.push(original_image_from_json(&json), ContentType::Image);
        }
    }

    // 2. <video><source>
    for el in document.select(&VIDEO_SRC_SELECTOR) {
        found.push(el.value().attr("src").map(str::to_string), ContentType::Video);
    }

    // 3. og 元标签
    let meta = |key: &str| -> Option<String> {
        document
            .select(&META_SELECTOR)
            .find(|el| {
                let v = el.value();
                v.attr("property").or(v.attr("name")) == Some(key)
            })
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
    };
    for key in OG_VIDEO_KEYS {
        found.push(meta(key), ContentType::Video);
    }
    found.push(meta("og:image"), ContentType::Image);

    let title = meta("og:title").or_else(|| {
        document
            .select(&TITLE_SELECTOR)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    let base = Url::parse(page_url).ok();
    let resolve = |raw: &String| -> Option<String> {
        match &base {
            Some(base) => base.join(raw).ok().map(String::from),
            None => Url::parse(raw).ok().map(String::from),
        }
    };
    let (url, content_type) = found
        .videos
        .iter()
        .find_map(|u| resolve(u).map(|u| (u, ContentType::Video)))
        .or_else(|| found.images.iter().find_map(|u| resolve(u).map(|u| (u, ContentType::Image))))?;
    Some(ScrapedMedia { url, content_type, title })
}

/// 在任意嵌套的 JSON 中寻找 `video_list`，取宽度最大的非 HLS 地址
fn best_video_from_json(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(list)) = map.get("video_list")
                && let Some(url) = best_from_video_list(list)
            {
                return Some(url);
            }
            map.values().find_map(best_video_from_json)
        }
        Value::Array(items) => items.iter().find_map(best_video_from_json),
        _ => None,
    }
}

fn best_from_video_list(list: &Map<String, Value>) -> Option<String> {
    list.values()
        .filter_map(|v| {
            let url = v.get("url")?.as_str()?;
            let width = v.get("width").and_then(Value::as_u64).unwrap_or(0);
            Some((width, url))
        })
        .filter(|(_, url)| !url.contains(".m3u8"))
        .max_by_key(|(width, _)| *width)
        .map(|(_, url)| url.to_string())
}

/// `images.orig.url`
fn original_image_from_json(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map
            .get("images")
            .and_then(|images| images.get("orig"))
            .and_then(|orig| orig.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| map.values().find_map(original_image_from_json)),
        Value::Array(items) => items.iter().find_map(original_image_from_json),
        _ => None,
    }
}

/// JSON-LD 中所有 `contentUrl`，类型取自同级的 `@type`
fn ld_content_urls(value: &Value) -> Vec<(String, ContentType)> {
    let mut out = Vec::new();
    collect_ld(value, &mut out);
    out
}

fn collect_ld(value: &Value, out: &mut Vec<(String, ContentType)>) {
    match value {
        Value::Object(map) => {
            if let Some(url) = map.get("contentUrl").and_then(Value::as_str) {
                let ld_type = map.get("@type").and_then(Value::as_str).unwrap_or_default();
                let kind = if ld_type.contains("Image") { ContentType::Image } else { ContentType::Video };
                out.push((url.to_string(), kind));
            }
            for child in map.values() {
                collect_ld(child, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_ld(v, out)),
        _ => {}
    }
}

/// 直接抓取页面元数据，下载其中的单个媒体地址
pub struct PageScrapeStrategy {
    client: Arc<RobustClient>,
    sessions: SessionRegistry,
}

impl PageScrapeStrategy {
    pub fn new(client: Arc<RobustClient>, sessions: SessionRegistry) -> Self {
        Self { client, sessions }
    }
}

#[async_trait]
impl ExtractionStrategy for PageScrapeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PageScrape
    }

    fn applies_to(&self, job: &AcquisitionJob) -> bool {
        job.platform.supports_page_scrape()
    }

    async fn attempt(&self, job: &AcquisitionJob) -> Result<StrategyOutput, StrategyError> {
        let page_headers = match self.sessions.for_platform(job.platform) {
            Some(session) if session.is_authenticated() => {
                session.rate_limited_wait().await;
                session.get_headers()
            }
            _ => platform_headers(job.platform),
        };

        let (html, final_url) = self.client.fetch_page(&job.target, &page_headers).await?;
        let media = find_media(&html, &final_url)
            .ok_or_else(|| AppError::NoMediaFound(final_url.clone()))?;
        info!("页面中找到媒体地址 ({}): {}", media.content_type, media.url);

        // 媒体 CDN 不需要 cookie
        let path = self
            .client
            .download_to(&media.url, &platform_headers(job.platform), &job.working_dir, &job.base_name)
            .await?;
        debug!("页面抓取下载完成: {}", path.display());

        let content_type = ContentType::from_path(&path).unwrap_or(media.content_type);
        Ok(StrategyOutput {
            title: media.title,
            uploader: None,
            duration_seconds: None,
            payload: MediaPayload::Single(path),
            content_type,
        })
    }
}
