// src/music.rs

use crate::{
    client::RobustClient,
    config::AppConfig,
    constants::{self, user_agents},
    error::{AppError, AppResult},
    utils,
};
use log::{debug, info};
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    sync::{Arc, LazyLock},
};
use url::Url;

static PARENTHETICAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SONG_BY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.+?)\s+-\s+(?:song(?: and lyrics)?|single|ep) by\s+(.+?)(?:\s*\|.*)?$").unwrap());
static META_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta[content]").unwrap());
static LD_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

const SEARCH_PREFIX: &str = "ytsearch1:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl MusicKind {
    fn path_segment(self) -> &'static str {
        match self {
            MusicKind::Track => "track",
            MusicKind::Album => "album",
            MusicKind::Artist => "artist",
            MusicKind::Playlist => "playlist",
        }
    }
}

/// 音乐链接转换后的视频站搜索
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicQuery {
    pub kind: MusicKind,
    /// 交给通用提取器的搜索目标 (`ytsearch1:...`)
    pub search_target: String,
    pub display_title: String,
    pub artist: Option<String>,
    /// 已清理的文件名 (不含扩展名)
    pub file_name: String,
}

/// 从链接路径中解析类型与 ID，兼容 `/intl-xx/track/<id>` 形式
pub fn parse_music_url(url: &str) -> Option<(MusicKind, String)> {
    let url = Url::parse(url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    segments.windows(2).find_map(|pair| {
        let kind = match pair[0] {
            "track" => MusicKind::Track,
            "album" => MusicKind::Album,
            "artist" => MusicKind::Artist,
            "playlist" => MusicKind::Playlist,
            _ => return None,
        };
        Some((kind, pair[1].to_string()))
    })
}

fn clean_text(text: &str) -> String {
    let t = PARENTHETICAL_RE.replace_all(text, " ");
    WHITESPACE_RE.replace_all(&t, " ").trim().to_string()
}

fn strip_site_suffix(title: &str) -> &str {
    title.split(" | ").next().unwrap_or(title).trim()
}

/// 拆分曲目页标题，返回 (曲名, 艺人)
fn split_track_title(title: &str) -> (String, Option<String>) {
    if let Some(caps) = SONG_BY_RE.captures(title) {
        return (caps[1].to_string(), Some(caps[2].to_string()));
    }
    let title = strip_site_suffix(title);
    if let Some((track, artist)) = title.split_once(" · ") {
        return (track.to_string(), Some(artist.to_string()));
    }
    if let Some((artist, track)) = title.split_once(" - ") {
        return (track.to_string(), Some(artist.to_string()));
    }
    (title.to_string(), None)
}

/// JSON-LD `MusicRecording` 中的曲名与艺人
fn recording_from_ld(document: &Html) -> Option<(Option<String>, Option<String>)> {
    document.select(&LD_SELECTOR).find_map(|script| {
        let json: Value = serde_json::from_str(&script.text().collect::<String>()).ok()?;
        if json.get("@type").and_then(Value::as_str) != Some("MusicRecording") {
            return None;
        }
        let name = json.get("name").and_then(Value::as_str).map(str::to_string);
        let artist = match json.get("byArtist") {
            Some(Value::Array(list)) => list.first().and_then(|a| a.get("name")),
            Some(obj) => obj.get("name"),
            None => None,
        }
        .and_then(Value::as_str)
        .map(str::to_string);
        Some((name, artist))
    })
}

/// 解析音乐页面元数据，生成搜索查询与文件名
pub fn parse_music_page(html: &str, kind: MusicKind) -> Option<MusicQuery> {
    let document = Html::parse_document(html);
    let meta = |key: &str| -> String {
        document
            .select(&META_SELECTOR)
            .find(|el| {
                let v = el.value();
                v.attr("property").or(v.attr("name")) == Some(key)
            })
            .and_then(|el| el.value().attr("content"))
            .unwrap_or_default()
            .to_string()
    };
    let title = meta("og:title");
    let description = meta("og:description");
    // 描述通常以 “艺人 · …” 开头
    let desc_lead = description
        .split(" · ")
        .next()
        .map(clean_text)
        .filter(|s| !s.is_empty() && description.contains(" · "));

    let (query, display_title, artist, file_stem) = match kind {
        MusicKind::Track => {
            let (mut track, mut artist) = split_track_title(&title);
            if (track.is_empty() || artist.is_none())
                && let Some((ld_name, ld_artist)) = recording_from_ld(&document)
            {
                track = ld_name.filter(|n| !n.is_empty()).unwrap_or(track);
                artist = artist.or(ld_artist);
            }
            let artist = artist.or(desc_lead).map(|a| clean_text(&a)).filter(|a| !a.is_empty());
            let track = clean_text(&track);
            if track.is_empty() {
                return None;
            }
            let display = match &artist {
                Some(a) => format!("{} - {}", a, track),
                None => track.clone(),
            };
            let query = format!("{} {} official audio", track, artist.as_deref().unwrap_or_default());
            (query, display.clone(), artist, display)
        }
        MusicKind::Artist => {
            let artist = clean_text(strip_site_suffix(&title));
            if artist.is_empty() {
                return None;
            }
            (format!("{} greatest hits", artist), format!("{} Top Tracks", artist), Some(artist.clone()), artist)
        }
        MusicKind::Album | MusicKind::Playlist => {
            let name = clean_text(strip_site_suffix(&title));
            if name.is_empty() {
                return None;
            }
            let suffix = if kind == MusicKind::Album { "full album" } else { "playlist" };
            let query = match &desc_lead {
                Some(owner) => format!("{} {} {}", name, owner, suffix),
                None => format!("{} {}", name, suffix),
            };
            let display = match &desc_lead {
                Some(owner) => format!("{} - {}", name, owner),
                None => name,
            };
            (query, display.clone(), desc_lead, display)
        }
    };

    let query = WHITESPACE_RE.replace_all(&query, " ").trim().to_string();
    Some(MusicQuery {
        kind,
        search_target: format!("{}{}", SEARCH_PREFIX, query),
        display_title,
        artist,
        file_name: utils::sanitize_filename(&file_stem),
    })
}

/// 将音乐流媒体链接转换为视频站搜索。音乐平台的媒体从不直接下载。
pub struct MusicResolver {
    client: Arc<RobustClient>,
    config: Arc<AppConfig>,
}

impl MusicResolver {
    pub fn new(client: Arc<RobustClient>, config: Arc<AppConfig>) -> Self {
        Self { client, config }
    }

    pub async fn resolve(&self, url: &str) -> AppResult<MusicQuery> {
        let (kind, id) = parse_music_url(url)
            .ok_or_else(|| AppError::UnsupportedPlatform(format!("无法识别的音乐链接: {}", url)))?;
        let page_url = self
            .config
            .render_template(constants::templates::MUSIC_TRACK_PAGE, &[("kind", kind.path_segment()), ("id", &id)])
            .unwrap_or_else(|| url.to_string());
        debug!("获取音乐页面: {}", page_url);

        let headers = BTreeMap::from([("User-Agent".to_string(), user_agents::DEFAULT.to_string())]);
        let html = self.client.fetch_text(&page_url, &headers).await?;
        let query = parse_music_page(&html, kind)
            .ok_or_else(|| AppError::NoMediaFound(format!("音乐页面缺少可用的元数据: {}", url)))?;
        info!("音乐链接已转换为搜索: {} -> {}", url, query.search_target);
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(title: &str, description: &str, extra: &str) -> String {
        format!(
            r#"<html><head><meta property="og:title" content="{}"><meta property="og:description" content="{}">{}</head></html>"#,
            title, description, extra
        )
    }

    #[test]
    fn test_parse_music_url() {
        assert_eq!(
            parse_music_url("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=x"),
            Some((MusicKind::Track, "4uLU6hMCjMI75M1A2tKUQC".to_string()))
        );
        assert_eq!(
            parse_music_url("https://open.spotify.com/intl-de/album/abc"),
            Some((MusicKind::Album, "abc".to_string()))
        );
        assert_eq!(parse_music_url("https://open.spotify.com/"), None);
    }

    #[test]
    fn test_track_with_middot_title() {
        let q = parse_music_page(&page("Never Gonna Give You Up · Rick Astley", "", ""), MusicKind::Track).unwrap();
        assert_eq!(q.search_target, "ytsearch1:Never Gonna Give You Up Rick Astley official audio");
        assert_eq!(q.file_name, "Rick Astley - Never Gonna Give You Up");
    }

    #[test]
    fn test_track_song_by_title_and_parentheses() {
        let q = parse_music_page(
            &page("Blinding Lights (Remastered) - song and lyrics by The Weeknd | Spotify", "", ""),
            MusicKind::Track,
        )
        .unwrap();
        assert_eq!(q.artist.as_deref(), Some("The Weeknd"));
        assert_eq!(q.file_name, "The Weeknd - Blinding Lights");
    }

    #[test]
    fn test_track_from_json_ld() {
        let ld = r#"<script type="application/ld+json">{"@type":"MusicRecording","name":"Halo","byArtist":[{"name":"Beyoncé"}]}</script>"#;
        let q = parse_music_page(&page("Halo", "", ld), MusicKind::Track).unwrap();
        assert_eq!(q.display_title, "Beyoncé - Halo");
        assert_eq!(q.file_name, "Beyonce - Halo");
    }

    #[test]
    fn test_album_and_artist_queries() {
        let album = parse_music_page(&page("Thriller | Spotify", "Michael Jackson · Album · 1982", ""), MusicKind::Album).unwrap();
        assert_eq!(album.search_target, "ytsearch1:Thriller Michael Jackson full album");

        let artist = parse_music_page(&page("Adele | Spotify", "", ""), MusicKind::Artist).unwrap();
        assert_eq!(artist.search_target, "ytsearch1:Adele greatest hits");
        assert_eq!(artist.display_title, "Adele Top Tracks");
    }

    #[test]
    fn test_empty_page_yields_none() {
        assert!(parse_music_page("<html></html>", MusicKind::Track).is_none());
    }
}
