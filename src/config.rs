// src/config.rs

pub mod file;

use self::file::{env_var, load_or_create_external_config};
use crate::{cli::Cli, constants, error::AppResult, models::PlatformTag};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::PathBuf, time::Duration};

/// 代理服务器配置，统一作用于 HTTP 客户端与提取器
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass: Option<String>,
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        match (&self.user, &self.pass) {
            (Some(user), Some(pass)) => format!("http://{}:{}@{}:{}", user, pass, self.host, self.port),
            _ => format!("http://{}:{}", self.host, self.port),
        }
    }

    /// 从 PROXY_HOST / PROXY_PORT / PROXY_USER / PROXY_PASS 读取
    pub fn from_env() -> Option<Self> {
        let host = env_var("PROXY_HOST")?;
        let port = env_var("PROXY_PORT")?.trim().parse().ok()?;
        Some(Self { host, port, user: env_var("PROXY_USER"), pass: env_var("PROXY_PASS") })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CookieFilesConfig {
    pub photo_social: Option<PathBuf>,
    pub short_video: Option<PathBuf>,
    pub video_site: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    pub suppression_ttl_secs: Option<u64>,
    pub download_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScratchConfig {
    pub dir: Option<PathBuf>,
    pub max_age_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtractorConfig {
    pub ytdlp_bin: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalConfig {
    #[serde(default)]
    pub cookies: CookieFilesConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scratch: ScratchConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    pub session_min_interval_secs: Option<u64>,
    pub max_delivery_mb: Option<u64>,
    #[serde(default = "default_url_templates")]
    pub url_templates: HashMap<String, String>,
}

fn default_url_templates() -> HashMap<String, String> {
    use constants::templates::*;
    HashMap::from([
        (PHOTO_POST_INFO.into(), "https://i.instagram.com/api/v1/media/{media_id}/info/".into()),
        (MUSIC_TRACK_PAGE.into(), "https://open.spotify.com/{kind}/{id}".into()),
        (PHOTO_SOCIAL_HOME.into(), "https://www.instagram.com/".into()),
        (SHORT_VIDEO_HOME.into(), "https://www.tiktok.com/".into()),
    ])
}

impl ExternalConfig {
    pub(crate) fn default_app_config() -> Self {
        let network_config = NetworkConfig {
            connect_timeout_secs: Some(constants::CONNECT_TIMEOUT.as_secs()),
            timeout_secs: Some(constants::SOCKET_TIMEOUT.as_secs()),
            max_retries: Some(constants::MAX_RETRIES),
        };

        Self {
            cookies: CookieFilesConfig::default(),
            proxy: None,
            network: network_config,
            cache: CacheConfig {
                suppression_ttl_secs: Some(constants::SUPPRESSION_TTL.as_secs()),
                download_ttl_secs: Some(constants::DOWNLOAD_TTL.as_secs()),
            },
            scratch: ScratchConfig {
                dir: None,
                max_age_secs: Some(constants::SCRATCH_MAX_AGE.as_secs()),
                sweep_interval_secs: Some(constants::SWEEP_INTERVAL.as_secs()),
            },
            extractor: ExtractorConfig {
                ytdlp_bin: Some(constants::DEFAULT_YTDLP_BIN.into()),
                timeout_secs: Some(constants::EXTRACTOR_TIMEOUT.as_secs()),
            },
            session_min_interval_secs: Some(constants::SESSION_MIN_INTERVAL.as_secs()),
            max_delivery_mb: Some(constants::MAX_DELIVERY_BYTES / 1024 / 1024),
            url_templates: default_url_templates(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub max_workers: usize,
    pub save_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub suppression_ttl: Duration,
    pub download_ttl: Duration,
    pub scratch_max_age: Duration,
    pub sweep_interval: Duration,
    pub session_min_interval: Duration,
    pub ytdlp_bin: String,
    pub extractor_timeout: Duration,
    pub max_delivery_bytes: u64,
    pub cookie_files: CookieFilesConfig,
    pub proxy: Option<ProxyConfig>,
    pub url_templates: HashMap<String, String>,
}

impl AppConfig {
    pub fn new(args: &Cli) -> AppResult<Self> {
        let external_config = load_or_create_external_config()?;
        let secs = |v: Option<u64>, default: Duration| v.map_or(default, Duration::from_secs);

        // 命令行 > 配置文件
        let file_cookies = external_config.cookies;
        let cookie_files = CookieFilesConfig {
            photo_social: args.cookies.clone().or(file_cookies.photo_social),
            short_video: args.short_video_cookies.clone().or(file_cookies.short_video),
            video_site: args.video_site_cookies.clone().or(file_cookies.video_site),
        };

        // 环境变量 > 配置文件
        let proxy = ProxyConfig::from_env().or(external_config.proxy);
        let ytdlp_bin = env_var("SOCIAL_DL_YTDLP")
            .or(external_config.extractor.ytdlp_bin)
            .unwrap_or_else(|| constants::DEFAULT_YTDLP_BIN.into());

        let scratch_dir = external_config
            .scratch
            .dir
            .unwrap_or_else(|| std::env::temp_dir().join(constants::SCRATCH_DIR_NAME));

        let mut url_templates = default_url_templates();
        url_templates.extend(external_config.url_templates);

        Ok(Self {
            max_workers: args.workers.unwrap_or(3).max(1),
            save_dir: args.output.clone(),
            scratch_dir,
            user_agent: constants::user_agents::DEFAULT.into(),
            connect_timeout: secs(external_config.network.connect_timeout_secs, constants::CONNECT_TIMEOUT),
            timeout: secs(external_config.network.timeout_secs, constants::SOCKET_TIMEOUT),
            max_retries: external_config.network.max_retries.unwrap_or(constants::MAX_RETRIES),
            suppression_ttl: secs(external_config.cache.suppression_ttl_secs, constants::SUPPRESSION_TTL),
            download_ttl: secs(external_config.cache.download_ttl_secs, constants::DOWNLOAD_TTL),
            scratch_max_age: secs(external_config.scratch.max_age_secs, constants::SCRATCH_MAX_AGE),
            sweep_interval: secs(external_config.scratch.sweep_interval_secs, constants::SWEEP_INTERVAL),
            session_min_interval: secs(external_config.session_min_interval_secs, constants::SESSION_MIN_INTERVAL),
            ytdlp_bin,
            extractor_timeout: secs(external_config.extractor.timeout_secs, constants::EXTRACTOR_TIMEOUT),
            max_delivery_bytes: external_config
                .max_delivery_mb
                .map_or(constants::MAX_DELIVERY_BYTES, |mb| mb * 1024 * 1024),
            cookie_files,
            proxy,
            url_templates,
        })
    }

    pub fn cookie_file_for(&self, platform: PlatformTag) -> Option<&PathBuf> {
        match platform {
            PlatformTag::PhotoSocial => self.cookie_files.photo_social.as_ref(),
            PlatformTag::ShortVideo => self.cookie_files.short_video.as_ref(),
            PlatformTag::VideoSite => self.cookie_files.video_site.as_ref(),
            _ => None,
        }
    }

    /// 取出 URL 模板并替换 `{key}` 占位符
    pub fn render_template(&self, key: &str, params: &[(&str, &str)]) -> Option<String> {
        let mut url = self.url_templates.get(key)?.clone();
        for (name, value) in params {
            url = url.replace(&format!("{{{}}}", name), value);
        }
        Some(url)
    }
}

#[cfg(feature = "testing")]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            save_dir: std::env::temp_dir().join("social-dl-test-output"),
            scratch_dir: std::env::temp_dir().join("social-dl-test-scratch"),
            user_agent: "test-agent/1.0".to_string(),
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            max_retries: 1,
            suppression_ttl: constants::SUPPRESSION_TTL,
            download_ttl: constants::DOWNLOAD_TTL,
            scratch_max_age: constants::SCRATCH_MAX_AGE,
            sweep_interval: constants::SWEEP_INTERVAL,
            session_min_interval: Duration::ZERO,
            ytdlp_bin: constants::DEFAULT_YTDLP_BIN.to_string(),
            extractor_timeout: Duration::from_secs(30),
            max_delivery_bytes: constants::MAX_DELIVERY_BYTES,
            cookie_files: CookieFilesConfig::default(),
            proxy: None,
            url_templates: HashMap::new(),
        }
    }
}
