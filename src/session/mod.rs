// src/session/mod.rs

pub mod cookies;

use self::cookies::CookieJar;
use crate::{
    client::RobustClient,
    config::{AppConfig, ProxyConfig},
    constants::{headers, templates, user_agents},
    error::{AppError, AppResult},
    extractor::ExtractorOptions,
    models::PlatformTag,
};
use log::{debug, info, warn};
use percent_encoding::percent_decode_str;
use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::{sync::Mutex as TokioMutex, time::Instant};

/// 某个需要登录的平台的会话参数
#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub platform: PlatformTag,
    pub domain: &'static str,
    pub session_cookie: &'static str,
    pub user_cookie: Option<&'static str>,
    /// 会话 ID 的首段是否应等于用户 ID
    pub check_user_prefix: bool,
    pub home_template: Option<&'static str>,
    pub logged_in_markers: &'static [&'static str],
    pub throttled: bool,
}

impl SessionProfile {
    pub fn photo_social() -> Self {
        Self {
            platform: PlatformTag::PhotoSocial,
            domain: "instagram.com",
            session_cookie: "sessionid",
            user_cookie: Some("ds_user_id"),
            check_user_prefix: true,
            home_template: Some(templates::PHOTO_SOCIAL_HOME),
            logged_in_markers: &["\"viewer\":", "\"viewerId\":"],
            throttled: true,
        }
    }

    pub fn short_video() -> Self {
        Self {
            platform: PlatformTag::ShortVideo,
            domain: "tiktok.com",
            session_cookie: "sessionid",
            user_cookie: Some("uid_tt"),
            check_user_prefix: false,
            home_template: Some(templates::SHORT_VIDEO_HOME),
            logged_in_markers: &["\"uniqueId\":"],
            throttled: true,
        }
    }

    /// 视频站的 cookie 只提供给通用提取器，不参与任何判定
    pub fn video_site() -> Self {
        Self {
            platform: PlatformTag::VideoSite,
            domain: "youtube.com",
            session_cookie: "SID",
            user_cookie: None,
            check_user_prefix: false,
            home_template: None,
            logged_in_markers: &[],
            throttled: false,
        }
    }

    pub fn for_platform(platform: PlatformTag) -> Option<Self> {
        match platform.session_platform()? {
            PlatformTag::PhotoSocial => Some(Self::photo_social()),
            PlatformTag::ShortVideo => Some(Self::short_video()),
            PlatformTag::VideoSite => Some(Self::video_site()),
            _ => None,
        }
    }
}

/// 各平台通用的请求头 (不含 Cookie)
pub fn platform_headers(platform: PlatformTag) -> BTreeMap<String, String> {
    let pairs: &[(&str, &str)] = match platform {
        PlatformTag::PhotoSocial | PlatformTag::ThreadedSocial => &[
            ("User-Agent", user_agents::PHOTO_SOCIAL),
            (headers::IG_APP_ID_NAME, headers::IG_APP_ID),
            (headers::REQUESTED_WITH_NAME, headers::REQUESTED_WITH),
        ],
        PlatformTag::PinBoard => &[
            ("User-Agent", user_agents::DEFAULT),
            ("Referer", "https://www.pinterest.com/"),
        ],
        PlatformTag::ShortVideo => &[
            ("User-Agent", user_agents::DEFAULT),
            ("Referer", "https://www.tiktok.com/"),
        ],
        PlatformTag::SocialVideoSite => &[("User-Agent", user_agents::SOCIAL_VIDEO)],
        _ => &[],
    };
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// 单个平台的登录会话：持有 cookie、控制请求节奏、为提取策略提供请求头与选项
#[derive(Debug)]
pub struct SessionManager {
    profile: SessionProfile,
    cookie_file: Option<PathBuf>,
    jar: CookieJar,
    proxy: Option<ProxyConfig>,
    min_interval: Duration,
    last_request: TokioMutex<Option<Instant>>,
}

impl SessionManager {
    pub fn new(
        profile: SessionProfile,
        cookie_file: Option<PathBuf>,
        proxy: Option<ProxyConfig>,
        min_interval: Duration,
    ) -> Self {
        let min_interval = if profile.throttled { min_interval } else { Duration::ZERO };
        Self {
            profile,
            cookie_file,
            jar: CookieJar::default(),
            proxy,
            min_interval,
            last_request: TokioMutex::new(None),
        }
    }

    pub fn platform(&self) -> PlatformTag {
        self.profile.platform
    }

    /// 读取 cookie 文件。文件缺失或不可读时退化为“未登录”，不返回错误。
    pub fn load_credentials(&mut self) -> usize {
        let Some(path) = &self.cookie_file else {
            debug!("平台 {} 未配置 cookie 文件", self.profile.platform);
            return 0;
        };
        if !path.is_file() {
            warn!("平台 {} 的 cookie 文件不存在: {}", self.profile.platform, path.display());
            self.jar = CookieJar::default();
            return 0;
        }
        match CookieJar::load(path, self.profile.domain) {
            Ok(jar) => {
                // 只记录名称，不记录值
                info!(
                    "平台 {} 已加载 {} 个 cookie: {:?}",
                    self.profile.platform,
                    jar.len(),
                    jar.names()
                );
                self.jar = jar;
                if self.is_authenticated() {
                    self.check_user_consistency();
                } else {
                    warn!("平台 {} 的 cookie 缺少登录所需字段", self.profile.platform);
                }
            }
            Err(e) => {
                warn!("平台 {} 的 cookie 文件读取失败: {}", self.profile.platform, e);
                self.jar = CookieJar::default();
            }
        }
        self.jar.len()
    }

    pub fn is_authenticated(&self) -> bool {
        let has_session = self.jar.get(self.profile.session_cookie).is_some();
        let has_user = self.profile.user_cookie.is_none_or(|name| self.jar.get(name).is_some());
        has_session && has_user
    }

    /// 会话 ID 首段与用户 ID 不一致时仅给出警告
    fn check_user_consistency(&self) -> bool {
        if !self.profile.check_user_prefix {
            return true;
        }
        let (Some(session), Some(user)) = (
            self.jar.get(self.profile.session_cookie),
            self.profile.user_cookie.and_then(|name| self.jar.get(name)),
        ) else {
            return false;
        };
        let decoded = percent_decode_str(session).decode_utf8_lossy();
        let prefix = decoded.split(':').next().unwrap_or_default();
        if prefix != user {
            warn!(
                "平台 {} 的会话 ID 与用户 ID 不一致，cookie 可能来自不同账号",
                self.profile.platform
            );
            return false;
        }
        true
    }

    /// 平台请求头，已登录时附带 Cookie
    pub fn get_headers(&self) -> BTreeMap<String, String> {
        let mut map = platform_headers(self.profile.platform);
        if !self.jar.is_empty() {
            map.insert("Cookie".into(), self.jar.header_value());
        }
        map
    }

    /// 保证同一平台相邻两次请求之间至少间隔 `min_interval`。
    /// 等待期间持有锁，使并发请求依次排队。
    pub async fn rate_limited_wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("平台 {} 限速等待 {:?}", self.profile.platform, wait);
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// 在基础选项上合并 cookie 文件、代理与平台请求头
    pub fn build_extractor_options(&self, mut base: ExtractorOptions) -> ExtractorOptions {
        if !self.jar.is_empty()
            && let Some(path) = &self.cookie_file
        {
            base.cookie_file = Some(path.clone());
        }
        if base.proxy.is_none() {
            base.proxy = self.proxy.as_ref().map(ProxyConfig::url);
        }
        base.headers.extend(platform_headers(self.profile.platform));
        debug!(
            "平台 {} 提取器选项: cookie 文件={}, 代理={}, 请求头={:?}",
            self.profile.platform,
            base.cookie_file.is_some(),
            base.proxy.is_some(),
            base.headers.keys().collect::<Vec<_>>()
        );
        base
    }

    /// 访问平台首页检查登录状态。403 视为失效。
    pub async fn validate(&self, client: &RobustClient, config: &AppConfig) -> AppResult<bool> {
        if !self.is_authenticated() {
            return Ok(false);
        }
        let Some(url) = self.profile.home_template.and_then(|key| config.render_template(key, &[]))
        else {
            return Ok(true);
        };
        self.rate_limited_wait().await;
        match client.fetch_text(&url, &self.get_headers()).await {
            Ok(body) => {
                let valid = self.profile.logged_in_markers.iter().any(|m| body.contains(m));
                info!("平台 {} 登录状态检查: {}", self.profile.platform, valid);
                Ok(valid)
            }
            Err(AppError::HttpStatus { status: 403, .. }) => {
                warn!("平台 {} 返回 403，cookie 已失效", self.profile.platform);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// 进程内共享的会话集合，按平台索引
#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    sessions: HashMap<PlatformTag, Arc<SessionManager>>,
}

impl SessionRegistry {
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::default();
        for profile in [
            SessionProfile::photo_social(),
            SessionProfile::short_video(),
            SessionProfile::video_site(),
        ] {
            let cookie_file = config.cookie_file_for(profile.platform).cloned();
            let mut manager = SessionManager::new(
                profile,
                cookie_file,
                config.proxy.clone(),
                config.session_min_interval,
            );
            manager.load_credentials();
            registry.insert(manager);
        }
        registry
    }

    pub fn insert(&mut self, manager: SessionManager) {
        self.sessions.insert(manager.platform(), Arc::new(manager));
    }

    /// 平台所使用的会话 (例如 threaded-social 复用 photo-social 的会话)
    pub fn for_platform(&self, platform: PlatformTag) -> Option<Arc<SessionManager>> {
        self.sessions.get(&platform.session_platform()?).cloned()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<SessionManager>> {
        self.sessions.values()
    }
}
