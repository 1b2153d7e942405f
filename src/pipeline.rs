// src/pipeline.rs

use crate::{
    cache::RequestCache,
    classifier,
    client::RobustClient,
    config::AppConfig,
    error::{AppError, AppResult},
    extractor::{
        AcquisitionJob, MediaBackend, StrategyChain, failure,
        generic::GenericStrategy,
        page_scrape::PageScrapeStrategy,
        post::{PostDownloadStrategy, extract_shortcode},
    },
    models::{ContentType, ExtractionResult, MediaRequest, PlatformTag, ProbeInfo},
    music::MusicResolver,
    platform,
    session::SessionRegistry,
    utils,
};
use log::{debug, info, warn};
use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
};

/// 媒体获取流水线：URL -> 平台识别 -> 缓存 -> 类型判定 -> 策略链 -> 结果。
///
/// 缓存与会话在进程启动时创建并通过引用共享；不同 URL 的请求可以并发处理。
pub struct Pipeline {
    config: Arc<AppConfig>,
    cache: Arc<RequestCache>,
    sessions: SessionRegistry,
    backend: Arc<dyn MediaBackend>,
    post: Arc<PostDownloadStrategy>,
    music: MusicResolver,
    chain: StrategyChain,
}

impl Pipeline {
    /// 标准策略顺序：通用提取 -> 页面抓取 -> 帖子下载器 -> 无认证重试
    pub fn new(
        config: Arc<AppConfig>,
        client: Arc<RobustClient>,
        backend: Arc<dyn MediaBackend>,
        sessions: SessionRegistry,
    ) -> Self {
        let post = Arc::new(PostDownloadStrategy::new(client.clone(), sessions.clone(), config.clone()));
        let chain = StrategyChain::new(vec![
            Arc::new(GenericStrategy::new(backend.clone(), sessions.clone(), config.clone())),
            Arc::new(PageScrapeStrategy::new(client.clone(), sessions.clone())),
            post.clone(),
            Arc::new(GenericStrategy::unauthenticated(backend.clone(), sessions.clone(), config.clone())),
        ]);
        Self {
            cache: Arc::new(RequestCache::new(&config)),
            music: MusicResolver::new(client, config.clone()),
            config,
            sessions,
            backend,
            post,
            chain,
        }
    }

    /// 替换策略链 (用于测试注入)
    pub fn with_chain(mut self, chain: StrategyChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub async fn process(&self, request: &MediaRequest) -> AppResult<ExtractionResult> {
        let platform = platform::identify(request.url());
        if platform == PlatformTag::Unknown {
            info!("不支持的链接: {}", request.url());
            return Err(AppError::UnsupportedPlatform(request.url().to_string()));
        }
        let canonical = platform::normalize(request.url());
        debug!("平台 {}，规范化链接: {}", platform, canonical);

        if let Some(entry) = self.cache.get(&canonical)
            && let Some(result) = entry.result
        {
            info!("命中缓存 ({}): {}", entry.fingerprint, canonical);
            return Ok(result);
        }
        if self.cache.has(&canonical) {
            if let Some(kind) = self.cache.recent_failure(&canonical) {
                info!("链接近期已失败 ({:?})，不再重复尝试: {}", kind, canonical);
                return Err(kind.into());
            }
            debug!("链接已处理过但文件已不在磁盘上，重新获取: {}", canonical);
        }

        let outcome = self.acquire(request, platform, &canonical).await;
        match &outcome {
            Ok(result) => self.cache.put(&canonical, result),
            Err(e) => {
                let kind = e.failure_kind();
                if kind.is_terminal() {
                    self.cache.put_failure(&canonical, kind);
                }
            }
        }
        outcome
    }

    async fn acquire(
        &self,
        request: &MediaRequest,
        platform: PlatformTag,
        canonical: &str,
    ) -> AppResult<ExtractionResult> {
        let fingerprint = utils::fingerprint(canonical);
        let stamp = chrono::Utc::now().timestamp_millis();
        let base_name = format!("{}_{}", &fingerprint[..8], stamp);

        if platform == PlatformTag::MusicStream {
            return self.acquire_music(canonical, &base_name).await;
        }

        let mut job = AcquisitionJob {
            request: request.clone(),
            target: canonical.to_string(),
            platform,
            content_type: ContentType::Mixed,
            probe: None,
            working_dir: PathBuf::new(),
            base_name: base_name.clone(),
        };

        let url_type = classifier::classify_url(canonical);
        if !request.audio_only() && matches!(url_type, None | Some(ContentType::Mixed)) {
            job.probe = self.probe(&job).await?;
        }
        job.content_type = if request.audio_only() {
            ContentType::Audio
        } else {
            classifier::classify(canonical, job.probe.as_ref())
        };
        info!("内容类型判定为 {}: {}", job.content_type, canonical);

        job.working_dir = self.create_working_dir(&base_name)?;
        self.run_chain(&job).await
    }

    /// 音乐平台的链接转为视频站搜索，只取音频，文件名为 “艺人 - 曲名”
    async fn acquire_music(&self, canonical: &str, dir_name: &str) -> AppResult<ExtractionResult> {
        let query = self.music.resolve(canonical).await?;
        let job = AcquisitionJob {
            request: MediaRequest::new(canonical, None, true),
            target: query.search_target.clone(),
            platform: PlatformTag::VideoSite,
            content_type: ContentType::Audio,
            probe: None,
            working_dir: self.create_working_dir(dir_name)?,
            base_name: query.file_name.clone(),
        };
        let mut result = self.run_chain(&job).await?;
        result.platform = PlatformTag::MusicStream;
        result.title = query.display_title;
        if let Some(artist) = query.artist {
            result.uploader = artist;
        }
        Ok(result)
    }

    /// 预探测。失败时不影响后续流程，但 DRM 等终止性失败会直接返回。
    async fn probe(&self, job: &AcquisitionJob) -> AppResult<Option<ProbeInfo>> {
        let outcome = if job.platform.supports_carousel() && extract_shortcode(&job.target).is_some() {
            self.post.probe(&job.target, job.platform).await
        } else {
            let options = GenericStrategy::new(self.backend.clone(), self.sessions.clone(), self.config.clone())
                .full_options(job);
            // 带 cookie 的探测同样计入平台的请求节奏
            if let Some(session) = self.sessions.for_platform(job.platform)
                && session.is_authenticated()
            {
                session.rate_limited_wait().await;
            }
            self.backend.probe(&job.target, &options).await
        };
        match outcome {
            Ok(probe) => Ok(Some(probe)),
            Err(e) => match failure::terminal_kind(&e) {
                Some(kind) => Err(kind.into()),
                None => {
                    warn!("预探测失败，继续处理: {}", e);
                    Ok(None)
                }
            },
        }
    }

    async fn run_chain(&self, job: &AcquisitionJob) -> AppResult<ExtractionResult> {
        let outcome = self.chain.acquire(job).await.and_then(|result| {
            if result.has_file_on_disk() {
                Ok(result)
            } else {
                warn!("策略返回的文件不存在: {:?}", result.paths());
                Err(AppError::DownloadFailed)
            }
        });
        if outcome.is_err() {
            crate::cleanup::remove_dir_quietly(&job.working_dir);
        }
        outcome
    }

    /// 每次获取独占一个新的临时目录，从不复用
    fn create_working_dir(&self, base_name: &str) -> AppResult<PathBuf> {
        std::fs::create_dir_all(&self.config.scratch_dir)?;
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 { base_name.to_string() } else { format!("{}_{}", base_name, attempt) };
            let dir = self.config.scratch_dir.join(name);
            match std::fs::create_dir(&dir) {
                Ok(()) => return Ok(dir),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < 100 => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
