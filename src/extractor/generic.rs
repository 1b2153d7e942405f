// src/extractor/generic.rs

use super::{
    AcquisitionJob, ExtractionStrategy, ExtractorOptions, MediaBackend, StrategyError, StrategyOutput,
};
use crate::{
    config::AppConfig,
    models::{ContentType, MediaPayload, StrategyKind},
    session::{SessionRegistry, platform_headers},
};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// 通用提取器策略。`authenticated == false` 时为最后兜底的“无认证重试”。
pub struct GenericStrategy {
    backend: Arc<dyn MediaBackend>,
    sessions: SessionRegistry,
    config: Arc<AppConfig>,
    authenticated: bool,
}

impl GenericStrategy {
    pub fn new(backend: Arc<dyn MediaBackend>, sessions: SessionRegistry, config: Arc<AppConfig>) -> Self {
        Self { backend, sessions, config, authenticated: true }
    }

    pub fn unauthenticated(
        backend: Arc<dyn MediaBackend>,
        sessions: SessionRegistry,
        config: Arc<AppConfig>,
    ) -> Self {
        Self { backend, sessions, config, authenticated: false }
    }

    /// 带会话 cookie 与平台请求头的完整选项
    pub fn full_options(&self, job: &AcquisitionJob) -> ExtractorOptions {
        let base = ExtractorOptions::base(
            job.request.format_selector(),
            job.request.audio_only(),
            &self.config,
        );
        match self.sessions.for_platform(job.platform) {
            Some(session) => session.build_extractor_options(base),
            None => {
                let mut options = base;
                options.headers.extend(platform_headers(job.platform));
                options
            }
        }
    }
}

#[async_trait]
impl ExtractionStrategy for GenericStrategy {
    fn kind(&self) -> StrategyKind {
        if self.authenticated { StrategyKind::Generic } else { StrategyKind::UnauthenticatedGeneric }
    }

    fn applies_to(&self, job: &AcquisitionJob) -> bool {
        // 没有可剥离的认证信息时，无认证重试与第一步完全相同
        self.authenticated || self.full_options(job).carries_auth()
    }

    async fn attempt(&self, job: &AcquisitionJob) -> Result<StrategyOutput, StrategyError> {
        let options = if self.authenticated {
            self.full_options(job)
        } else {
            self.full_options(job).stripped()
        };

        if self.authenticated
            && let Some(session) = self.sessions.for_platform(job.platform)
            && session.is_authenticated()
        {
            session.rate_limited_wait().await;
        }

        debug!("{} 策略开始: {}", self.kind(), job.target);
        let download = self.backend.download(&job.target, &options, &job.destination()).await?;
        let content_type = if job.request.audio_only() {
            ContentType::Audio
        } else {
            ContentType::from_path(&download.path).unwrap_or_else(|| job.fallback_content_type())
        };

        Ok(StrategyOutput {
            title: download.title,
            uploader: download.uploader,
            duration_seconds: download.duration_seconds,
            payload: MediaPayload::Single(download.path),
            content_type,
        })
    }
}
