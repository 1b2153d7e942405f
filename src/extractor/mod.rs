// src/extractor/mod.rs

pub mod backend;
pub mod chain;
pub mod failure;
pub mod generic;
pub mod page_scrape;
pub mod post;

pub use backend::{BackendDownload, DownloadTarget, ExtractorOptions, MediaBackend, YtDlp};
pub use chain::StrategyChain;

use crate::{
    error::{AppError, FailureKind},
    models::{ContentType, MediaPayload, MediaRequest, PlatformTag, ProbeInfo, StrategyKind},
};
use async_trait::async_trait;
use std::path::PathBuf;

/// 一次提取所需的全部输入
#[derive(Debug, Clone)]
pub struct AcquisitionJob {
    pub request: MediaRequest,
    /// 交给提取器的目标：规范化后的 URL，或搜索查询
    pub target: String,
    pub platform: PlatformTag,
    pub content_type: ContentType,
    pub probe: Option<ProbeInfo>,
    pub working_dir: PathBuf,
    pub base_name: String,
}

impl AcquisitionJob {
    /// 事先已知是多元素帖子
    pub fn is_known_multi_item(&self) -> bool {
        self.content_type == ContentType::Mixed
            && self.probe.as_ref().is_some_and(ProbeInfo::is_multi_item)
    }

    pub fn destination(&self) -> DownloadTarget {
        DownloadTarget { dir: self.working_dir.clone(), base_name: self.base_name.clone() }
    }

    /// 单文件结果在无法从扩展名判断时使用的类型
    pub fn fallback_content_type(&self) -> ContentType {
        if self.request.audio_only() {
            ContentType::Audio
        } else if self.content_type == ContentType::Mixed {
            ContentType::Video
        } else {
            self.content_type
        }
    }
}

/// 单个策略的产出，由策略链补全为 `ExtractionResult`
#[derive(Debug, Clone)]
pub struct StrategyOutput {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration_seconds: Option<f64>,
    pub payload: MediaPayload,
    pub content_type: ContentType,
}

#[derive(Debug)]
pub enum StrategyError {
    /// DRM / 访问受限 / 年龄限制，继续尝试其它策略没有意义
    Fatal(FailureKind),
    Recoverable(AppError),
}

impl From<AppError> for StrategyError {
    fn from(error: AppError) -> Self {
        match failure::terminal_kind(&error) {
            Some(kind) => StrategyError::Fatal(kind),
            None => StrategyError::Recoverable(error),
        }
    }
}

#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// 该策略对此任务是否适用；不适用的策略被直接跳过
    fn applies_to(&self, job: &AcquisitionJob) -> bool;

    async fn attempt(&self, job: &AcquisitionJob) -> Result<StrategyOutput, StrategyError>;
}
