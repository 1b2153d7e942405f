// src/extractor/chain.rs

use super::{AcquisitionJob, ExtractionStrategy, StrategyError, StrategyOutput};
use crate::{
    error::{AppError, AppResult},
    models::{ContentType, ExtractionResult, MediaPayload, StrategyKind},
};
use log::{debug, info, warn};
use std::sync::Arc;

/// 按顺序尝试的提取策略。
///
/// 策略严格串行执行，第一个成功的结果立即返回；DRM / 访问受限 /
/// 年龄限制类失败直接终止整条链，其余失败记录警告后继续下一个策略。
#[derive(Clone)]
pub struct StrategyChain {
    strategies: Vec<Arc<dyn ExtractionStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Arc<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// 已知为多元素帖子时，从专用帖子下载器开始，跳过注定失败的通用提取
    fn entry_index(&self, job: &AcquisitionJob) -> usize {
        if !job.is_known_multi_item() {
            return 0;
        }
        self.strategies
            .iter()
            .position(|s| s.kind() == StrategyKind::PostDownloader)
            .unwrap_or(0)
    }

    pub async fn acquire(&self, job: &AcquisitionJob) -> AppResult<ExtractionResult> {
        let start = self.entry_index(job);
        if start > 0 {
            debug!("多元素帖子，直接从帖子下载器开始: {}", job.target);
        }

        for strategy in &self.strategies[start..] {
            let kind = strategy.kind();
            if !strategy.applies_to(job) {
                debug!("策略 {} 不适用于 {}，跳过", kind, job.platform);
                continue;
            }
            match strategy.attempt(job).await {
                Ok(output) => {
                    info!("策略 {} 成功: {}", kind, job.target);
                    return Ok(Self::finish(job, kind, output));
                }
                Err(StrategyError::Fatal(failure)) => {
                    warn!("策略 {} 遇到不可重试的失败 ({:?})，终止: {}", kind, failure, job.target);
                    return Err(failure.into());
                }
                Err(StrategyError::Recoverable(e)) => {
                    warn!("策略 {} 失败，尝试下一个: {}", kind, e);
                }
            }
        }
        Err(AppError::DownloadFailed)
    }

    fn finish(job: &AcquisitionJob, kind: StrategyKind, output: StrategyOutput) -> ExtractionResult {
        let (payload, content_type) = match output.payload {
            MediaPayload::Items(mut items) if items.len() == 1 => {
                let only = items.remove(0);
                (MediaPayload::Single(only.path), only.content_type)
            }
            MediaPayload::Items(items) => (MediaPayload::Items(items), ContentType::Mixed),
            MediaPayload::Single(path) => {
                let content_type = match output.content_type {
                    ContentType::Mixed => job.fallback_content_type(),
                    concrete => concrete,
                };
                (MediaPayload::Single(path), content_type)
            }
        };

        let probe = job.probe.as_ref();
        let title = output
            .title
            .filter(|t| !t.trim().is_empty())
            .or_else(|| probe.and_then(|p| p.title.clone()))
            .unwrap_or_else(|| job.base_name.clone());
        let uploader = output
            .uploader
            .or_else(|| probe.and_then(|p| p.uploader.clone()))
            .unwrap_or_else(|| "未知".to_string());
        let duration = output.duration_seconds.or_else(|| probe.and_then(|p| p.duration_seconds));

        ExtractionResult {
            title,
            uploader,
            duration_seconds: duration.map_or(0, |d| d.max(0.0).round() as u64),
            platform: job.platform,
            content_type,
            source_strategy: kind,
            payload,
            created_at: chrono::Utc::now(),
            working_directory: job.working_dir.clone(),
        }
    }
}
