// tests/strategy_chain_test.rs

use async_trait::async_trait;
use social_dl::{
    error::{AppError, FailureKind},
    extractor::{AcquisitionJob, ExtractionStrategy, StrategyChain, StrategyError, StrategyOutput},
    models::{ContentType, MediaPayload, MediaRequest, PlatformTag, ProbeInfo, StrategyKind},
};
use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};
use tempfile::TempDir;

#[derive(Clone, Copy)]
enum Behavior {
    Succeed,
    Recoverable,
    Fatal(FailureKind),
    NotApplicable,
}

struct CountingStrategy {
    kind: StrategyKind,
    behavior: Behavior,
    attempts: AtomicU32,
}

impl CountingStrategy {
    fn new(kind: StrategyKind, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self { kind, behavior, attempts: AtomicU32::new(0) })
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionStrategy for CountingStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn applies_to(&self, _job: &AcquisitionJob) -> bool {
        !matches!(self.behavior, Behavior::NotApplicable)
    }

    async fn attempt(&self, job: &AcquisitionJob) -> Result<StrategyOutput, StrategyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => {
                let path = job.working_dir.join(format!("{}.mp4", job.base_name));
                std::fs::write(&path, b"x").map_err(AppError::from)?;
                Ok(StrategyOutput {
                    title: None,
                    uploader: None,
                    duration_seconds: None,
                    payload: MediaPayload::Single(path),
                    content_type: ContentType::Video,
                })
            }
            Behavior::Recoverable => Err(StrategyError::Recoverable(AppError::Extractor("HTTP Error 500".into()))),
            Behavior::Fatal(kind) => Err(StrategyError::Fatal(kind)),
            Behavior::NotApplicable => unreachable!("skipped strategies are never attempted"),
        }
    }
}

fn chain_of(strategies: &[&Arc<CountingStrategy>]) -> StrategyChain {
    StrategyChain::new(
        strategies
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn ExtractionStrategy>)
            .collect(),
    )
}

fn job(dir: &TempDir, content_type: ContentType, probe: Option<ProbeInfo>) -> AcquisitionJob {
    AcquisitionJob {
        request: MediaRequest::new("https://www.instagram.com/p/BGvuInzyFAe/", None, false),
        target: "https://www.instagram.com/p/BGvuInzyFAe/".into(),
        platform: PlatformTag::PhotoSocial,
        content_type,
        probe,
        working_dir: dir.path().to_path_buf(),
        base_name: "job".into(),
    }
}

#[tokio::test]
async fn test_drm_classification_short_circuits_the_chain() {
    let dir = tempfile::tempdir().unwrap();
    let generic = CountingStrategy::new(StrategyKind::Generic, Behavior::Fatal(FailureKind::DrmProtected));
    let scrape = CountingStrategy::new(StrategyKind::PageScrape, Behavior::Succeed);
    let unauth = CountingStrategy::new(StrategyKind::UnauthenticatedGeneric, Behavior::Succeed);
    let chain = chain_of(&[&generic, &scrape, &unauth]);

    let err = chain.acquire(&job(&dir, ContentType::Video, None)).await.unwrap_err();

    assert!(matches!(err, AppError::DrmProtected));
    assert_eq!(generic.attempts(), 1);
    assert_eq!(scrape.attempts(), 0);
    assert_eq!(unauth.attempts(), 0);
}

#[tokio::test]
async fn test_recoverable_failures_fall_through_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let generic = CountingStrategy::new(StrategyKind::Generic, Behavior::Recoverable);
    let scrape = CountingStrategy::new(StrategyKind::PageScrape, Behavior::NotApplicable);
    let post = CountingStrategy::new(StrategyKind::PostDownloader, Behavior::Succeed);
    let unauth = CountingStrategy::new(StrategyKind::UnauthenticatedGeneric, Behavior::Succeed);
    let chain = chain_of(&[&generic, &scrape, &post, &unauth]);

    let result = chain.acquire(&job(&dir, ContentType::Video, None)).await.unwrap();

    assert_eq!(result.source_strategy, StrategyKind::PostDownloader);
    assert_eq!(result.content_type, ContentType::Video);
    // 无标题时回退为文件基名
    assert_eq!(result.title, "job");
    assert_eq!((generic.attempts(), scrape.attempts(), post.attempts(), unauth.attempts()), (1, 0, 1, 0));
}

#[tokio::test]
async fn test_exhausted_chain_reports_download_failed() {
    let dir = tempfile::tempdir().unwrap();
    let generic = CountingStrategy::new(StrategyKind::Generic, Behavior::Recoverable);
    let unauth = CountingStrategy::new(StrategyKind::UnauthenticatedGeneric, Behavior::Recoverable);
    let chain = chain_of(&[&generic, &unauth]);

    let err = chain.acquire(&job(&dir, ContentType::Video, None)).await.unwrap_err();
    assert!(matches!(err, AppError::DownloadFailed));
    assert_eq!((generic.attempts(), unauth.attempts()), (1, 1));
}

#[tokio::test]
async fn test_known_multi_item_post_starts_at_post_downloader() {
    let dir = tempfile::tempdir().unwrap();
    let generic = CountingStrategy::new(StrategyKind::Generic, Behavior::Succeed);
    let post = CountingStrategy::new(StrategyKind::PostDownloader, Behavior::Succeed);
    let chain = chain_of(&[&generic, &post]);
    let probe = ProbeInfo {
        item_types: vec![ContentType::Image, ContentType::Video],
        ..Default::default()
    };

    let result = chain.acquire(&job(&dir, ContentType::Mixed, Some(probe))).await.unwrap();

    assert_eq!(result.source_strategy, StrategyKind::PostDownloader);
    assert_eq!(generic.attempts(), 0);
}
