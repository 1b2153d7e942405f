// tests/pipeline_test.rs

use async_trait::async_trait;
use social_dl::{
    client::RobustClient,
    config::AppConfig,
    constants::templates,
    error::{AppError, AppResult},
    extractor::{BackendDownload, DownloadTarget, ExtractorOptions, MediaBackend},
    models::{ContentType, FormatInfo, MediaPayload, MediaRequest, PlatformTag, ProbeInfo, StrategyKind},
    pipeline::Pipeline,
    session::{SessionManager, SessionProfile, SessionRegistry},
};
use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::{Duration, Instant},
};
use tempfile::TempDir;

/// 不启动子进程的提取器替身：在目标目录写入一个小文件
struct FakeBackend {
    extension: &'static str,
    fail_with: Option<&'static str>,
    probes: AtomicU32,
    downloads: AtomicU32,
    targets: Mutex<Vec<String>>,
    calls: Mutex<Vec<(&'static str, Instant)>>,
}

impl FakeBackend {
    fn new(extension: &'static str) -> Self {
        Self {
            extension,
            fail_with: None,
            probes: AtomicU32::new(0),
            downloads: AtomicU32::new(0),
            targets: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing(message: &'static str) -> Self {
        Self { fail_with: Some(message), ..Self::new("mp4") }
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn probe(&self, _target: &str, _options: &ExtractorOptions) -> AppResult<ProbeInfo> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(("probe", Instant::now()));
        Ok(ProbeInfo {
            title: Some("Probe Title".into()),
            formats: vec![FormatInfo { vcodec: Some("avc1".into()), acodec: Some("mp4a".into()) }],
            ..Default::default()
        })
    }

    async fn download(
        &self,
        target: &str,
        _options: &ExtractorOptions,
        dest: &DownloadTarget,
    ) -> AppResult<BackendDownload> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().unwrap().push(target.to_string());
        self.calls.lock().unwrap().push(("download", Instant::now()));
        if let Some(message) = self.fail_with {
            return Err(AppError::Extractor(message.to_string()));
        }
        let path = dest.dir.join(format!("{}.{}", dest.base_name, self.extension));
        std::fs::write(&path, b"media-bytes")?;
        Ok(BackendDownload {
            path,
            title: Some("Fake Title".into()),
            uploader: Some("Fake Uploader".into()),
            duration_seconds: Some(212.4),
        })
    }
}

fn test_config(scratch: &TempDir) -> AppConfig {
    AppConfig { scratch_dir: scratch.path().join("scratch"), ..AppConfig::default() }
}

fn build_pipeline(config: AppConfig, backend: Arc<FakeBackend>, sessions: SessionRegistry) -> Pipeline {
    let config = Arc::new(config);
    let client = Arc::new(RobustClient::new(config.clone()).expect("client"));
    Pipeline::new(config, client, backend, sessions)
}

/// 写入 cookie 文件并创建已登录的会话
fn logged_in_sessions(
    dir: &TempDir,
    profile: SessionProfile,
    cookies: &str,
    min_interval: Duration,
) -> SessionRegistry {
    let cookie_path = dir.path().join(format!("{}_cookies.txt", profile.platform));
    std::fs::write(&cookie_path, format!("# Netscape HTTP Cookie File\n{}", cookies)).unwrap();
    let mut manager = SessionManager::new(profile, Some(cookie_path), None, min_interval);
    manager.load_credentials();
    assert!(manager.is_authenticated());
    let mut sessions = SessionRegistry::default();
    sessions.insert(manager);
    sessions
}

const SHORT_VIDEO_COOKIES: &str = ".tiktok.com\tTRUE\t/\tTRUE\t0\tsessionid\tabc123\n\
                                   .tiktok.com\tTRUE\t/\tTRUE\t0\tuid_tt\t42\n";
const VIDEO_SITE_COOKIES: &str = ".youtube.com\tTRUE\t/\tTRUE\t0\tSID\tsid-value\n";

fn scratch_entries(config_dir: &Path) -> usize {
    std::fs::read_dir(config_dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_short_form_link_is_normalized_before_extraction() {
    let scratch = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new("mp4"));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://youtube.com/shorts/abcdEFGhijk?feature=share", None, false);
    let result = pipeline.process(&request).await.unwrap();

    assert_eq!(
        backend.targets.lock().unwrap().as_slice(),
        ["https://www.youtube.com/watch?v=abcdEFGhijk"]
    );
    assert_eq!(result.platform, PlatformTag::VideoSite);
    assert_eq!(result.content_type, ContentType::Video);
    assert_eq!(result.source_strategy, StrategyKind::Generic);
    assert_eq!(result.title, "Fake Title");
    assert_eq!(result.duration_seconds, 212);
    assert!(matches!(&result.payload, MediaPayload::Single(p) if p.is_file()));
}

#[tokio::test]
async fn test_repeat_request_is_served_from_cache() {
    let scratch = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new("mp4"));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://www.youtube.com/watch?v=4H-ckF9H_y0", None, false);
    let first = pipeline.process(&request).await.unwrap();
    let second = pipeline.process(&request).await.unwrap();

    assert_eq!(backend.downloads.load(Ordering::SeqCst), 1);
    assert_eq!(first.primary_path(), second.primary_path());
    assert_eq!(pipeline.cache().len(), 1);
}

#[tokio::test]
async fn test_cached_result_with_missing_file_is_fetched_again() {
    let scratch = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new("mp4"));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://www.youtube.com/watch?v=4H-ckF9H_y0", None, false);
    let first = pipeline.process(&request).await.unwrap();
    social_dl::cleanup::release(&first);

    let second = pipeline.process(&request).await.unwrap();
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 2);
    assert!(second.has_file_on_disk());
}

#[tokio::test]
async fn test_unknown_platform_makes_no_extraction_attempt() {
    let scratch = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new("mp4"));
    let config = test_config(&scratch);
    let scratch_dir = config.scratch_dir.clone();
    let pipeline = build_pipeline(config, backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://example.org/some/video", None, false);
    let err = pipeline.process(&request).await.unwrap_err();

    assert!(matches!(err, AppError::UnsupportedPlatform(_)));
    assert_eq!(backend.probes.load(Ordering::SeqCst), 0);
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 0);
    assert_eq!(scratch_entries(&scratch_dir), 0);
}

#[tokio::test]
async fn test_drm_failure_is_terminal_and_suppressed() {
    let scratch = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::failing("ERROR: This video is DRM protected"));
    let config = test_config(&scratch);
    let scratch_dir = config.scratch_dir.clone();
    let pipeline = build_pipeline(config, backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://www.youtube.com/watch?v=4H-ckF9H_y0", None, false);
    let err = pipeline.process(&request).await.unwrap_err();
    assert!(matches!(err, AppError::DrmProtected));
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 1);
    // 失败时临时目录已被删除
    assert_eq!(scratch_entries(&scratch_dir), 0);

    // 抑制期内不再重复尝试
    let again = pipeline.process(&request).await.unwrap_err();
    assert!(matches!(again, AppError::DrmProtected));
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generic_failure_is_not_suppressed() {
    let scratch = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::failing("ERROR: unable to download webpage: timed out"));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://www.youtube.com/watch?v=4H-ckF9H_y0", None, false);
    let err = pipeline.process(&request).await.unwrap_err();
    assert!(matches!(err, AppError::DownloadFailed));

    pipeline.process(&request).await.unwrap_err();
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_audio_only_request_skips_probe() {
    let scratch = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::new("mp3"));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://www.youtube.com/watch?v=4H-ckF9H_y0", None, true);
    let result = pipeline.process(&request).await.unwrap();

    assert_eq!(backend.probes.load(Ordering::SeqCst), 0);
    assert_eq!(result.content_type, ContentType::Audio);
}

#[tokio::test]
async fn test_music_link_becomes_audio_search() {
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/track/4uLU6hMCjMI75M1A2tKUQC")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(
            r#"<html><head><meta property="og:title" content="Never Gonna Give You Up · Rick Astley"></head></html>"#,
        )
        .create_async()
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let mut config = test_config(&scratch);
    config
        .url_templates
        .insert(templates::MUSIC_TRACK_PAGE.to_string(), format!("{}/{{kind}}/{{id}}", server.url()));
    let backend = Arc::new(FakeBackend::new("mp3"));
    let pipeline = build_pipeline(config, backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC", None, false);
    let result = pipeline.process(&request).await.unwrap();

    page.assert_async().await;
    let targets = backend.targets.lock().unwrap().clone();
    assert_eq!(targets.len(), 1);
    assert!(targets[0].starts_with("ytsearch1:Never Gonna Give You Up Rick Astley"));
    assert_eq!(result.platform, PlatformTag::MusicStream);
    assert_eq!(result.content_type, ContentType::Audio);
    assert_eq!(result.uploader, "Rick Astley");
    let file_name = result.primary_path().and_then(|p| p.file_name()).and_then(|n| n.to_str());
    assert_eq!(file_name, Some("Rick Astley - Never Gonna Give You Up.mp3"));
}

#[tokio::test]
async fn test_carousel_post_downloads_every_item_in_order() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    let post_json = format!(
        r#"{{"items":[{{"media_type":8,"caption":{{"text":"Holiday"}},"user":{{"username":"traveler"}},"carousel_media":[
            {{"media_type":1,"image_versions2":{{"candidates":[{{"url":"{base}/cdn/one.jpg"}}]}}}},
            {{"media_type":2,"video_versions":[{{"url":"{base}/cdn/two.mp4"}}]}},
            {{"media_type":1,"image_versions2":{{"candidates":[{{"url":"{base}/cdn/three.jpg"}}]}}}}
        ]}}]}}"#
    );
    let info = server
        .mock("GET", "/api/v1/media/1274440122209161246/info/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(post_json)
        .expect(1)
        .create_async()
        .await;
    let one = server
        .mock("GET", "/cdn/one.jpg")
        .with_header("content-type", "image/jpeg")
        .with_body("jpeg-1")
        .create_async()
        .await;
    let two = server
        .mock("GET", "/cdn/two.mp4")
        .with_header("content-type", "video/mp4")
        .with_body("mp4-2")
        .create_async()
        .await;
    let three = server
        .mock("GET", "/cdn/three.jpg")
        .with_header("content-type", "image/jpeg")
        .with_body("jpeg-3")
        .create_async()
        .await;

    let scratch = tempfile::tempdir().unwrap();
    let cookie_path = scratch.path().join("cookies.txt");
    std::fs::write(
        &cookie_path,
        "# Netscape HTTP Cookie File\n\
         .instagram.com\tTRUE\t/\tTRUE\t0\tsessionid\t1234%3Aabcdef\n\
         .instagram.com\tTRUE\t/\tTRUE\t0\tds_user_id\t1234\n",
    )
    .unwrap();
    let mut manager =
        SessionManager::new(SessionProfile::photo_social(), Some(cookie_path), None, Duration::ZERO);
    assert_eq!(manager.load_credentials(), 2);
    let mut sessions = SessionRegistry::default();
    sessions.insert(manager);

    let mut config = test_config(&scratch);
    config.url_templates.insert(
        templates::PHOTO_POST_INFO.to_string(),
        format!("{}/api/v1/media/{{media_id}}/info/", base),
    );
    let backend = Arc::new(FakeBackend::new("mp4"));
    let pipeline = build_pipeline(config, backend.clone(), sessions);

    let request = MediaRequest::new("https://www.instagram.com/p/BGvuInzyFAe/", None, false);
    let result = pipeline.process(&request).await.unwrap();

    // 预探测取到的帖子被复用，接口只调用一次；通用提取器不参与
    info.assert_async().await;
    one.assert_async().await;
    two.assert_async().await;
    three.assert_async().await;
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 0);

    assert_eq!(result.source_strategy, StrategyKind::PostDownloader);
    assert_eq!(result.content_type, ContentType::Mixed);
    assert_eq!(result.uploader, "traveler");
    let MediaPayload::Items(items) = &result.payload else {
        panic!("expected multi-item payload, got {:?}", result.payload);
    };
    let types: Vec<ContentType> = items.iter().map(|i| i.content_type).collect();
    assert_eq!(types, [ContentType::Image, ContentType::Video, ContentType::Image]);
    let contents: Vec<String> = items.iter().map(|i| std::fs::read_to_string(&i.path).unwrap()).collect();
    assert_eq!(contents, ["jpeg-1", "mp4-2", "jpeg-3"]);
}

#[tokio::test]
async fn test_server_error_reported_by_extractor_is_not_suppressed() {
    let scratch = tempfile::tempdir().unwrap();
    let backend = Arc::new(FakeBackend::failing(
        "ERROR: [youtube] 4H-ckF9H_y0: Unable to download webpage: HTTP Error 503: Service Unavailable",
    ));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), SessionRegistry::default());

    let request = MediaRequest::new("https://www.youtube.com/watch?v=4H-ckF9H_y0", None, false);
    let first = pipeline.process(&request).await.unwrap_err();
    assert!(matches!(first, AppError::DownloadFailed));

    // 服务端临时故障不进入抑制窗口，再次请求会重新尝试
    let second = pipeline.process(&request).await.unwrap_err();
    assert!(matches!(second, AppError::DownloadFailed));
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_private_content_skips_unauthenticated_retry() {
    let scratch = tempfile::tempdir().unwrap();
    let sessions =
        logged_in_sessions(&scratch, SessionProfile::short_video(), SHORT_VIDEO_COOKIES, Duration::ZERO);
    let backend = Arc::new(FakeBackend::failing("ERROR: [TikTok] 7234567890123456789: This video is private"));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), sessions);

    let request = MediaRequest::new("https://www.tiktok.com/@someone/video/7234567890123456789", None, false);
    let err = pipeline.process(&request).await.unwrap_err();

    assert!(matches!(err, AppError::AccessDenied));
    // 带认证的第一步失败后即终止，无认证重试不会执行
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 1);

    let again = pipeline.process(&request).await.unwrap_err();
    assert!(matches!(again, AppError::AccessDenied));
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_age_restriction_skips_unauthenticated_retry() {
    let scratch = tempfile::tempdir().unwrap();
    let sessions =
        logged_in_sessions(&scratch, SessionProfile::video_site(), VIDEO_SITE_COOKIES, Duration::ZERO);
    let backend = Arc::new(FakeBackend::failing(
        "ERROR: [youtube] 4H-ckF9H_y0: Sign in to confirm your age. This video may be inappropriate for some users.",
    ));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), sessions);

    let request = MediaRequest::new("https://www.youtube.com/watch?v=4H-ckF9H_y0", None, false);
    let err = pipeline.process(&request).await.unwrap_err();

    assert!(matches!(err, AppError::AgeRestricted));
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_recoverable_failure_with_cookies_falls_back_to_unauthenticated_retry() {
    let scratch = tempfile::tempdir().unwrap();
    let sessions =
        logged_in_sessions(&scratch, SessionProfile::video_site(), VIDEO_SITE_COOKIES, Duration::ZERO);
    let backend = Arc::new(FakeBackend::failing("ERROR: unable to extract player response"));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), sessions);

    let request = MediaRequest::new("https://www.youtube.com/watch?v=4H-ckF9H_y0", None, false);
    let err = pipeline.process(&request).await.unwrap_err();

    assert!(matches!(err, AppError::DownloadFailed));
    // 通用提取 + 无认证重试
    assert_eq!(backend.downloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_authenticated_probe_and_download_are_spaced_by_min_interval() {
    let scratch = tempfile::tempdir().unwrap();
    let min_interval = Duration::from_millis(300);
    let sessions =
        logged_in_sessions(&scratch, SessionProfile::short_video(), SHORT_VIDEO_COOKIES, min_interval);
    let backend = Arc::new(FakeBackend::new("mp4"));
    let pipeline = build_pipeline(test_config(&scratch), backend.clone(), sessions);

    let request = MediaRequest::new("https://www.tiktok.com/@someone/video/7234567890123456789", None, false);
    let result = pipeline.process(&request).await.unwrap();
    assert_eq!(result.platform, PlatformTag::ShortVideo);

    let calls = backend.calls.lock().unwrap().clone();
    let names: Vec<&str> = calls.iter().map(|(name, _)| *name).collect();
    assert_eq!(names, ["probe", "download"]);
    let gap = calls[1].1.duration_since(calls[0].1);
    assert!(gap >= min_interval, "authenticated calls only {:?} apart", gap);
}
