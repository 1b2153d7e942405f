// src/extractor/backend.rs

use crate::{
    config::AppConfig,
    constants::formats,
    error::*,
    models::{ProbeInfo, api::ExtractorInfo},
    retry::{RetryPolicy, with_retry},
};
use async_trait::async_trait;
use log::{debug, info};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;

/// 传给通用提取器的选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractorOptions {
    pub format: String,
    pub audio_only: bool,
    pub cookie_file: Option<PathBuf>,
    pub proxy: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub socket_timeout: Duration,
    pub retries: u32,
    pub timeout: Duration,
}

impl ExtractorOptions {
    pub fn base(format: &str, audio_only: bool, config: &AppConfig) -> Self {
        Self {
            format: format.to_string(),
            audio_only,
            cookie_file: None,
            proxy: config.proxy.as_ref().map(|p| p.url()),
            headers: BTreeMap::new(),
            socket_timeout: config.timeout,
            retries: config.max_retries,
            timeout: config.extractor_timeout,
        }
    }

    /// 去掉 cookie 与平台请求头，仅保留格式、代理与网络参数
    pub fn stripped(&self) -> Self {
        Self { cookie_file: None, headers: BTreeMap::new(), ..self.clone() }
    }

    pub fn carries_auth(&self) -> bool {
        self.cookie_file.is_some() || !self.headers.is_empty()
    }
}

/// 下载目标：临时目录与不含扩展名的文件名
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    pub dir: PathBuf,
    pub base_name: String,
}

#[derive(Debug, Clone)]
pub struct BackendDownload {
    pub path: PathBuf,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// 通用媒体提取器
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// 只读取元数据，不下载
    async fn probe(&self, target: &str, options: &ExtractorOptions) -> AppResult<ProbeInfo>;

    async fn download(
        &self,
        target: &str,
        options: &ExtractorOptions,
        dest: &DownloadTarget,
    ) -> AppResult<BackendDownload>;
}

/// 以子进程方式调用 yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlp {
    bin: String,
}

impl YtDlp {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    fn common_args(options: &ExtractorOptions) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            options.socket_timeout.as_secs().max(1).to_string(),
            "--retries".to_string(),
            options.retries.to_string(),
            "--fragment-retries".to_string(),
            options.retries.to_string(),
        ];
        if let Some(cookie_file) = &options.cookie_file {
            args.push("--cookies".into());
            args.push(cookie_file.to_string_lossy().into_owned());
        }
        if let Some(proxy) = &options.proxy {
            args.push("--proxy".into());
            args.push(proxy.clone());
        }
        for (name, value) in &options.headers {
            args.push("--add-header".into());
            args.push(format!("{}:{}", name, value));
        }
        args
    }

    pub fn probe_args(target: &str, options: &ExtractorOptions) -> Vec<String> {
        let mut args = vec!["--dump-single-json".to_string(), "--skip-download".to_string()];
        args.extend(Self::common_args(options));
        args.push(target.to_string());
        args
    }

    pub fn download_args(target: &str, options: &ExtractorOptions, dest: &DownloadTarget) -> Vec<String> {
        let template = dest.dir.join(format!("{}.%(ext)s", dest.base_name));
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--no-simulate".to_string(),
            "--no-playlist".to_string(),
            "-f".to_string(),
            options.format.clone(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
        ];
        if options.audio_only {
            args.extend(
                ["-x", "--audio-format", formats::AUDIO_CODEC, "--audio-quality", formats::AUDIO_QUALITY]
                    .map(String::from),
            );
        } else {
            args.extend(["--merge-output-format", formats::MERGE_CONTAINER].map(String::from));
        }
        args.extend(Self::common_args(options));
        args.push(target.to_string());
        args
    }

    async fn run(&self, args: Vec<String>, timeout: Duration) -> AppResult<ExtractorInfo> {
        let policy = RetryPolicy::single(timeout);
        let (bin, args) = (&self.bin, &args);
        let output = with_retry(&policy, bin, |_| false, || async move {
            Ok::<_, AppError>(Command::new(bin)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await?)
        })
        .await
        .map_err(|e| match e {
            AppError::Timeout(_, secs) => AppError::ExtractorTimeout(secs),
            other => other,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .filter(|l| !l.trim().is_empty())
                .last()
                .unwrap_or("提取器异常退出")
                .trim()
                .to_string();
            return Err(AppError::Extractor(message));
        }
        serde_json::from_slice(&output.stdout).map_err(AppError::from)
    }
}

#[async_trait]
impl MediaBackend for YtDlp {
    async fn probe(&self, target: &str, options: &ExtractorOptions) -> AppResult<ProbeInfo> {
        debug!("探测: {}", target);
        let info = self.run(Self::probe_args(target, options), options.timeout).await?;
        Ok(info.into_probe())
    }

    async fn download(
        &self,
        target: &str,
        options: &ExtractorOptions,
        dest: &DownloadTarget,
    ) -> AppResult<BackendDownload> {
        info!("通用提取器下载: {} (格式: {})", target, options.format);
        let info = self.run(Self::download_args(target, options, dest), options.timeout).await?;

        let reported = info.downloaded_files().map(PathBuf::from).find(|p| p.is_file());
        let path = match reported {
            Some(path) => path,
            None => find_output_file(&dest.dir, &dest.base_name)?
                .ok_or_else(|| AppError::NoMediaFound(format!("提取器未生成文件: {}", target)))?,
        };

        Ok(BackendDownload {
            path,
            uploader: info.uploader_name().map(str::to_string),
            duration_seconds: info.duration_seconds(),
            title: info.title,
        })
    }
}

/// 在目录中查找以 `base_name` 开头、已完成的输出文件
pub fn find_output_file(dir: &Path, base_name: &str) -> AppResult<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if path.is_file()
            && name.starts_with(base_name)
            && !name.ends_with(".part")
            && !name.ends_with(".ytdl")
        {
            let size = path.metadata().map(|m| m.len()).unwrap_or(0);
            candidates.push((size, path));
        }
    }
    // 合并前的分轨文件可能残留，取最大的那个
    Ok(candidates.into_iter().max_by_key(|(size, _)| *size).map(|(_, p)| p))
}
