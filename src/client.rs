// src/client.rs

use crate::{config::AppConfig, error::*};
use futures::StreamExt;
use log::debug;
use reqwest::{
    Response,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

#[derive(Clone)]
pub struct RobustClient {
    pub client: ClientWithMiddleware,
    config: Arc<AppConfig>,
}

impl RobustClient {
    /// 网络请求的重试只在中间件这一层进行 (首次 + `max_retries` 次)。
    /// 超时按读取间隔计算而不是整个请求，大文件只要持续有数据就不会被中断。
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(500), Duration::from_secs(8))
            .build_with_max_retries(config.max_retries);
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.timeout)
            .pool_max_idle_per_host(config.max_workers * 3);
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.url())?);
        }
        let client = ClientBuilder::new(builder.build()?)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn header_map(headers: &BTreeMap<String, String>) -> HeaderMap {
        headers
            .iter()
            .filter_map(|(k, v)| {
                Some((HeaderName::from_bytes(k.as_bytes()).ok()?, HeaderValue::from_str(v).ok()?))
            })
            .collect()
    }

    /// 发送 GET 请求，非 2xx 状态统一转为 `AppError::HttpStatus`
    pub async fn get(&self, url: &str, headers: &BTreeMap<String, String>) -> AppResult<Response> {
        let res = self.client.get(url).headers(Self::header_map(headers)).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus { status: status.as_u16(), url: url.to_string() });
        }
        Ok(res)
    }

    pub async fn fetch_text(&self, url: &str, headers: &BTreeMap<String, String>) -> AppResult<String> {
        Ok(self.fetch_page(url, headers).await?.0)
    }

    /// 获取页面文本及跟随重定向后的最终地址
    pub async fn fetch_page(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> AppResult<(String, String)> {
        let res = self.get(url, headers).await?;
        let final_url = res.url().to_string();
        if final_url != url {
            debug!("'{}' 重定向至 '{}'", url, final_url);
        }
        Ok((res.text().await?, final_url))
    }

    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> AppResult<T> {
        let text = self.fetch_text(url, headers).await?;
        serde_json::from_str(&text)
            .map_err(|source| AppError::ApiParseFailed { url: url.to_string(), source })
    }

    /// 以流式 GET 下载到 `dir/{base_name}.{ext}`，扩展名取自响应的 Content-Type。
    /// 先写入同目录下的临时文件，完成后再改名，避免留下半截文件。
    pub async fn download_to(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
        dir: &Path,
        base_name: &str,
    ) -> AppResult<PathBuf> {
        let res = self.get(url, headers).await?;
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let ext = extension_for(&content_type, url);

        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        let mut stream = res.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        file.flush()?;
        if written == 0 {
            return Err(AppError::NoMediaFound(format!("'{}' 返回了空内容", url)));
        }

        let target = dir.join(format!("{}.{}", base_name, ext));
        file.persist(&target)?;
        debug!("已下载 {} 字节 ({}) 至 {}", written, content_type, target.display());
        Ok(target)
    }
}

/// 由 Content-Type 推断扩展名，无法判断时退回 URL 路径中的扩展名
pub fn extension_for(content_type: &str, url: &str) -> String {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let from_mime = match mime.as_str() {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" | "audio/x-m4a" => Some("m4a"),
        "audio/ogg" => Some("ogg"),
        _ => None,
    };
    if let Some(ext) = from_mime {
        return ext.to_string();
    }
    let from_url = url::Url::parse(url).ok().and_then(|u| {
        Path::new(u.path())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .filter(|e| e.len() <= 4 && e.chars().all(|c| c.is_ascii_alphanumeric()))
    });
    from_url.unwrap_or_else(|| {
        if mime.starts_with("video/") {
            "mp4".into()
        } else if mime.starts_with("audio/") {
            "mp3".into()
        } else {
            "jpg".into()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("video/mp4", "https://a/b"), "mp4");
        assert_eq!(extension_for("image/jpeg; charset=binary", "https://a/b.png"), "jpg");
        assert_eq!(extension_for("application/octet-stream", "https://a/b.webm?x=1"), "webm");
        assert_eq!(extension_for("", "https://a/b"), "jpg");
        assert_eq!(extension_for("video/x-unknown", "https://a/b"), "mp4");
    }
}
