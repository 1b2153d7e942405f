// src/cleanup.rs

use crate::{cache::RequestCache, error::AppResult, models::ExtractionResult};
use log::{debug, info, warn};
use std::{
    path::Path,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::task::JoinHandle;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// 交付完成 (无论成败) 后删除结果的临时目录
pub fn release(result: &ExtractionResult) {
    remove_dir_quietly(&result.working_directory);
}

pub(crate) fn remove_dir_quietly(dir: &Path) {
    if dir.as_os_str().is_empty() || !dir.exists() {
        return;
    }
    match std::fs::remove_dir_all(dir) {
        Ok(()) => debug!("已删除临时目录: {}", dir.display()),
        Err(e) => warn!("删除临时目录 '{}' 失败: {}", dir.display(), e),
    }
}

/// 删除临时根目录下修改时间早于 `max_age` 的条目，返回删除数量
pub fn sweep_scratch(root: &Path, max_age: Duration) -> AppResult<usize> {
    if !root.is_dir() {
        return Ok(0);
    }
    let now = SystemTime::now();
    let mut removed = 0;
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        let age = path
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .map(|modified| now.duration_since(modified).unwrap_or_default());
        if !age.is_some_and(|age| age >= max_age) {
            continue;
        }
        let outcome = if path.is_dir() { std::fs::remove_dir_all(&path) } else { std::fs::remove_file(&path) };
        match outcome {
            Ok(()) => removed += 1,
            Err(e) => warn!("清理过期文件 '{}' 失败: {}", path.display(), e),
        }
    }
    if removed > 0 {
        info!("定期清理: 删除了 {} 个过期的临时条目", removed);
    }
    Ok(removed)
}

/// 后台定期清理：删除过期的临时文件并清除过期缓存条目。
/// 只是兜底，正常情况下由结果的使用方负责清理。
pub fn spawn_sweeper(
    root: impl AsRef<Path> + Send + 'static,
    max_age: Duration,
    interval: Duration,
    cache: Arc<RequestCache>,
) -> JoinHandle<()> {
    // 配置为 0 时 tokio 的 interval 会直接 panic
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_scratch(root.as_ref(), max_age) {
                warn!("定期清理失败: {}", e);
            }
            cache.purge_expired();
        }
    })
}
