// src/cache.rs

use crate::{
    config::AppConfig,
    error::FailureKind,
    models::{CacheEntry, ExtractionResult},
    utils,
};
use dashmap::DashMap;
use log::debug;
use std::time::{Duration, Instant};

/// 请求去重与结果缓存。
///
/// 键为规范化 URL 的指纹。维护两个时间窗口：较短的“已处理”抑制窗口，
/// 以及较长的“文件仍在磁盘上，可复用”窗口。过期条目在每次读写前惰性清除。
#[derive(Debug)]
pub struct RequestCache {
    entries: DashMap<String, CacheEntry>,
    suppression_ttl: Duration,
    download_ttl: Duration,
}

impl RequestCache {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_ttls(config.suppression_ttl, config.download_ttl)
    }

    pub fn with_ttls(suppression_ttl: Duration, download_ttl: Duration) -> Self {
        Self { entries: DashMap::new(), suppression_ttl, download_ttl }
    }

    fn retention(&self) -> Duration {
        self.suppression_ttl.max(self.download_ttl)
    }

    /// 清除超过最长保留期的条目，返回清除数量
    pub fn purge_expired(&self) -> usize {
        let retention = self.retention();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.timestamp.elapsed() < retention);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!("缓存清理: 移除 {} 个过期条目", purged);
        }
        purged
    }

    /// 抑制窗口内是否已处理过该 URL (成功或失败)
    pub fn has(&self, canonical_url: &str) -> bool {
        self.purge_expired();
        self.entries
            .get(&utils::fingerprint(canonical_url))
            .is_some_and(|e| e.timestamp.elapsed() < self.suppression_ttl)
    }

    /// 下载窗口内且文件仍在磁盘上的成功结果。
    /// 文件已被删除的条目视为未命中并被移除。
    pub fn get(&self, canonical_url: &str) -> Option<CacheEntry> {
        self.purge_expired();
        let key = utils::fingerprint(canonical_url);
        let entry = self.entries.get(&key)?.clone();
        if entry.timestamp.elapsed() >= self.download_ttl {
            return None;
        }
        let result = entry.result.as_ref()?;
        if !result.has_file_on_disk() {
            debug!("缓存条目 {} 引用的文件已不存在，视为未命中", key);
            self.entries.remove(&key);
            return None;
        }
        Some(entry)
    }

    /// 抑制窗口内记录的失败类型
    pub fn recent_failure(&self, canonical_url: &str) -> Option<FailureKind> {
        self.purge_expired();
        let entry = self.entries.get(&utils::fingerprint(canonical_url))?;
        if entry.timestamp.elapsed() >= self.suppression_ttl {
            return None;
        }
        entry.failure
    }

    pub fn put(&self, canonical_url: &str, result: &ExtractionResult) {
        self.purge_expired();
        let fingerprint = utils::fingerprint(canonical_url);
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            timestamp: Instant::now(),
            primary_path: result.primary_path().map(|p| p.to_path_buf()),
            result: Some(result.clone()),
            failure: None,
        };
        self.entries.insert(fingerprint, entry);
    }

    pub fn put_failure(&self, canonical_url: &str, kind: FailureKind) {
        self.purge_expired();
        let fingerprint = utils::fingerprint(canonical_url);
        let entry = CacheEntry {
            fingerprint: fingerprint.clone(),
            timestamp: Instant::now(),
            primary_path: None,
            result: None,
            failure: Some(kind),
        };
        self.entries.insert(fingerprint, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
