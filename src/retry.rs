// src/retry.rs

use crate::error::{AppError, AppResult};
use log::{debug, warn};
use std::{future::Future, time::Duration};

/// 统一的重试策略：最大尝试次数、单次超时、指数退避的初始间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration, backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), timeout, backoff }
    }

    /// 只尝试一次，仅施加超时 (提取器进程自带重试)
    pub fn single(timeout: Duration) -> Self {
        Self::new(1, timeout, Duration::ZERO)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1 << attempt.saturating_sub(1).min(16))
    }
}

/// 按策略执行 `op`。每次尝试都受超时约束；只有 `is_retryable` 返回 true
/// 的错误才会重试，其余错误立即返回。
pub async fn with_retry<T, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    is_retryable: P,
    mut op: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
    P: Fn(&AppError) -> bool,
{
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(label.to_string(), policy.timeout.as_secs())),
        };
        match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!("'{}' 第 {} 次尝试成功", label, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "'{}' 第 {}/{} 次尝试失败: {}，{:?} 后重试",
                    label, attempt, policy.max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
