// src/error.rs

use thiserror::Error;

/// 对外暴露的失败类型，交付端据此选择提示文案。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    DrmProtected,
    AccessDenied,
    AgeRestricted,
    DownloadFailed,
    UnsupportedPlatform,
}

impl FailureKind {
    /// 是否值得在同一请求内继续尝试其它策略
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FailureKind::DrmProtected | FailureKind::AccessDenied | FailureKind::AgeRestricted
        )
    }

    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::DrmProtected => "该内容受版权保护 (DRM)，无法下载。",
            FailureKind::AccessDenied => "内容为私密、已删除，或当前凭据无权访问。",
            FailureKind::AgeRestricted => "该内容受年龄限制，平台策略禁止下载。",
            FailureKind::DownloadFailed => {
                "下载失败。请检查平台 cookies 是否过期，并稍后重试。"
            }
            FailureKind::UnsupportedPlatform => "不支持的平台或无效链接。",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("内容受版权保护 (DRM)")]
    DrmProtected,
    #[error("访问被拒绝 (私密 / 不可用)")]
    AccessDenied,
    #[error("内容受年龄限制")]
    AgeRestricted,
    #[error("所有提取策略均已失败")]
    DownloadFailed,
    #[error("不支持的平台: {0}")]
    UnsupportedPlatform(String),
    #[error("提取器错误: {0}")]
    Extractor(String),
    #[error("提取器进程超时 ({0} 秒)")]
    ExtractorTimeout(u64),
    #[error("操作超时: {0} ({1} 秒)")]
    Timeout(String, u64),
    #[error("页面中未找到可用的媒体地址: {0}")]
    NoMediaFound(String),
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("HTTP 状态异常: {status} ({url})")]
    HttpStatus { status: u16, url: String },
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("无法解析来自 '{url}' 的API响应: {source}")]
    ApiParseFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),
    #[error("用户中断")]
    UserInterrupt,
    #[error("{0}")] // 只打印内部信息，不加任何前缀
    UserInputError(String),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// 网络抖动、超时、服务端 5xx / 429 等值得原样重试的错误
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Network(_) | AppError::NetworkMiddleware(_) | AppError::Timeout(..) => true,
            AppError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AppError::DrmProtected => FailureKind::DrmProtected,
            AppError::AccessDenied => FailureKind::AccessDenied,
            AppError::AgeRestricted => FailureKind::AgeRestricted,
            AppError::UnsupportedPlatform(_) => FailureKind::UnsupportedPlatform,
            _ => FailureKind::DownloadFailed,
        }
    }
}

impl From<FailureKind> for AppError {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::DrmProtected => AppError::DrmProtected,
            FailureKind::AccessDenied => AppError::AccessDenied,
            FailureKind::AgeRestricted => AppError::AgeRestricted,
            FailureKind::DownloadFailed => AppError::DownloadFailed,
            FailureKind::UnsupportedPlatform => AppError::UnsupportedPlatform(String::new()),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        assert_eq!(AppError::DrmProtected.failure_kind(), FailureKind::DrmProtected);
        assert_eq!(
            AppError::UnsupportedPlatform("x".into()).failure_kind(),
            FailureKind::UnsupportedPlatform
        );
        // 中间错误一律归为 DownloadFailed
        assert_eq!(
            AppError::Extractor("boom".into()).failure_kind(),
            FailureKind::DownloadFailed
        );
        assert!(FailureKind::AgeRestricted.is_terminal());
        assert!(!FailureKind::DownloadFailed.is_terminal());
    }

    #[test]
    fn test_transient_errors() {
        assert!(AppError::HttpStatus { status: 503, url: "u".into() }.is_transient());
        assert!(AppError::HttpStatus { status: 429, url: "u".into() }.is_transient());
        assert!(!AppError::HttpStatus { status: 404, url: "u".into() }.is_transient());
        assert!(!AppError::DrmProtected.is_transient());
    }

    #[test]
    fn test_only_download_failed_suggests_retry() {
        let kinds = [
            FailureKind::DrmProtected,
            FailureKind::AccessDenied,
            FailureKind::AgeRestricted,
            FailureKind::UnsupportedPlatform,
        ];
        for kind in kinds {
            assert!(!kind.user_message().contains("稍后重试"));
        }
        assert!(FailureKind::DownloadFailed.user_message().contains("稍后重试"));
    }
}
