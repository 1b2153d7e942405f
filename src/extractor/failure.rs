// src/extractor/failure.rs

use crate::error::{AppError, FailureKind};
use regex::Regex;
use std::sync::LazyLock;

/// 提取器错误文本到失败类型的映射表，按顺序匹配 (小写子串)。
/// 只收录明确的终止性措辞，宽泛的词 (如 "unavailable") 会误伤传输层错误。
const FAILURE_TABLE: &[(&str, FailureKind)] = &[
    ("drm protected", FailureKind::DrmProtected),
    ("drm-protected", FailureKind::DrmProtected),
    ("drm protection", FailureKind::DrmProtected),
    ("protected by drm", FailureKind::DrmProtected),
    ("copyright grounds", FailureKind::DrmProtected),
    ("copyright claim", FailureKind::DrmProtected),
    ("video unavailable", FailureKind::AccessDenied),
    ("video is unavailable", FailureKind::AccessDenied),
    ("content is unavailable", FailureKind::AccessDenied),
    ("this content is private", FailureKind::AccessDenied),
    ("this video is private", FailureKind::AccessDenied),
    ("private video", FailureKind::AccessDenied),
    ("account is private", FailureKind::AccessDenied),
    ("has been removed", FailureKind::AccessDenied),
    ("access denied", FailureKind::AccessDenied),
    ("age restricted", FailureKind::AgeRestricted),
    ("age-restricted", FailureKind::AgeRestricted),
    ("confirm your age", FailureKind::AgeRestricted),
    ("inappropriate for some users", FailureKind::AgeRestricted),
];

/// 提取器转述的 HTTP 状态错误，例如 "HTTP Error 503: Service Unavailable"
static HTTP_STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"http error \d{3}").unwrap());

/// 对提取器错误文本分类；未命中时返回 `None`，表示可能可恢复。
/// 传输层的 HTTP 状态错误一律视为可恢复，不进入映射表。
pub fn classify_failure(message: &str) -> Option<FailureKind> {
    let lower = message.to_lowercase();
    if HTTP_STATUS_RE.is_match(&lower) {
        return None;
    }
    FAILURE_TABLE
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, kind)| *kind)
}

/// 对策略中产生的错误分类，只有终止性的类型才会返回
pub fn terminal_kind(error: &AppError) -> Option<FailureKind> {
    let kind = match error {
        AppError::DrmProtected | AppError::AccessDenied | AppError::AgeRestricted => {
            Some(error.failure_kind())
        }
        AppError::Extractor(message) => classify_failure(message),
        _ => None,
    };
    kind.filter(|k| k.is_terminal())
}
