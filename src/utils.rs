// src/utils.rs

use crate::constants;
use md5::{Digest, Md5};
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

static ILLEGAL_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());
static DOTS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BRACKETS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[()\[\]]").unwrap());
static UNSAFE_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s\-.]").unwrap());

/// 将人类可读的标题转为安全的文件名 (不含扩展名)。
///
/// 转写为 ASCII、去掉非法字符、合并空白，最长
/// `MAX_FILENAME_CHARS` 个字符并尽量在单词边界截断；结果过短时
/// 退回到基于时间戳的占位名。
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();

    let mut name = ILLEGAL_CHARS_RE.replace_all(&ascii, "").into_owned();
    name = DOTS_RE.replace_all(&name, ".").into_owned();
    name = WHITESPACE_RE.replace_all(&name, " ").into_owned();
    name = name.trim_matches(|c: char| c == '.' || c == ' ').to_string();

    name = name.replace('&', "and").replace('#', "no").replace('%', "percent");
    name = BRACKETS_RE.replace_all(&name, "").into_owned();
    name = UNSAFE_CHARS_RE.replace_all(&name, "").into_owned();
    name = WHITESPACE_RE.replace_all(&name, " ").trim().to_string();

    if name.len() > constants::MAX_FILENAME_CHARS {
        // 此时只剩 ASCII，按字节切分是安全的
        let head = &name[..constants::MAX_FILENAME_CHARS];
        let min_cut = constants::MAX_FILENAME_CHARS * 7 / 10;
        name = match head.rfind(' ') {
            Some(pos) if pos > min_cut => head[..pos].to_string(),
            _ => head.to_string(),
        };
    }
    let name = name.trim_end_matches(|c: char| ".,!?;:-_ ".contains(c));

    if name.len() < constants::MIN_FILENAME_CHARS {
        return format!("audio_{}", chrono::Local::now().timestamp());
    }
    name.to_string()
}

/// 规范化 URL 的指纹 (md5 十六进制)，用作缓存键与临时文件名前缀
pub fn fingerprint(canonical_url: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(canonical_url.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn truncate_text(text: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut end_pos = 0;
    for (i, c) in text.char_indices() {
        width += if c.is_ascii() { 1 } else { 2 };
        if width > max_width.saturating_sub(3) {
            end_pos = i;
            break;
        }
    }
    if end_pos == 0 { text.to_string() } else { format!("{}...", &text[..end_pos]) }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 { format!("{} {}", bytes, UNITS[0]) } else { format!("{:.2} {}", size, UNITS[unit]) }
}
