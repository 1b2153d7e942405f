// src/session/cookies.rs

use crate::error::AppResult;
use anyhow::Context;
use std::{fmt, fs, path::Path};

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub expires: i64,
    pub name: String,
    pub value: String,
}

/// Netscape 格式 cookies.txt 中属于某一域名的 cookie 集合
#[derive(Clone, Default)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

// 调试输出只包含名称，避免 cookie 值进入日志
impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieJar").field("names", &self.names()).finish()
    }
}

impl CookieJar {
    /// 解析 Netscape cookie 文件内容，只保留作用域为 `domain_suffix` 的条目。
    /// 格式: domain \t flag \t path \t secure \t expiry \t name \t value
    pub fn parse(content: &str, domain_suffix: &str) -> Self {
        let suffix = domain_suffix.trim_start_matches('.').to_ascii_lowercase();
        let cookies = content
            .lines()
            .filter_map(|raw| {
                let line = raw.trim_end_matches(['\r', '\n']);
                let line = match line.strip_prefix(HTTP_ONLY_PREFIX) {
                    Some(rest) => rest,
                    None if line.trim_start().starts_with('#') => return None,
                    None => line,
                };
                if line.trim().is_empty() {
                    return None;
                }
                let parts: Vec<&str> = line.split('\t').collect();
                if parts.len() < 7 {
                    log::debug!("跳过格式不正确的 cookie 行 ({} 列)", parts.len());
                    return None;
                }
                let domain = parts[0].trim().trim_start_matches('.').to_ascii_lowercase();
                if domain != suffix && !domain.ends_with(&format!(".{}", suffix)) {
                    return None;
                }
                Some(Cookie {
                    domain,
                    path: parts[2].to_string(),
                    secure: parts[3].eq_ignore_ascii_case("TRUE"),
                    expires: parts[4].trim().parse().unwrap_or(0),
                    name: parts[5].trim().to_string(),
                    value: parts[6].trim().to_string(),
                })
            })
            .collect();
        Self { cookies }
    }

    pub fn load(path: &Path, domain_suffix: &str) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取 cookie 文件 '{}' 失败", path.display()))?;
        Ok(Self::parse(&content, domain_suffix))
    }

    /// 同名 cookie 以文件中最后出现的为准
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .rev()
            .find(|c| c.name == name && !c.value.is_empty())
            .map(|c| c.value.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.cookies.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// 组装 `Cookie` 请求头的值
    pub fn header_value(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
