// src/symbols.rs

use crate::models::ContentType;
use colored::{ColoredString, Colorize};
use std::sync::LazyLock;

pub static OK: LazyLock<ColoredString> = LazyLock::new(|| "[OK]".green());
pub static ERROR: LazyLock<ColoredString> = LazyLock::new(|| "[X]".red());
pub static INFO: LazyLock<ColoredString> = LazyLock::new(|| "[i]".cyan());
pub static WARN: LazyLock<ColoredString> = LazyLock::new(|| "[!]".yellow());
pub static CTRL_C: LazyLock<ColoredString> = LazyLock::new(|| "Ctrl+C".yellow());

static VIDEO: LazyLock<ColoredString> = LazyLock::new(|| "[视频]".magenta());
static AUDIO: LazyLock<ColoredString> = LazyLock::new(|| "[音频]".blue());
static IMAGE: LazyLock<ColoredString> = LazyLock::new(|| "[图片]".cyan());
static MIXED: LazyLock<ColoredString> = LazyLock::new(|| "[合集]".yellow());

/// 结果类型标签
pub fn content_label(content_type: ContentType) -> &'static ColoredString {
    match content_type {
        ContentType::Video => &VIDEO,
        ContentType::Audio => &AUDIO,
        ContentType::Image => &IMAGE,
        ContentType::Mixed => &MIXED,
    }
}
