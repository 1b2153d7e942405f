// src/cli.rs

use crate::{constants, models::Quality};
use clap::{Parser, ValueEnum, command, crate_version};
use std::path::PathBuf;

/// 定义日志输出级别
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

// command 属性
#[derive(Parser, Debug, Clone)]
#[command(
    version = crate_version!(),
    about,
    long_about = None,
    arg_required_else_help = true,
    disable_help_flag = true,
    disable_version_flag = true,
)]
#[command(group(
    clap::ArgGroup::new("mode")
        .required(true)
        .args(&["interactive", "url", "batch_file", "check_cookies", "cookies_help"]),
))]
pub struct Cli {
    // --- 运行模式 (Mode) ---
    /// 启动交互式会话，逐一输入链接
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub interactive: bool,
    /// 指定要下载的单个媒体链接
    #[arg(long, help_heading = "Mode")]
    pub url: Option<String>,
    /// 从文本文件批量下载多个链接 (每行一个)
    #[arg(short, long, value_name = "FILE", help_heading = "Mode")]
    pub batch_file: Option<PathBuf>,
    /// 检查已配置的平台 cookies 是否仍然有效
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub check_cookies: bool,
    /// 显示如何导出平台 cookies 的指南并退出
    #[arg(long, action = clap::ArgAction::SetTrue, help_heading = "Mode")]
    pub cookies_help: bool,

    // --- 下载选项 (Options) ---
    /// 选择视频清晰度，默认由提取器选择最佳格式
    #[arg(short = 'q', long, value_enum, help_heading = "Options")]
    pub quality: Option<Quality>,
    /// 仅下载音频 (转为 mp3)
    #[arg(short, long, action = clap::ArgAction::SetTrue, help_heading = "Options")]
    pub audio_only: bool,
    /// 照片社交平台的 cookies.txt 文件 (Netscape 格式)
    #[arg(long, value_name = "FILE", help_heading = "Options")]
    pub cookies: Option<PathBuf>,
    /// 短视频平台的 cookies.txt 文件
    #[arg(long, value_name = "FILE", help_heading = "Options")]
    pub short_video_cookies: Option<PathBuf>,
    /// 视频站的 cookies.txt 文件 (可选)
    #[arg(long, value_name = "FILE", help_heading = "Options")]
    pub video_site_cookies: Option<PathBuf>,
    /// 设置批量模式的最大并发数
    #[arg(short, long, value_parser = clap::value_parser!(usize), help_heading = "Options")]
    pub workers: Option<usize>,
    /// 设置文件保存目录
    #[arg(short, long, value_name = "DIR", default_value_os_t = PathBuf::from(constants::DEFAULT_SAVE_DIR), help_heading = "Options")]
    pub output: PathBuf,

    // --- 通用选项 (General) ---
    /// 显示此帮助信息并退出
    #[arg(short = 'h', long, action = clap::ArgAction::Help, global = true, help_heading = "General")]
    _help: Option<bool>,
    /// 显示版本信息并退出
    #[arg(short = 'V', long, action = clap::ArgAction::Version, global = true, help_heading = "General")]
    _version: Option<bool>,
    /// (隐藏参数) 设置日志文件的输出级别，用于调试
    #[arg(long, value_enum, default_value_t = LogLevel::Off, global = true, hide = true)]
    pub log_level: LogLevel,
}
