// src/constants.rs

use std::time::Duration;

pub const UI_WIDTH: usize = 88;
pub const TITLE_TRUNCATE_LENGTH: usize = 60;
pub const MAX_FILENAME_CHARS: usize = 100;
pub const MIN_FILENAME_CHARS: usize = 3;
pub const CONFIG_DIR_NAME: &str = concat!(".", clap::crate_name!());
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LOG_FILE_NAME: &str = "social-dl.log";
pub const LOG_FALLBACK_FILE_NAME: &str = "fallback.log";
pub const DEFAULT_SAVE_DIR: &str = "downloads";
pub const SCRATCH_DIR_NAME: &str = "social-dl-scratch";
pub const DEFAULT_YTDLP_BIN: &str = "yt-dlp";
pub const MAX_DELIVERY_BYTES: u64 = 50 * 1024 * 1024;

pub const SUPPRESSION_TTL: Duration = Duration::from_secs(3600);
pub const DOWNLOAD_TTL: Duration = Duration::from_secs(7200);
pub const SCRATCH_MAX_AGE: Duration = Duration::from_secs(1800);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1800);
pub const SESSION_MIN_INTERVAL: Duration = Duration::from_secs(4);
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(20);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(300);
pub const MAX_RETRIES: u32 = 2;

pub mod user_agents {
    pub const DEFAULT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    pub const PHOTO_SOCIAL: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_7_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Mobile/15E148 Safari/604.1";
    pub const SOCIAL_VIDEO: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0";
}

pub mod headers {
    pub const IG_APP_ID_NAME: &str = "X-IG-App-ID";
    pub const IG_APP_ID: &str = "936619743392459";
    pub const REQUESTED_WITH_NAME: &str = "X-Requested-With";
    pub const REQUESTED_WITH: &str = "XMLHttpRequest";
    pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
    pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";
}

pub mod formats {
    pub const AUDIO: &str = "bestaudio[ext=m4a]/bestaudio/best";
    pub const AUDIO_CODEC: &str = "mp3";
    pub const AUDIO_QUALITY: &str = "320K";
    pub const DEFAULT_VIDEO: &str = "best[ext=mp4]/best";
    pub const MERGE_CONTAINER: &str = "mp4";
    pub const Q1080: &str = "best[height<=1080][height>720][ext=mp4]/best[height<=1080][height>720]/bestvideo[height<=1080][height>720]+bestaudio/best[height<=1080]";
    pub const Q720: &str = "best[height<=720][height>480][ext=mp4]/best[height<=720][height>480]/bestvideo[height<=720][height>480]+bestaudio/best[height<=720]";
    pub const Q480: &str = "best[height<=480][height>360][ext=mp4]/best[height<=480][height>360]/bestvideo[height<=480][height>360]+bestaudio/best[height<=480]";
    pub const Q360: &str = "best[height<=360][height>240][ext=mp4]/best[height<=360][height>240]/bestvideo[height<=360][height>240]+bestaudio/best[height<=360]";
    pub const Q240: &str = "best[height<=240][height>144][ext=mp4]/best[height<=240][height>144]/bestvideo[height<=240][height>144]+bestaudio/best[height<=240]";
    pub const Q144: &str = "worst[height<=144][ext=mp4]/worst[height<=144]/bestvideo[height<=144]+bestaudio/worst";
}

pub mod templates {
    pub const PHOTO_POST_INFO: &str = "PHOTO_POST_INFO";
    pub const MUSIC_TRACK_PAGE: &str = "MUSIC_TRACK_PAGE";
    pub const PHOTO_SOCIAL_HOME: &str = "PHOTO_SOCIAL_HOME";
    pub const SHORT_VIDEO_HOME: &str = "SHORT_VIDEO_HOME";
}

pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp", ".svg"];
pub const IMAGE_HOSTS: &[&str] = &["imgur.com", "i.redd.it", "pbs.twimg.com", "scontent", "cdninstagram", "pinimg.com"];
pub const VIDEO_FILE_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "m4v"];
pub const AUDIO_FILE_EXTENSIONS: &[&str] = &["mp3", "m4a", "opus", "ogg", "aac", "wav", "flac"];
pub const IMAGE_FILE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "heic"];

pub const HELP_COOKIES_GUIDE: &str = r#"
1. 在浏览器中登录对应平台 (照片社交 / 短视频 / 视频站)。
2. 安装可以导出 Netscape 格式 cookies.txt 的浏览器扩展。
3. 在平台页面上导出 cookies，保存为文本文件。
4. 在配置文件 ~/.social-dl/config.json 的 "cookies" 字段中填写文件路径，
   或使用 --cookies / --short-video-cookies / --video-site-cookies 参数。
5. 照片社交平台至少需要 sessionid 与 ds_user_id 两个 cookie。"#;
