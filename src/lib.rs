// src/lib.rs

pub mod cache;
pub mod classifier;
pub mod cleanup;
pub mod cli;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod extractor;
pub mod models;
pub mod music;
pub mod pipeline;
pub mod platform;
pub mod retry;
pub mod session;
pub mod symbols;
pub mod ui;
pub mod utils;
pub mod workflows;

use crate::{
    cli::Cli,
    client::RobustClient,
    config::AppConfig,
    error::AppResult,
    extractor::YtDlp,
    pipeline::Pipeline,
    session::SessionRegistry,
};
use log::{debug, info};
use std::sync::{Arc, atomic::AtomicBool};

/// 核心的执行上下文，包含所有任务所需的状态和工具
#[derive(Clone)]
pub struct DownloadJobContext {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<AppConfig>,
    pub http_client: Arc<RobustClient>,
    pub args: Arc<Cli>,
    pub cancellation_token: Arc<AtomicBool>,
}

/// 库的公共入口点，由 `main.rs` 调用
pub async fn run_from_cli(args: Arc<Cli>, cancellation_token: Arc<AtomicBool>) -> AppResult<()> {
    debug!("CLI 参数: {:?}", args);
    if args.cookies_help {
        workflows::show_cookies_help();
        return Ok(());
    }

    let config = Arc::new(AppConfig::new(&args)?);
    debug!(
        "应用配置: 输出目录={:?}, 临时目录={:?}, 并发数={}, 代理={}",
        config.save_dir,
        config.scratch_dir,
        config.max_workers,
        config.proxy.is_some()
    );

    let http_client = Arc::new(RobustClient::new(config.clone())?);
    let sessions = SessionRegistry::from_config(&config);
    let authenticated = sessions.all().filter(|s| s.is_authenticated()).count();
    info!("已加载 {} 个有效的平台会话", authenticated);

    let backend = Arc::new(YtDlp::new(config.ytdlp_bin.clone()));
    let pipeline = Arc::new(Pipeline::new(config.clone(), http_client.clone(), backend, sessions));

    // 兜底清理，正常情况下交付后即释放
    let sweeper = cleanup::spawn_sweeper(
        config.scratch_dir.clone(),
        config.scratch_max_age,
        config.sweep_interval,
        pipeline.cache().clone(),
    );

    let context = DownloadJobContext {
        pipeline,
        config: config.clone(),
        http_client,
        args: args.clone(),
        cancellation_token,
    };

    let result = if args.check_cookies {
        workflows::run_check_cookies(context).await
    } else if args.interactive {
        workflows::run_interactive(context).await
    } else if let Some(batch_file) = &args.batch_file {
        workflows::run_batch(batch_file, context).await
    } else if let Some(url) = &args.url {
        workflows::run_single(context, url).await
    } else {
        Ok(())
    };

    sweeper.abort();
    result
}
