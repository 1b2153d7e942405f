// src/workflows.rs

use crate::{
    DownloadJobContext, cleanup, constants,
    error::{AppError, AppResult, FailureKind},
    models::{ContentType, ExtractionResult, MediaRequest, PlatformTag},
    platform, symbols, ui, utils,
};
use colored::*;
use futures::{StreamExt, stream};
use itertools::Itertools;
use log::{error, info, warn};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::atomic::Ordering,
};

/// 一次成功交付的摘要
#[derive(Debug, Clone)]
pub struct Delivered {
    pub title: String,
    pub content_type: ContentType,
    pub files: Vec<PathBuf>,
    pub total_bytes: u64,
}

/// 运行单任务模式 (--url)
pub(crate) async fn run_single(context: DownloadJobContext, url: &str) -> AppResult<()> {
    announce_output_dir(&context)?;
    let spinner = ui::new_spinner(&format!("正在处理 {}", utils::truncate_text(url, constants::TITLE_TRUNCATE_LENGTH)));
    let outcome = deliver_url(&context, url).await;
    spinner.finish_and_clear();
    match outcome {
        Ok(delivered) => {
            print_delivered(&delivered);
            Ok(())
        }
        Err(e) => {
            print_failure(url, &e);
            Err(e)
        }
    }
}

/// 运行交互模式
pub(crate) async fn run_interactive(context: DownloadJobContext) -> AppResult<()> {
    ui::print_header("交互模式");
    ui::plain(&format!("在此模式下，你可以逐一输入媒体链接进行下载。直接回车或按 {} 退出。", *symbols::CTRL_C));
    announce_output_dir(&context)?;

    loop {
        if context.cancellation_token.load(Ordering::Relaxed) {
            return Err(AppError::UserInterrupt);
        }
        match ui::prompt("请输入媒体链接", None) {
            Ok(input) if !input.is_empty() => {
                let spinner = ui::new_spinner("正在处理...");
                let outcome = deliver_url(&context, &input).await;
                spinner.finish_and_clear();
                match outcome {
                    Ok(delivered) => print_delivered(&delivered),
                    Err(e) => {
                        error!("交互模式任务 '{}' 失败: {}", input, e);
                        print_failure(&input, &e);
                    }
                }
            }
            Ok(_) => break,
            Err(_) => return Err(AppError::UserInterrupt),
        }
    }

    ui::plain("");
    ui::info("退出交互模式。");
    Ok(())
}

/// 运行批量模式：去重后按 --workers 并发处理
pub(crate) async fn run_batch(batch_file: &Path, context: DownloadJobContext) -> AppResult<()> {
    let content = std::fs::read_to_string(batch_file).map_err(|e| {
        error!("读取批量文件 '{}' 失败: {}", batch_file.display(), e);
        AppError::from(e)
    })?;
    let tasks: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.starts_with('#'))
        .map(String::from)
        .unique()
        .collect();
    if tasks.is_empty() {
        ui::warn(&format!("批量文件 '{}' 为空。", batch_file.display()));
        return Ok(());
    }

    ui::print_header(&format!(
        "开始批量处理 {} 个链接 (并发数: {}，按 {} 可随时退出)",
        tasks.len(),
        context.config.max_workers,
        *symbols::CTRL_C
    ));
    announce_output_dir(&context)?;

    let pbar = ui::new_tasks_progress_bar(tasks.len() as u64, "处理");
    let mut results = stream::iter(tasks.iter().cloned())
        .map(|task| {
            let context = context.clone();
            async move {
                if context.cancellation_token.load(Ordering::Relaxed) {
                    return (task, Err(AppError::UserInterrupt));
                }
                let outcome = deliver_url(&context, &task).await;
                (task, outcome)
            }
        })
        .buffer_unordered(context.config.max_workers);

    let mut success = 0usize;
    let mut failures: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut interrupted = false;
    while let Some((task, outcome)) = results.next().await {
        let shown = utils::truncate_text(&task, constants::TITLE_TRUNCATE_LENGTH);
        match outcome {
            Ok(delivered) => {
                success += 1;
                pbar.println(format!(
                    "{} {} ({} 个文件, {})",
                    *symbols::OK,
                    shown,
                    delivered.files.len(),
                    utils::format_bytes(delivered.total_bytes)
                ));
            }
            Err(AppError::UserInterrupt) => interrupted = true,
            Err(e) => {
                error!("批量任务 '{}' 失败: {}", task, e);
                *failures.entry(failure_message(&e)).or_default() += 1;
                pbar.println(format!("{} {} ({})", *symbols::ERROR, shown, failure_message(&e)));
            }
        }
        pbar.inc(1);
    }
    pbar.finish_and_clear();

    let failed: usize = failures.values().sum();
    ui::print_header("批量任务报告");
    println!(
        "{} | {} | 总计: {}",
        format!("成功: {}", success).green(),
        format!("失败: {}", failed).red(),
        tasks.len()
    );
    for (message, count) in &failures {
        ui::plain(&format!("    - {} x{}", message, count));
    }

    if interrupted {
        Err(AppError::UserInterrupt)
    } else if failed > 0 {
        Err(AppError::Other(anyhow::anyhow!("{} 个批量任务执行失败。", failed)))
    } else {
        Ok(())
    }
}

/// 检查各平台 cookies 的登录状态
pub(crate) async fn run_check_cookies(context: DownloadJobContext) -> AppResult<()> {
    ui::print_header("检查平台 cookies");
    let mut sessions = context.pipeline.sessions().all().cloned().collect::<Vec<_>>();
    sessions.sort_by_key(|s| s.platform().as_str());

    for session in sessions {
        let platform = session.platform();
        if !session.is_authenticated() {
            ui::warn(&format!("{}: 未配置或缺少必要的 cookie", platform));
            continue;
        }
        match session.validate(&context.http_client, &context.config).await {
            Ok(true) => println!("{} {}: 登录状态有效", *symbols::OK, platform),
            Ok(false) => ui::error(&format!("{}: cookie 已失效，请重新导出", platform)),
            Err(e) => {
                warn!("平台 {} 登录状态检查失败: {}", platform, e);
                ui::warn(&format!("{}: 检查失败 ({})", platform, e));
            }
        }
    }
    Ok(())
}

pub(crate) fn show_cookies_help() {
    ui::box_message(
        "导出平台 cookies 指南",
        constants::HELP_COOKIES_GUIDE.lines().collect::<Vec<_>>().as_slice(),
        |s| s.cyan(),
    );
    ui::info("安全提醒: cookies 等同于登录凭据，请妥善保管，不要分享给他人。");
}

/// 处理一个链接并交付到输出目录，无论成败都释放临时文件
pub async fn deliver_url(context: &DownloadJobContext, url: &str) -> AppResult<Delivered> {
    let request = MediaRequest::new(url, context.args.quality, context.args.audio_only);
    let result = context.pipeline.process(&request).await?;
    let delivered = deliver_result(&result, &context.config.save_dir, context.config.max_delivery_bytes);
    cleanup::release(&result);
    delivered
}

/// 检查大小上限后把结果文件复制到输出目录
pub fn deliver_result(result: &ExtractionResult, save_dir: &Path, max_bytes: u64) -> AppResult<Delivered> {
    let paths = result.paths();
    let mut total_bytes = 0u64;
    for path in &paths {
        total_bytes += std::fs::metadata(path)?.len();
    }
    if total_bytes > max_bytes {
        warn!("结果 '{}' 大小 {} 超过交付上限", result.title, utils::format_bytes(total_bytes));
        return Err(AppError::UserInputError(format!(
            "文件过大 ({})，超过交付上限 {}。",
            utils::format_bytes(total_bytes),
            utils::format_bytes(max_bytes)
        )));
    }

    std::fs::create_dir_all(save_dir)?;
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let dest = unique_destination(save_dir, file_name);
        std::fs::copy(path, &dest)?;
        info!("已交付: {}", dest.display());
        files.push(dest);
    }
    Ok(Delivered {
        title: result.title.clone(),
        content_type: result.content_type,
        files,
        total_bytes,
    })
}

/// 输出目录中已有同名文件时追加 `_N` 后缀
fn unique_destination(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{}", ext)),
        None => (file_name, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{}_{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn failure_message(e: &AppError) -> &'static str {
    match e {
        AppError::UserInputError(_) => "文件超过交付上限。",
        other => other.failure_kind().user_message(),
    }
}

fn announce_output_dir(context: &DownloadJobContext) -> AppResult<()> {
    std::fs::create_dir_all(&context.config.save_dir)?;
    let absolute_path = dunce::canonicalize(&context.config.save_dir)?;
    info!("文件将保存到目录: \"{}\"", absolute_path.display());
    ui::info(&format!("文件将保存到目录: \"{}\"", absolute_path.display()));
    Ok(())
}

fn print_delivered(delivered: &Delivered) {
    println!(
        "\n{} {} {} ({})",
        *symbols::OK,
        symbols::content_label(delivered.content_type),
        utils::truncate_text(&delivered.title, constants::TITLE_TRUNCATE_LENGTH).green(),
        utils::format_bytes(delivered.total_bytes)
    );
    for file in &delivered.files {
        ui::plain(&format!("    -> {}", file.display()));
    }
}

fn print_failure(url: &str, e: &AppError) {
    if matches!(e, AppError::UserInterrupt) {
        return;
    }
    let hint = match e {
        AppError::UserInputError(msg) => msg.clone(),
        _ if e.failure_kind() == FailureKind::UnsupportedPlatform && platform::identify(url) == PlatformTag::Unknown => {
            format!("无法识别的链接: {}", utils::truncate_text(url, constants::TITLE_TRUNCATE_LENGTH))
        }
        other => other.failure_kind().user_message().to_string(),
    };
    eprintln!("\n{} {}", *symbols::ERROR, hint.red());
}
