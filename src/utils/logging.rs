/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::QuestionStats;
use crate::workflow::ExtractionSummary;

/// 初始化 tracing 输出
///
/// `RUST_LOG` 优先；否则 verbose 时为 debug，默认 info
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n题目解析日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(source: &str, max_concurrent_images: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题目解析与导出");
    info!("📄 页面来源: {}", source);
    info!("📊 图片最大并发数: {}", max_concurrent_images);
    info!("{}", "=".repeat(60));
}

/// 记录一次解析的结果
pub fn log_extraction_summary(summary: &ExtractionSummary, stats: &QuestionStats) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 解析完成: {} 个题型, {} 道题目",
        summary.sections, summary.questions
    );
    if summary.images == 0 {
        info!("🖼️ 未发现图片");
    } else {
        info!(
            "🖼️ 图片 {} 张: 内嵌 {}, 保留原始地址 {}",
            summary.images, summary.embedded, summary.degraded
        );
    }
    info!("✅ 正确: {}  ❌ 错误: {}", stats.correct, stats.wrong);
    info!("{}", "─".repeat(60));
}

/// 记录导出完成
pub fn log_export_done(format: &str, path: &str, rows: usize) {
    info!("📦 {} 已生成: {} (共 {} 题)", format, path, rows);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
