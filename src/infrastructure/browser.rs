//! 浏览器连接 - 基础设施层

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::Path;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

use crate::error::BrowserError;

/// 连接到已打开调试端口的浏览器，并找到试题页面
///
/// 优先选择标题包含 `target_title` 或地址包含 `target_url` 的标签页；
/// 都找不到时，有 `target_url` 则新开标签页导航过去，否则新开空白页
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: Option<&str>,
    target_title: Option<&str>,
) -> Result<(Browser, Page), BrowserError> {
    let browser_url = format!("http://localhost:{}", port);
    info!("🌐 正在连接到浏览器: {}", browser_url);
    debug!("目标 URL: {:?}, 目标标题: {:?}", target_url, target_title);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::ConnectionFailed { port, source: e }
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    let pages = browser
        .pages()
        .await
        .map_err(|e| BrowserError::page_operation("pages", e))?;
    debug!("获取到 {} 个页面", pages.len());

    for page in &pages {
        if let Some(title) = target_title {
            if let Ok(Some(page_title)) = page.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 找到目标页面: {}", page_title);
                    return Ok((browser, page.clone()));
                }
            }
        }
        if let Some(url) = target_url {
            if let Ok(Some(page_url)) = page.url().await {
                if page_url.contains(url) {
                    info!("✓ 找到目标页面: {}", page_url);
                    return Ok((browser, page.clone()));
                }
            }
        }
    }

    let new_page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| BrowserError::page_operation("new_page", e))?;

    if let Some(url) = target_url {
        debug!("未找到匹配的页面，新开页面并导航到: {}", url);
        new_page.goto(url).await.map_err(|e| {
            error!("导航到 {} 失败: {}", url, e);
            BrowserError::page_operation("goto", e)
        })?;
        info!("已导航到: {}", url);
    } else {
        debug!("创建空白页面");
    }

    Ok((browser, new_page))
}

/// 启动无头浏览器（离线模式导出 PDF 时使用）
pub async fn launch_headless_browser(executable: Option<&str>) -> Result<Browser, BrowserError> {
    info!("🚀 启动无头浏览器...");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
    ]);
    if let Some(path) = executable {
        debug!("浏览器可执行文件: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }
    let config = builder.build().map_err(|reason| {
        error!("配置无头浏览器失败: {}", reason);
        BrowserError::LaunchFailed { reason }
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        BrowserError::LaunchFailed {
            reason: e.to_string(),
        }
    })?;

    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });
    sleep(Duration::from_millis(300)).await;

    info!("✅ 无头浏览器已启动");
    Ok(browser)
}

/// 新开一个空白页，用于导出时的渲染与打印，不影响试题页面
pub async fn open_scratch_page(browser: &Browser) -> Result<Page, BrowserError> {
    browser
        .new_page("about:blank")
        .await
        .map_err(|e| BrowserError::page_operation("new_page", e))
}
