//! 页面执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS / 读取页面 / 截图 / 打印"的能力

use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, PrintToPdfParams};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::path::Path;
use tracing::debug;

use crate::error::BrowserError;

/// 页面执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval()、页面读取、元素截图、打印能力
/// - 不认识 Question / Section
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, BrowserError> {
        let result = self
            .page
            .evaluate(js_code.into())
            .await
            .map_err(|e| BrowserError::page_operation("evaluate", e))?;
        result
            .into_value()
            .map_err(|e| BrowserError::UnexpectedScriptResult {
                reason: e.to_string(),
            })
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, BrowserError> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| BrowserError::UnexpectedScriptResult {
            reason: e.to_string(),
        })
    }

    /// 当前页面的完整 HTML
    pub async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::page_operation("content", e))
    }

    /// 页面的基准地址（已考虑 `<base>`）
    pub async fn base_uri(&self) -> Result<String, BrowserError> {
        self.eval_as("document.baseURI").await
    }

    /// 用给定 HTML 替换页面内容
    pub async fn set_content(&self, html: &str) -> Result<(), BrowserError> {
        self.page
            .set_content(html)
            .await
            .map_err(|e| BrowserError::page_operation("set_content", e))?;
        Ok(())
    }

    /// 对匹配选择器的第一个元素截图（PNG）
    pub async fn screenshot_element(&self, selector: &str) -> Result<Vec<u8>, BrowserError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::page_operation("find_element", e))?;
        let png = element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .map_err(|e| BrowserError::page_operation("screenshot", e))?;
        debug!("元素 {} 截图 {} 字节", selector, png.len());
        Ok(png)
    }

    /// 把当前页面打印为 PDF 并写入文件
    pub async fn save_pdf(&self, params: PrintToPdfParams, path: &Path) -> Result<(), BrowserError> {
        self.page
            .save_pdf(params, path)
            .await
            .map_err(|e| BrowserError::page_operation("save_pdf", e))?;
        Ok(())
    }
}
