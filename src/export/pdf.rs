//! PDF 导出：用浏览器截图区块、打印排好的页面

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::print::{
    chunk_document, render_print, ChunkRasterizer, PageGeometry, PrintChunk, Raster,
    CHUNK_ELEMENT_ID,
};
use super::projector::Projection;
use crate::error::ExportError;
use crate::infrastructure::JsExecutor;

const PT_PER_INCH: f64 = 72.0;

/// 在浏览器中对区块截图
pub struct BrowserRasterizer {
    executor: Arc<JsExecutor>,
}

impl BrowserRasterizer {
    pub fn new(executor: Arc<JsExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ChunkRasterizer for BrowserRasterizer {
    async fn rasterize(&self, index: usize, chunk: &PrintChunk) -> Result<Raster, ExportError> {
        let failed = |reason: String| ExportError::RasterizeFailed { index, reason };

        self.executor
            .set_content(&chunk_document(chunk))
            .await
            .map_err(|e| failed(e.to_string()))?;
        let png = self
            .executor
            .screenshot_element(&format!("#{}", CHUNK_ELEMENT_ID))
            .await
            .map_err(|e| failed(e.to_string()))?;

        let (width, height) = image::ImageReader::new(std::io::Cursor::new(&png))
            .with_guessed_format()
            .map_err(|e| failed(e.to_string()))?
            .into_dimensions()
            .map_err(|e| failed(e.to_string()))?;

        debug!("区块 {} 截图 {}x{}", index, width, height);
        Ok(Raster {
            data_url: format!(
                "data:image/png;base64,{}",
                general_purpose::STANDARD.encode(&png)
            ),
            width,
            height,
        })
    }
}

/// 打印参数：纸张与页面尺寸一致，无边距，保留背景
pub fn print_params(geometry: &PageGeometry) -> PrintToPdfParams {
    PrintToPdfParams {
        paper_width: Some(geometry.width / PT_PER_INCH),
        paper_height: Some(geometry.height / PT_PER_INCH),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        print_background: Some(true),
        prefer_css_page_size: Some(true),
        ..Default::default()
    }
}

/// 生成 PDF 文件，返回页数
pub async fn write_pdf(
    projection: &Projection,
    executor: Arc<JsExecutor>,
    path: &Path,
) -> Result<usize, ExportError> {
    let geometry = PageGeometry::A4;
    let rasterizer = BrowserRasterizer::new(executor.clone());
    let (html, pages) = render_print(projection, &rasterizer, &geometry).await?;

    executor
        .set_content(&html)
        .await
        .map_err(|e| ExportError::PrintFailed {
            reason: e.to_string(),
        })?;
    executor
        .save_pdf(print_params(&geometry), path)
        .await
        .map_err(|e| ExportError::PrintFailed {
            reason: e.to_string(),
        })?;
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_params_match_a4() {
        let params = print_params(&PageGeometry::A4);
        let width = params.paper_width.unwrap();
        let height = params.paper_height.unwrap();
        assert!((width - 8.2678).abs() < 1e-3);
        assert!((height - 11.6929).abs() < 1e-3);
        assert_eq!(params.margin_top, Some(0.0));
        assert_eq!(params.print_background, Some(true));
    }
}
