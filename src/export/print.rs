//! 打印版 HTML 与分页
//!
//! 内容拆成区块（标题、题型、题目），逐块栅格化后按 A4 页面排版：
//! 宽度缩放到可打印宽度，放不下时换页，每页底部加页码。

use async_trait::async_trait;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

use super::html::{escape_html, escape_multiline, format_ai_answer, image_block};
use super::projector::{Correctness, ExportRow, Projection};
use crate::error::ExportError;

/// 区块栅格化宽度（CSS 像素）
pub const CHUNK_WIDTH_PX: u32 = 800;

const CAPTION_STYLE: &str = r#"style="font-size:10pt; color:#666; margin-top: 5px;""#;
const ANSWER_BOX: &str =
    "padding: 8px 12px; display: inline-block; border-radius: 6px; margin-top: 10px;";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Title,
    SectionHeading,
    Question,
}

/// 单独栅格化的一块内容
#[derive(Debug, Clone, PartialEq)]
pub struct PrintChunk {
    pub kind: ChunkKind,
    pub html: String,
}

/// 把导出行拆成打印区块
pub fn print_chunks(projection: &Projection) -> Result<Vec<PrintChunk>, ExportError> {
    projection.ensure_rows()?;

    let mut chunks = vec![PrintChunk {
        kind: ChunkKind::Title,
        html: format!(
            r#"<h1 style="text-align: center; font-size: 18pt; margin: 0 0 20px 0;">{}</h1>"#,
            escape_html(&projection.title_base)
        ),
    }];

    for (section, rows) in projection.grouped() {
        chunks.push(PrintChunk {
            kind: ChunkKind::SectionHeading,
            html: format!(
                r#"<h2 style="margin: 0; background-color: #f0f0f0; padding: 12px; font-size: 14pt; border-radius: 6px;">{}</h2>"#,
                escape_html(section)
            ),
        });
        for row in rows {
            chunks.push(PrintChunk {
                kind: ChunkKind::Question,
                html: question_html(row, projection),
            });
        }
    }
    Ok(chunks)
}

fn question_html(row: &ExportRow, projection: &Projection) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<div style="padding-bottom: 20px; border-bottom: 1px solid #eee;"><div style="font-weight: bold; margin-bottom: 15px; line-height: 1.4;">{}</div>"#,
        escape_multiline(&row.text)
    );

    for image in &row.images {
        out.push_str(&image_block(image, CAPTION_STYLE));
    }

    let options: Vec<&String> = row.options.iter().filter(|o| !o.trim().is_empty()).collect();
    if !options.is_empty() {
        out.push_str(r#"<div style="margin-left: 30px; margin-bottom: 15px;">"#);
        for option in options {
            let _ = write!(out, r#"<div style="margin: 8px 0;">{}</div>"#, escape_html(option));
        }
        out.push_str("</div>");
    }

    out.push_str(r#"<div style="display: flex; flex-wrap: wrap; gap: 10px;">"#);
    if !projection.hide_my_answers {
        let _ = write!(
            out,
            r#"<div style="color: blue; background-color: #e3f2fd; {ANSWER_BOX}">我的答案: {}</div>"#,
            escape_html(&row.user_answer)
        );
    }
    if !row.correct_answer.is_empty() {
        let _ = write!(
            out,
            r#"<div style="color: green; background-color: #e8f5e9; {ANSWER_BOX}">正确答案: {}</div>"#,
            escape_html(&row.correct_answer)
        );
    }
    if row.correctness == Correctness::Mismatch {
        let _ = write!(
            out,
            r#"<div style="color: red; background-color: #fdecea; {ANSWER_BOX}">答案不匹配</div>"#
        );
    }
    out.push_str("</div>");

    if projection.show_explanation && row.has_explanation() {
        let _ = write!(
            out,
            r#"<div style="margin-top: 15px; padding-top: 15px; border-top: 1px dashed #eee;"><div style="font-weight: bold; margin-bottom: 10px;">题目解析:</div><div style="color: #333;">{}</div></div>"#,
            escape_multiline(&row.explanation)
        );
    }

    if let Some(answer) = &row.ai_answer {
        let _ = write!(
            out,
            r#"<div style="margin-top: 20px; padding: 15px; background-color: #f9f9ff; border-left: 4px solid #4d76ff; border-radius: 6px;"><div style="font-weight: bold; margin-bottom: 10px; color: #4d76ff;">AI解答:</div><div style="color: #333;">{}</div></div>"#,
            format_ai_answer(answer)
        );
    }

    out.push_str("</div>");
    out
}

/// 栅格化页面中承载区块的元素 id
pub const CHUNK_ELEMENT_ID: &str = "print-chunk";

/// 单个区块的独立页面，宽度固定为 800px
pub fn chunk_document(chunk: &PrintChunk) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><style>body {{ margin: 0; background: #fff; -webkit-font-smoothing: antialiased; }}</style></head><body><div id="{CHUNK_ELEMENT_ID}" style="width: {CHUNK_WIDTH_PX}px; box-sizing: border-box; padding: 10px 20px; font-family: SimSun, Arial; line-height: 1.5; background: #fff;">{}</div></body></html>"#,
        chunk.html
    )
}

/// 栅格化后的区块
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// PNG data URL
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// 区块栅格化能力
#[async_trait]
pub trait ChunkRasterizer: Send + Sync {
    async fn rasterize(&self, index: usize, chunk: &PrintChunk) -> Result<Raster, ExportError>;
}

/// 页面尺寸（单位 pt）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    /// 左右边距
    pub margin_x: f64,
    /// 上下边距
    pub margin_y: f64,
    /// 区块间距
    pub gap: f64,
    /// 页码基线距页面底部的距离
    pub footer_offset: f64,
}

impl PageGeometry {
    pub const A4: PageGeometry = PageGeometry {
        width: 595.28,
        height: 841.89,
        margin_x: 20.0,
        margin_y: 40.0,
        gap: 20.0,
        footer_offset: 20.0,
    };

    pub fn printable_width(&self) -> f64 {
        self.width - 2.0 * self.margin_x
    }

    pub fn printable_height(&self) -> f64 {
        self.height - 2.0 * self.margin_y
    }
}

/// 区块在页面上的位置（pt）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub chunk: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    /// 从 1 开始
    pub number: usize,
    pub placements: Vec<Placement>,
}

/// 按顺序把区块放到页面上
///
/// `sizes` 为各区块的像素尺寸，尺寸为 0 的区块跳过。
/// 超过一整页高度的区块按比例缩小后独占一页。
pub fn paginate(geometry: &PageGeometry, sizes: &[(u32, u32)]) -> Vec<PageLayout> {
    let printable_width = geometry.printable_width();
    let printable_height = geometry.printable_height();
    let bottom = geometry.height - geometry.margin_y;

    let mut pages: Vec<PageLayout> = Vec::new();
    let mut current = PageLayout {
        number: 1,
        placements: Vec::new(),
    };
    let mut y = geometry.margin_y;

    for (chunk, &(px_width, px_height)) in sizes.iter().enumerate() {
        if px_width == 0 || px_height == 0 {
            continue;
        }

        let mut width = printable_width;
        let mut height = f64::from(px_height) * width / f64::from(px_width);
        if height > printable_height {
            width *= printable_height / height;
            height = printable_height;
        }

        if y + height > bottom && !current.placements.is_empty() {
            let next = current.number + 1;
            pages.push(std::mem::replace(
                &mut current,
                PageLayout {
                    number: next,
                    placements: Vec::new(),
                },
            ));
            y = geometry.margin_y;
        }

        current.placements.push(Placement {
            chunk,
            x: geometry.margin_x + (printable_width - width) / 2.0,
            y,
            width,
            height,
        });
        y += height + geometry.gap;
    }

    if !current.placements.is_empty() {
        pages.push(current);
    }
    pages
}

/// 把排好的页面组合成固定尺寸的 HTML，供浏览器打印为 PDF
pub fn compose_pages_html(
    geometry: &PageGeometry,
    pages: &[PageLayout],
    rasters: &[Raster],
    title: &str,
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r#"<!DOCTYPE html><html><head><meta charset="utf-8"><title>{}</title><style>
@page {{ size: {w}pt {h}pt; margin: 0; }}
html, body {{ margin: 0; padding: 0; }}
.page {{ position: relative; width: {w}pt; height: {h}pt; overflow: hidden; page-break-after: always; break-after: page; background: #fff; }}
.page:last-child {{ page-break-after: auto; break-after: auto; }}
.page img {{ position: absolute; display: block; }}
.page-number {{ position: absolute; left: 0; width: 100%; text-align: center; font-family: Arial, sans-serif; font-size: 10pt; line-height: 10pt; color: rgb(100,100,100); }}
</style></head><body>
"#,
        escape_html(title),
        w = geometry.width,
        h = geometry.height
    );

    for page in pages {
        out.push_str(r#"<div class="page">"#);
        for placement in &page.placements {
            let Some(raster) = rasters.get(placement.chunk) else {
                continue;
            };
            let _ = write!(
                out,
                r#"<img src="{}" style="left: {:.2}pt; top: {:.2}pt; width: {:.2}pt; height: {:.2}pt;" />"#,
                raster.data_url, placement.x, placement.y, placement.width, placement.height
            );
        }
        let _ = write!(
            out,
            r#"<div class="page-number" style="top: {:.2}pt;">Page {}</div></div>"#,
            geometry.height - geometry.footer_offset - 10.0,
            page.number
        );
        out.push('\n');
    }

    out.push_str("</body></html>\n");
    out
}

/// 生成打印用 HTML：拆块 → 栅格化 → 分页 → 组合
///
/// 单个区块栅格化失败时跳过该区块
pub async fn render_print(
    projection: &Projection,
    rasterizer: &dyn ChunkRasterizer,
    geometry: &PageGeometry,
) -> Result<(String, usize), ExportError> {
    let chunks = print_chunks(projection)?;
    let total = chunks.len();
    let mut rasters = Vec::with_capacity(total);

    for (index, chunk) in chunks.iter().enumerate() {
        debug!("渲染第 {}/{} 个元素", index + 1, total);
        match rasterizer.rasterize(index, chunk).await {
            Ok(raster) => rasters.push(raster),
            Err(e) => {
                warn!("渲染题目内容失败，跳过: {}", e);
                rasters.push(Raster {
                    data_url: String::new(),
                    width: 0,
                    height: 0,
                });
            }
        }
    }

    let sizes: Vec<(u32, u32)> = rasters.iter().map(|r| (r.width, r.height)).collect();
    let pages = paginate(geometry, &sizes);
    if pages.is_empty() {
        return Err(ExportError::PrintFailed {
            reason: "所有区块都渲染失败".to_string(),
        });
    }
    info!("📄 共 {} 个区块，排版为 {} 页", total, pages.len());

    let html = compose_pages_html(geometry, &pages, &rasters, &projection.title_base);
    Ok((html, pages.len()))
}
