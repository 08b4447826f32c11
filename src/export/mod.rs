//! 导出层：投影 + 各格式渲染

pub mod document;
pub mod html;
pub mod pdf;
pub mod print;
pub mod projector;
pub mod tabular;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::ExportError;

pub use projector::{project, Correctness, ExportRow, Projection, ProjectionContext};

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Excel,
    Word,
    Pdf,
    Text,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Word => "doc",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Text => "txt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Excel => "Excel文件",
            ExportFormat::Word => "Word文档",
            ExportFormat::Pdf => "PDF文件",
            ExportFormat::Text => "文本文件",
        }
    }

    /// 是否需要浏览器参与
    pub fn needs_browser(self) -> bool {
        matches!(self, ExportFormat::Pdf)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "word" | "doc" => Ok(ExportFormat::Word),
            "pdf" => Ok(ExportFormat::Pdf),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(format!("不支持的导出格式: {}", other)),
        }
    }
}

/// 写入文本文件（HTML / 纯文本），目录不存在时创建
pub async fn write_text_file(path: &Path, content: &str) -> Result<(), ExportError> {
    let write_failed = |source| ExportError::WriteFailed {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }
    tokio::fs::write(path, content).await.map_err(write_failed)
}
