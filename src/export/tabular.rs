//! Excel 表格导出

use rust_xlsxwriter::{Format, FormatAlign, Workbook};
use std::path::Path;
use tracing::debug;

use super::projector::Projection;
use crate::error::ExportError;

pub const SHEET_NAME: &str = "试题";
pub const HEADERS: [&str; 9] = [
    "题目类型",
    "题目",
    "选项",
    "我的答案",
    "正确答案",
    "是否正确",
    "题目解析",
    "图片",
    "AI解答",
];
const MAX_COLUMN_WIDTH: usize = 50;

/// 表格数据：图片替换为文字说明，并附列宽
#[derive(Debug, Clone, PartialEq)]
pub struct TabularSheet {
    pub rows: Vec<[String; 9]>,
    pub widths: [usize; 9],
}

/// 把导出行转换为表格
pub fn tabulate(projection: &Projection) -> Result<TabularSheet, ExportError> {
    let rows: Vec<[String; 9]> = projection
        .ensure_rows()?
        .iter()
        .map(|row| {
            [
                row.section.clone(),
                row.text.clone(),
                row.options_text(),
                row.user_answer.clone(),
                row.correct_answer.clone(),
                row.correctness.marker().to_string(),
                row.explanation.clone(),
                image_note(row.images.len()),
                row.ai_answer.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(longest_line(cell));
        }
    }
    let widths = widths.map(|w| (w + 2).min(MAX_COLUMN_WIDTH));

    Ok(TabularSheet { rows, widths })
}

fn image_note(count: usize) -> String {
    if count > 0 {
        format!("包含{}张图片", count)
    } else {
        "无图片".to_string()
    }
}

fn longest_line(cell: &str) -> usize {
    cell.split('\n').map(|l| l.chars().count()).max().unwrap_or(0)
}

/// 写入 xlsx 文件
pub fn write_xlsx(sheet: &TabularSheet, path: &Path) -> Result<(), ExportError> {
    if sheet.rows.is_empty() {
        return Err(ExportError::NoData);
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    let cell_format = Format::new().set_text_wrap().set_align(FormatAlign::Top);

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        worksheet.set_column_width(col as u16, sheet.widths[col] as f64)?;
    }

    for (index, row) in sheet.rows.iter().enumerate() {
        let row_num = (index + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            worksheet.write_string_with_format(row_num, col as u16, cell.as_str(), &cell_format)?;
        }
    }
    worksheet.set_freeze_panes(1, 0)?;

    workbook.save(path)?;
    debug!("Excel 已写入 {} 行", sheet.rows.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::projector::{Correctness, ExportRow};
    use crate::models::{QuestionId, QuizImage};

    fn row(text: &str, images: usize) -> ExportRow {
        ExportRow {
            id: QuestionId(0),
            section: "单选题".to_string(),
            text: text.to_string(),
            options: vec!["A. 一".to_string(), "B. 二二二二二二".to_string()],
            user_answer: "A".to_string(),
            correct_answer: "B".to_string(),
            correctness: Correctness::Mismatch,
            explanation: "-".to_string(),
            images: (0..images)
                .map(|i| QuizImage::new(format!("https://a.com/{i}.png"), None))
                .collect(),
            ai_answer: None,
        }
    }

    fn projection(rows: Vec<ExportRow>) -> Projection {
        Projection {
            rows,
            title_base: "测验".to_string(),
            hide_my_answers: false,
            show_explanation: true,
        }
    }

    #[test]
    fn test_tabulate_cells() {
        let sheet = tabulate(&projection(vec![row("1. 题", 2), row("2. 题", 0)])).unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][2], "A. 一\nB. 二二二二二二");
        assert_eq!(sheet.rows[0][5], "✗");
        assert_eq!(sheet.rows[0][7], "包含2张图片");
        assert_eq!(sheet.rows[1][7], "无图片");
        assert_eq!(sheet.rows[1][8], "");
    }

    #[test]
    fn test_column_widths() {
        let long = "长".repeat(80);
        let sheet = tabulate(&projection(vec![row(&long, 0)])).unwrap();
        // 题目类型: 表头 4 字 + 2
        assert_eq!(sheet.widths[0], 6);
        // 选项按最长一行计算
        assert_eq!(sheet.widths[2], 11);
        // 上限 50
        assert_eq!(sheet.widths[1], 50);
    }

    #[test]
    fn test_no_rows() {
        assert!(matches!(
            tabulate(&projection(Vec::new())),
            Err(ExportError::NoData)
        ));
    }

    #[test]
    fn test_write_xlsx() {
        let sheet = tabulate(&projection(vec![row("1. 题", 1)])).unwrap();
        let path = std::env::temp_dir().join(format!("quiz_export_{}.xlsx", std::process::id()));
        write_xlsx(&sheet, &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        let _ = std::fs::remove_file(&path);
    }
}
