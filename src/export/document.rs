//! Word 兼容 HTML 文档
//!
//! 生成带内联样式的完整 HTML，以 `.doc` 保存后可直接用 Word 打开

use std::fmt::Write as _;

use super::html::{escape_html, escape_multiline, format_ai_answer, image_block};
use super::projector::{Correctness, ExportRow, Projection};
use crate::error::ExportError;

const STYLE: &str = r#"
        body { font-family: SimSun, Arial; line-height: 1.5; }
        h1 { text-align: center; font-size: 18pt; margin-bottom: 20px; }
        h2 { margin-top: 24px; background-color: #f0f0f0; padding: 12px; font-size: 14pt; border-radius: 6px; }
        .question { margin-bottom: 25px; border-bottom: 1px solid #eee; padding-bottom: 20px; }
        .question-text { font-weight: bold; margin-bottom: 15px; line-height: 1.4; }
        .options { margin-left: 30px; margin-bottom: 15px; }
        .option-item { margin: 8px 0; }
        .correct-answer { color: green; background-color: #e8f5e9; padding: 8px 12px; display: inline-block; border-radius: 6px; margin-top: 10px; }
        .my-answer { color: blue; background-color: #e3f2fd; padding: 8px 12px; display: inline-block; border-radius: 6px; margin-top: 10px; margin-right: 10px; }
        .mismatch { color: red; background-color: #fdecea; padding: 8px 12px; display: inline-block; border-radius: 6px; margin-top: 10px; }
        .explanation { margin-top: 15px; padding-top: 15px; border-top: 1px dashed #eee; }
        .explanation-title { font-weight: bold; margin-bottom: 10px; }
        .ai-answer { margin-top: 20px; padding: 15px; background-color: #f9f9ff; border-left: 4px solid #4d76ff; border-radius: 6px; }
        .ai-answer-title { font-weight: bold; margin-bottom: 10px; color: #4d76ff; }
        img { max-width: 500px; height: auto; border: 1px solid #ddd; padding: 5px; margin: 15px auto; display: block; border-radius: 6px; }
        .image-caption { text-align: center; color: #666; font-size: 10pt; margin-top: 5px; }
"#;

/// 生成 Word 文档 HTML
pub fn render_document(projection: &Projection) -> Result<String, ExportError> {
    projection.ensure_rows()?;
    let title = escape_html(&projection.title_base);

    let mut out = String::new();
    let _ = write!(
        out,
        r#"<!DOCTYPE html>
<html xmlns:o="urn:schemas-microsoft-com:office:office"
      xmlns:w="urn:schemas-microsoft-com:office:word"
      xmlns="http://www.w3.org/TR/REC-html40">
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>{STYLE}    </style>
</head>
<body>
<h1>{title}</h1>
"#
    );

    for (section, rows) in projection.grouped() {
        let _ = writeln!(out, "<h2>{}</h2>", escape_html(section));
        for row in rows {
            push_question(&mut out, row, projection);
        }
    }

    out.push_str("</body></html>\n");
    Ok(out)
}

fn push_question(out: &mut String, row: &ExportRow, projection: &Projection) {
    let _ = write!(
        out,
        r#"<div class="question"><div class="question-text">{}</div>"#,
        escape_multiline(&row.text)
    );

    for image in &row.images {
        out.push_str(&image_block(image, r#"class="image-caption""#));
    }

    let options: Vec<&String> = row.options.iter().filter(|o| !o.trim().is_empty()).collect();
    if !options.is_empty() {
        out.push_str(r#"<div class="options">"#);
        for option in options {
            let _ = write!(out, r#"<div class="option-item">{}</div>"#, escape_html(option));
        }
        out.push_str("</div>");
    }

    out.push_str(r#"<div style="display: flex; flex-wrap: wrap; gap: 10px;">"#);
    if !projection.hide_my_answers {
        let _ = write!(
            out,
            r#"<div class="my-answer">我的答案: {}</div>"#,
            escape_html(&row.user_answer)
        );
    }
    if !row.correct_answer.is_empty() {
        let _ = write!(
            out,
            r#"<div class="correct-answer">正确答案: {}</div>"#,
            escape_html(&row.correct_answer)
        );
    }
    if row.correctness == Correctness::Mismatch {
        out.push_str(r#"<div class="mismatch">答案不匹配</div>"#);
    }
    out.push_str("</div>");

    if projection.show_explanation && row.has_explanation() {
        let _ = write!(
            out,
            r#"<div class="explanation"><div class="explanation-title">题目解析:</div><div>{}</div></div>"#,
            escape_multiline(&row.explanation)
        );
    }

    if let Some(answer) = &row.ai_answer {
        let _ = write!(
            out,
            r#"<div class="ai-answer"><div class="ai-answer-title">AI解答:</div><div>{}</div></div>"#,
            format_ai_answer(answer)
        );
    }

    out.push_str("</div>\n");
}
