//! 文档与打印两种 HTML 共用的片段

use regex::Regex;
use std::sync::LazyLock;

use crate::models::QuizImage;

static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("静态正则"));
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("静态正则"));
static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`(.*?)`").expect("静态正则"));

const CODE_STYLE: &str =
    "background-color: rgba(0,0,0,0.05); padding: 2px 4px; border-radius: 3px;";

/// 转义文本，用于元素内容与属性值
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// 多行文本转义后以 `<br>` 换行
pub fn escape_multiline(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

/// AI 解答的简单 Markdown：转义、换行、粗体、斜体、行内代码
pub fn format_ai_answer(answer: &str) -> String {
    let escaped = answer
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>");
    let bold = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    let italic = ITALIC.replace_all(&bold, "<em>$1</em>");
    CODE.replace_all(&italic, format!(r#"<code style="{}">$1</code>"#, CODE_STYLE).as_str())
        .into_owned()
}

/// 图片及其说明；`caption_attr` 为说明文字所在元素的 class 或 style 属性
pub fn image_block(image: &QuizImage, caption_attr: &str) -> String {
    let alt = escape_html(&image.alt_text);
    format!(
        r#"<div style="text-align:center; margin: 15px 0;"><img src="{}" alt="{}" style="max-width:500px; max-height:400px; border: 1px solid #ddd; padding: 5px; border-radius: 6px;" /><div {}>{}</div></div>"#,
        escape_html(image.render_src()),
        alt,
        caption_attr,
        alt
    )
}
