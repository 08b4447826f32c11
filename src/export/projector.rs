//! 导出投影
//!
//! 把题目模型、选择集和设置转换为扁平的导出行，三种导出格式共用同一份结果。
//! 相同输入总是得到相同输出（时间由调用方传入）。

use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::error::ExportError;
use crate::models::{Question, QuestionId, QuizImage, Section, Settings};

pub const FALLBACK_TITLE: &str = "题目解析";
pub const REDACTED: &str = "[已隐藏]";
pub const EMPTY_MARK: &str = "-";

static NUMBERING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:\d+[\s.、．]|[（(]\s*\d+\s*[)）]|第\s*\d+\s*[题問问])").expect("静态正则")
});
static ANSWER_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(答案[：:]\s*|正确答案[：:]\s*|解析[：:]\s*)").expect("静态正则")
});

/// 作答是否正确
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correctness {
    Match,
    Mismatch,
    /// 隐藏了我的答案，或缺少任一答案
    NotApplicable,
}

impl Correctness {
    pub fn marker(self) -> &'static str {
        match self {
            Correctness::Match => "✓",
            Correctness::Mismatch => "✗",
            Correctness::NotApplicable => EMPTY_MARK,
        }
    }
}

/// 一道题目的导出行
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub id: QuestionId,
    pub section: String,
    /// 已编号的题目文本
    pub text: String,
    pub options: Vec<String>,
    /// 隐藏时为 `[已隐藏]`
    pub user_answer: String,
    pub correct_answer: String,
    pub correctness: Correctness,
    /// 没有解析或关闭显示时为 `-`
    pub explanation: String,
    pub images: Vec<QuizImage>,
    pub ai_answer: Option<String>,
}

impl ExportRow {
    /// 选项按行拼接
    pub fn options_text(&self) -> String {
        self.options.join("\n")
    }

    pub fn has_explanation(&self) -> bool {
        self.explanation != EMPTY_MARK
    }
}

/// 投影时需要的外部信息
#[derive(Debug, Clone)]
pub struct ProjectionContext {
    /// 页面自身的标题
    pub page_title: Option<String>,
    pub now: NaiveDateTime,
}

/// 投影结果
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub rows: Vec<ExportRow>,
    pub title_base: String,
    pub hide_my_answers: bool,
    pub show_explanation: bool,
}

impl Projection {
    /// 没有数据时返回错误，所有导出在调用编码库之前先检查
    pub fn ensure_rows(&self) -> Result<&[ExportRow], ExportError> {
        if self.rows.is_empty() {
            Err(ExportError::NoData)
        } else {
            Ok(&self.rows)
        }
    }

    /// 按题型分组，组的顺序为首次出现的顺序
    pub fn grouped(&self) -> Vec<(&str, Vec<&ExportRow>)> {
        let mut groups: Vec<(&str, Vec<&ExportRow>)> = Vec::new();
        for row in &self.rows {
            match groups.iter_mut().find(|(name, _)| *name == row.section) {
                Some((_, rows)) => rows.push(row),
                None => groups.push((&row.section, vec![row])),
            }
        }
        groups
    }

    /// 导出文件名：标题中的非法字符替换为下划线
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", sanitize_file_stem(&self.title_base), extension)
    }
}

/// 计算导出行与标题
///
/// 选择集为空时导出全部题目，否则只导出选中的题目
pub fn project(
    sections: &[Section],
    selection: &BTreeSet<QuestionId>,
    settings: &Settings,
    context: &ProjectionContext,
) -> Projection {
    let total: usize = sections.iter().map(|s| s.questions.len()).sum();
    let mut group_index: HashMap<&str, usize> = HashMap::new();
    let mut rows = Vec::new();

    for section in sections {
        for question in &section.questions {
            if !selection.is_empty() && !selection.contains(&question.id) {
                continue;
            }
            let index = group_index.entry(section.name.as_str()).or_insert(0);
            rows.push(project_row(&section.name, question, *index, settings));
            *index += 1;
        }
    }

    let title_base = compute_title(settings, context, rows.len(), total, selection.is_empty());

    Projection {
        rows,
        title_base,
        hide_my_answers: settings.hide_my_answers,
        show_explanation: settings.show_explanation,
    }
}

fn project_row(section: &str, question: &Question, index: usize, settings: &Settings) -> ExportRow {
    let hide = settings.hide_my_answers;

    let correctness = if hide {
        Correctness::NotApplicable
    } else if question.is_correct() {
        Correctness::Match
    } else if question.is_wrong() {
        Correctness::Mismatch
    } else {
        Correctness::NotApplicable
    };

    let explanation = question.explanation.trim();
    let explanation = if settings.show_explanation && !explanation.is_empty() {
        explanation.to_string()
    } else {
        EMPTY_MARK.to_string()
    };

    ExportRow {
        id: question.id,
        section: section.to_string(),
        text: number_question_text(&question.text, index),
        options: question.options.clone(),
        user_answer: if hide {
            REDACTED.to_string()
        } else {
            clean_answer(&question.user_answer)
        },
        correct_answer: clean_answer(&question.correct_answer),
        correctness,
        explanation,
        images: question.images.clone(),
        ai_answer: question.ai_answer.clone().filter(|a| !a.trim().is_empty()),
    }
}

fn compute_title(
    settings: &Settings,
    context: &ProjectionContext,
    exported: usize,
    total: usize,
    export_all: bool,
) -> String {
    let custom = settings.custom_title.trim();
    let page = context.page_title.as_deref().map(str::trim).unwrap_or("");
    let mut title = if !custom.is_empty() {
        custom.to_string()
    } else if !page.is_empty() {
        page.to_string()
    } else {
        FALLBACK_TITLE.to_string()
    };

    if settings.include_timestamp {
        title.push('_');
        title.push_str(&context.now.format("%Y%m%d_%H%M").to_string());
    }

    if !export_all && exported > 0 && exported < total {
        title.push_str(&format!("_已选{}题", exported));
    }
    title
}

/// 题目文本没有编号时加上 `序号. `
pub fn number_question_text(text: &str, index: usize) -> String {
    let text = text.trim();
    if NUMBERING.is_match(text) {
        text.to_string()
    } else {
        format!("{}. {}", index + 1, text)
    }
}

/// 去掉 `答案:`、`正确答案:`、`解析:` 等前缀
pub fn clean_answer(answer: &str) -> String {
    ANSWER_PREFIX.replace(answer.trim(), "").into_owned()
}

fn sanitize_file_stem(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        cleaned.to_string()
    }
}
