//! 页面结构抽象
//!
//! 抽取流程只依赖这里的能力，不直接接触具体的 DOM 实现

use crate::error::SourceError;

/// 单个字段的读取结果
///
/// `Ok(None)` 表示页面中没有该字段，`Err` 表示节点存在但读取失败
pub type FieldResult<T> = Result<Option<T>, SourceError>;

/// 一道题目的原始字段
#[derive(Debug)]
pub struct QuestionFields {
    pub text: FieldResult<String>,
    pub options: FieldResult<Vec<String>>,
    pub user_answer: FieldResult<String>,
    pub correct_answer: FieldResult<String>,
    pub explanation: FieldResult<String>,
}

impl Default for QuestionFields {
    fn default() -> Self {
        Self {
            text: Ok(None),
            options: Ok(None),
            user_answer: Ok(None),
            correct_answer: Ok(None),
            explanation: Ok(None),
        }
    }
}

/// 页面中发现的一张图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub src: String,
    pub alt: Option<String>,
    pub width: u32,
    pub height: u32,
}

impl ImageCandidate {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: None,
            width: 0,
            height: 0,
        }
    }
}

/// 试题页面能力
///
/// 层级：题型节点 → 题目节点 → 字段 / 图片
pub trait QuizDocument {
    type Node<'a>: Copy
    where
        Self: 'a;

    /// 所有题型节点（文档顺序）。为空表示页面没有试题内容
    fn list_section_nodes(&self) -> Vec<Self::Node<'_>>;

    /// 题型名称
    fn section_label<'a>(&'a self, section: Self::Node<'a>) -> Option<String>;

    /// 题型下的题目节点（文档顺序）
    fn question_nodes<'a>(&'a self, section: Self::Node<'a>) -> Vec<Self::Node<'a>>;

    /// 题目的各个字段，每个字段独立成败
    fn question_fields<'a>(&'a self, question: Self::Node<'a>) -> QuestionFields;

    /// 题目中的图片（发现顺序，可能含重复地址）
    fn find_images<'a>(&'a self, question: Self::Node<'a>) -> Vec<ImageCandidate>;

    /// 页面自身的标题
    fn page_title(&self) -> Option<String>;
}
