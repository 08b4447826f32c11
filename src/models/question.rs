use serde::{Deserialize, Serialize};
use std::fmt;

/// 题目在一次解析中的唯一编号
///
/// 按文档顺序从 0 开始连续分配，是选择集、AI 解答与数据模型之间的关联键
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub usize);

impl QuestionId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q_{}", self.0)
    }
}

impl std::str::FromStr for QuestionId {
    type Err = std::num::ParseIntError;

    /// 接受 `q_3` 或 `3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix("q_").unwrap_or(s);
        digits.parse().map(QuestionId)
    }
}

/// 题型分组
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub questions: Vec<Question>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            questions: Vec::new(),
        }
    }
}

/// 一道题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub user_answer: String,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub images: Vec<QuizImage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_answer: Option<String>,
}

impl Question {
    pub fn new(id: QuestionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            options: Vec::new(),
            user_answer: String::new(),
            correct_answer: String::new(),
            explanation: String::new(),
            images: Vec::new(),
            ai_answer: None,
        }
    }

    /// 两个答案都存在时才参与对错判断
    fn has_both_answers(&self) -> bool {
        !self.user_answer.is_empty() && !self.correct_answer.is_empty()
    }

    /// 错题：两个答案都非空且不相同
    pub fn is_wrong(&self) -> bool {
        self.has_both_answers() && self.user_answer != self.correct_answer
    }

    /// 正确题：两个答案都非空且相同
    pub fn is_correct(&self) -> bool {
        self.has_both_answers() && self.user_answer == self.correct_answer
    }
}

/// 题目中的一张图片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizImage {
    /// 页面中的原始地址（或内联 data URL）
    pub source_url: String,
    pub alt_text: String,
    /// 成功转换后的内嵌数据；为空时渲染回退到 `source_url`
    pub embedded_data: Option<String>,
    pub width: u32,
    pub height: u32,
}

pub const DEFAULT_IMAGE_ALT: &str = "题目图片";

impl QuizImage {
    pub fn new(source_url: impl Into<String>, alt_text: Option<String>) -> Self {
        Self {
            source_url: source_url.into(),
            alt_text: alt_text
                .filter(|alt| !alt.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_ALT.to_string()),
            embedded_data: None,
            width: 0,
            height: 0,
        }
    }

    /// 渲染时使用的地址：优先内嵌数据
    pub fn render_src(&self) -> &str {
        self.embedded_data.as_deref().unwrap_or(&self.source_url)
    }

    pub fn is_degraded(&self) -> bool {
        self.embedded_data.is_none()
    }
}

/// 题目统计（题目总数、题型数量、正确与错误数量）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuestionStats {
    pub total: usize,
    pub sections: usize,
    pub correct: usize,
    pub wrong: usize,
}
