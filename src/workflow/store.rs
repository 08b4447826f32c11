//! 题目存储 - 流程层
//!
//! 持有一次解析得到的全部题型，以及用户的导出选择集。
//! 选择集为空表示“导出全部”。

use std::collections::BTreeSet;
use tracing::debug;

use crate::models::{Question, QuestionId, QuestionStats, Section};

/// 渲染使用的只读快照
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub sections: Vec<Section>,
    pub selection: BTreeSet<QuestionId>,
}

/// 题目存储
#[derive(Debug, Default)]
pub struct QuestionStore {
    sections: Vec<Section>,
    selection: BTreeSet<QuestionId>,
    /// 上一次普通点击的题目，用于范围选择
    last_touched: Option<QuestionId>,
}

impl QuestionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 整体替换题目，选择集随之清空
    pub fn set_sections(&mut self, sections: Vec<Section>) {
        self.sections = sections;
        self.selection.clear();
        self.last_touched = None;
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn selection(&self) -> &BTreeSet<QuestionId> {
        &self.selection
    }

    pub fn is_selected(&self, id: QuestionId) -> bool {
        self.selection.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.questions.is_empty())
    }

    /// 按文档顺序展开的全部题目
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions().find(|q| q.id == id)
    }

    fn question_mut(&mut self, id: QuestionId) -> Option<&mut Question> {
        self.sections
            .iter_mut()
            .flat_map(|s| s.questions.iter_mut())
            .find(|q| q.id == id)
    }

    fn position(&self, id: QuestionId) -> Option<usize> {
        self.questions().position(|q| q.id == id)
    }

    /// 切换一道题的选中状态，返回切换后的状态；编号不存在时返回 `None`
    ///
    /// `extend_range` 为真且存在上一次点击时，把新状态应用到两者之间（含两端）的全部题目，
    /// 此时不更新上一次点击的位置
    pub fn toggle_selection(&mut self, id: QuestionId, extend_range: bool) -> Option<bool> {
        let current = self.position(id)?;
        let checked = !self.selection.contains(&id);

        let anchor = if extend_range {
            self.last_touched.and_then(|last| self.position(last))
        } else {
            None
        };

        match anchor {
            Some(last) => {
                let (start, end) = (current.min(last), current.max(last));
                let range: Vec<QuestionId> = self
                    .questions()
                    .skip(start)
                    .take(end - start + 1)
                    .map(|q| q.id)
                    .collect();
                debug!("范围选择 {} 道题: {}", range.len(), checked);
                for qid in range {
                    self.apply(qid, checked);
                }
            }
            None => {
                self.apply(id, checked);
                self.last_touched = Some(id);
            }
        }

        Some(checked)
    }

    fn apply(&mut self, id: QuestionId, checked: bool) {
        if checked {
            self.selection.insert(id);
        } else {
            self.selection.remove(&id);
        }
    }

    pub fn select_all(&mut self) {
        let ids: Vec<QuestionId> = self.questions().map(|q| q.id).collect();
        self.selection.extend(ids);
    }

    pub fn select_none(&mut self) {
        self.selection.clear();
    }

    /// 把满足条件的题目加入选择集（不清除已有选择）
    pub fn select_where<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&Question) -> bool,
    {
        let ids: Vec<QuestionId> = self
            .questions()
            .filter(|q| predicate(*q))
            .map(|q| q.id)
            .collect();
        let count = ids.len();
        self.selection.extend(ids);
        count
    }

    /// 只选中错题
    pub fn select_wrong(&mut self) -> usize {
        self.select_none();
        self.select_where(Question::is_wrong)
    }

    /// 只选中答对的题
    pub fn select_correct(&mut self) -> usize {
        self.select_none();
        self.select_where(Question::is_correct)
    }

    /// 写回 AI 解答，编号不存在时返回 false
    pub fn set_ai_answer(&mut self, id: QuestionId, answer: impl Into<String>) -> bool {
        match self.question_mut(id) {
            Some(question) => {
                question.ai_answer = Some(answer.into());
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> QuestionStats {
        QuestionStats {
            total: self.questions().count(),
            sections: self.sections.len(),
            correct: self.questions().filter(|q| q.is_correct()).count(),
            wrong: self.questions().filter(|q| q.is_wrong()).count(),
        }
    }

    /// 复制当前题目与选择集，渲染期间不再读取存储
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            sections: self.sections.clone(),
            selection: self.selection.clone(),
        }
    }

    /// 全部题目的纯文本，每项一行
    pub fn plain_text(&self) -> String {
        self.render_text(|_| true)
    }

    /// 选中题目的纯文本；选择集为空时等同于全部
    ///
    /// 没有选中题目的题型整体省略
    pub fn selected_plain_text(&self) -> String {
        if self.selection.is_empty() {
            return self.plain_text();
        }
        self.render_text(|q| self.selection.contains(&q.id))
    }

    fn render_text<P: Fn(&Question) -> bool>(&self, include: P) -> String {
        let mut out = String::new();
        for section in &self.sections {
            let mut questions = section.questions.iter().filter(|q| include(*q)).peekable();
            if questions.peek().is_none() {
                continue;
            }
            push_line(&mut out, &section.name);
            for question in questions {
                push_line(&mut out, &question.text);
                for option in &question.options {
                    push_line(&mut out, option);
                }
                if !question.user_answer.is_empty() || !question.correct_answer.is_empty() {
                    push_line(&mut out, &question.user_answer);
                    push_line(&mut out, &question.correct_answer);
                }
                if !question.explanation.is_empty() {
                    push_line(&mut out, &question.explanation);
                }
            }
        }
        out
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}
