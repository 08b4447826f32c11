//! 题目抽取流程 - 流程层
//!
//! 分两步完成一次解析：
//! 1. `scan`：同步遍历页面，按文档顺序分配编号，为每张图片预留位置
//! 2. `resolve_images`：并发解析全部图片，结果写回预留位置，全部结束后才交出数据
//!
//! 图片完成的先后不影响题目与题型的顺序。

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::ImageError;
use crate::models::{Question, QuestionId, QuizImage, Section};
use crate::services::image_resolver::{ImageResolver, Resolved};
use crate::source::{FieldResult, QuizDocument};
use crate::utils::truncate_text;

pub const DEFAULT_SECTION_NAME: &str = "未命名题型";
pub const DEFAULT_QUESTION_TEXT: &str = "未找到题目";

/// 图片进度观察者
pub trait ProgressObserver: Send + Sync {
    /// 每张图片结束（成功或退化）后调用一次
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F> ProgressObserver for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// 以日志输出进度
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        let percent = if total == 0 { 100 } else { completed * 100 / total };
        info!("🖼️ 处理图片 {}/{} ({}%)", completed, total, percent);
    }
}

/// 扫描结果
pub enum ExtractOutcome {
    /// 页面中没有任何题型节点
    NoContent,
    /// 题目已就绪，图片待解析
    Pending(PendingExtraction),
}

/// 图片在数据模型中的位置
#[derive(Debug, Clone, Copy)]
struct ImageSlot {
    section: usize,
    question: usize,
    image: usize,
}

#[derive(Debug)]
struct ImageJob {
    slot: ImageSlot,
    url: String,
}

/// 解析统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub sections: usize,
    pub questions: usize,
    pub images: usize,
    pub embedded: usize,
    pub degraded: usize,
}

/// 一次完整解析的结果
#[derive(Debug)]
pub struct Extraction {
    pub sections: Vec<Section>,
    pub summary: ExtractionSummary,
}

/// 已完成扫描、等待图片解析的中间状态
#[derive(Debug)]
pub struct PendingExtraction {
    sections: Vec<Section>,
    jobs: Vec<ImageJob>,
}

/// 扫描页面，构建题目模型
pub fn scan<D: QuizDocument>(document: &D) -> ExtractOutcome {
    let section_nodes = document.list_section_nodes();
    if section_nodes.is_empty() {
        warn!("⚠️ 未找到题目内容");
        return ExtractOutcome::NoContent;
    }

    let mut sections = Vec::with_capacity(section_nodes.len());
    let mut jobs = Vec::new();
    let mut next_id = 0usize;

    for (section_index, section_node) in section_nodes.into_iter().enumerate() {
        let name = document
            .section_label(section_node)
            .unwrap_or_else(|| DEFAULT_SECTION_NAME.to_string());
        let mut section = Section::new(name);

        let question_nodes = document.question_nodes(section_node);
        if question_nodes.is_empty() {
            debug!("题型 {} 中没有题目", section.name);
        }

        for (question_index, question_node) in question_nodes.into_iter().enumerate() {
            let id = QuestionId(next_id);
            next_id += 1;

            let mut question = build_question(document, question_node, id);

            // 同一道题内按地址去重，重复的不再解析
            let mut seen = HashSet::new();
            for candidate in document.find_images(question_node) {
                if !seen.insert(candidate.src.clone()) {
                    continue;
                }
                let mut image = QuizImage::new(candidate.src.clone(), candidate.alt);
                image.width = candidate.width;
                image.height = candidate.height;

                jobs.push(ImageJob {
                    slot: ImageSlot {
                        section: section_index,
                        question: question_index,
                        image: question.images.len(),
                    },
                    url: candidate.src,
                });
                question.images.push(image);
            }

            debug!(
                "题目 {} \"{}\" 中找到 {} 个图片",
                id,
                truncate_text(&question.text, 20),
                question.images.len()
            );
            section.questions.push(question);
        }

        sections.push(section);
    }

    ExtractOutcome::Pending(PendingExtraction { sections, jobs })
}

fn build_question<'a, D: QuizDocument>(
    document: &'a D,
    node: D::Node<'a>,
    id: QuestionId,
) -> Question {
    let fields = document.question_fields(node);

    let text = text_field(fields.text, "题目", id);
    let mut question = Question::new(
        id,
        if text.is_empty() {
            DEFAULT_QUESTION_TEXT.to_string()
        } else {
            text
        },
    );

    question.options = match fields.options {
        Ok(options) => options.unwrap_or_default(),
        Err(e) => {
            warn!("题目 {} 选项读取失败: {}", id, e);
            Vec::new()
        }
    };
    question.user_answer = text_field(fields.user_answer, "我的答案", id);
    question.correct_answer = text_field(fields.correct_answer, "正确答案", id);
    question.explanation = text_field(fields.explanation, "题目解析", id);
    question
}

/// 单个字段失败只影响该字段
fn text_field(result: FieldResult<String>, field: &str, id: QuestionId) -> String {
    match result {
        Ok(value) => value.map(|v| v.trim().to_string()).unwrap_or_default(),
        Err(e) => {
            warn!("题目 {} 的{}读取失败，按空处理: {}", id, field, e);
            String::new()
        }
    }
}

impl PendingExtraction {
    /// 已分配编号的题目（图片尚未解析）
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    pub fn image_count(&self) -> usize {
        self.jobs.len()
    }

    /// 并发解析全部图片，所有任务结束后返回
    ///
    /// 解析器从不因下载失败而报错；无效地址与任务异常都只会让该图片保持原始地址
    pub async fn resolve_images(
        self,
        resolver: Arc<ImageResolver>,
        observer: &dyn ProgressObserver,
        max_concurrent: usize,
    ) -> Extraction {
        let PendingExtraction { mut sections, jobs } = self;
        let total = jobs.len();

        if total > 0 {
            info!("🔄 正在处理 {} 个图片...", total);
        }

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let resolver = resolver.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = resolver.resolve(&job.url).await;
                (job, result)
            });
        }

        let mut completed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok((job, result)) => apply_resolution(&mut sections, &job, result),
                Err(e) => error!("图片任务执行失败: {}", e),
            }
            observer.on_progress(completed, total);
        }

        let summary = summarize(&sections);
        Extraction { sections, summary }
    }
}

fn apply_resolution(sections: &mut [Section], job: &ImageJob, result: Result<Resolved, ImageError>) {
    let Some(image) = sections
        .get_mut(job.slot.section)
        .and_then(|s| s.questions.get_mut(job.slot.question))
        .and_then(|q| q.images.get_mut(job.slot.image))
    else {
        error!("图片位置不存在: {:?}", job.slot);
        return;
    };

    match result {
        Ok(Resolved::Embedded {
            data_url,
            width,
            height,
        }) => {
            image.embedded_data = Some(data_url);
            if width > 0 && height > 0 {
                image.width = width;
                image.height = height;
            }
        }
        Ok(Resolved::Degraded { .. }) => {
            image.embedded_data = None;
        }
        Err(e) => {
            warn!("跳过图片转换: {}", e);
            image.embedded_data = None;
        }
    }
}

fn summarize(sections: &[Section]) -> ExtractionSummary {
    let mut summary = ExtractionSummary {
        sections: sections.len(),
        ..Default::default()
    };
    for question in sections.iter().flat_map(|s| &s.questions) {
        summary.questions += 1;
        for image in &question.images {
            summary.images += 1;
            if image.is_degraded() {
                summary.degraded += 1;
            } else {
                summary.embedded += 1;
            }
        }
    }
    summary
}
