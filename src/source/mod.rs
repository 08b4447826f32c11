//! 页面来源
//!
//! `document` 定义抽取流程依赖的能力，`html` 是基于 scraper 的实现

pub mod document;
pub mod html;

pub use document::{FieldResult, ImageCandidate, QuestionFields, QuizDocument};
pub use html::ScrapedPage;
