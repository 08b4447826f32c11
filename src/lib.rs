//! # Quiz Export
//!
//! 从已批改的在线测验页面中解析题目、管理选择集、获取 AI 解答并导出为
//! Excel / Word / PDF / 纯文本
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Browser、Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval / 截图 / 打印能力
//!
//! ### ② 业务能力层（Services / Source / Export）
//! - `source/` - 页面结构抽象，`ScrapedPage` 为 scraper 实现
//! - `services/image_resolver` - 图片下载与内嵌
//! - `services/llm_service` - 多服务商 AI 解答
//! - `export/` - 投影与各格式渲染
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/extractor` - 一次完整解析（扫描 → 并发处理图片）
//! - `workflow/store` - 题目存储与选择集
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 解析 → 选择 → AI 解答 → 导出
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod export;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod source;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use export::ExportFormat;
pub use infrastructure::JsExecutor;
pub use models::{Question, QuestionId, Section, Settings};
pub use orchestrator::{App, SelectionMode};
pub use source::ScrapedPage;
pub use workflow::QuestionStore;
