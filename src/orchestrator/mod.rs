//! 编排层（Orchestration Layer）
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (一次解析 → 选择 → AI 解答 → 导出)
//!     ↓
//! workflow (extractor: 解析题目 / store: 题目与选择集)
//!     ↓
//! services (能力层：图片解析 / AI 解答)   export (投影与渲染)
//!     ↓
//! source (页面结构)   infrastructure (浏览器、JsExecutor)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有 Browser 和 JsExecutor
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计

pub mod app;

pub use app::{App, SelectionMode};
