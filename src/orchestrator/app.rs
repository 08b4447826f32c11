//! 应用编排 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、设置、图片下载器
//! 2. **页面获取**：读取保存的 HTML，或附着到已登录的浏览器标签页
//! 3. **解析**：一次只允许一个解析过程，结束后整体替换题目存储
//! 4. **选择与 AI 解答**：转发到题目存储与解答服务
//! 5. **导出**：快照 → 投影 → 渲染 → 写文件
//!
//! 只做调度和统计，不做具体业务判断

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{AppResult, BusinessError, ExportError};
use crate::export::{
    self, document, pdf, project, tabular, ExportFormat, ProjectionContext,
};
use crate::infrastructure::{self, JsExecutor};
use crate::models::{QuestionId, Settings};
use crate::services::image_resolver::{HttpImageFetcher, ImageFetcher, ImageResolver};
use crate::services::llm_service::AnswerService;
use crate::source::{QuizDocument, ScrapedPage};
use crate::utils::logging;
use crate::workflow::{scan, ExtractOutcome, ExtractionSummary, LogProgress, QuestionStore};

/// 导出时的选择方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// 不选择（导出全部）
    None,
    All,
    Wrong,
    Correct,
    Ids(Vec<QuestionId>),
}

/// 离开作用域时清除处理标记
struct ProcessingGuard(Arc<AtomicBool>);

impl ProcessingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, BusinessError> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(BusinessError::ExtractionInProgress);
        }
        Ok(Self(flag.clone()))
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 应用主结构
pub struct App {
    config: Config,
    settings: Settings,
    fetcher: Arc<dyn ImageFetcher>,
    store: QuestionStore,
    page_title: Option<String>,
    processing: Arc<AtomicBool>,
    browser: Option<Browser>,
    print_page: Option<Arc<JsExecutor>>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        if let Err(e) = logging::init_log_file(&config.output_log_file) {
            warn!("初始化日志文件失败: {}", e);
        }

        let settings = Settings::load(&config.settings_file).await;
        let fetcher = HttpImageFetcher::new(Duration::from_secs(config.image_timeout_secs))
            .context("创建图片下载客户端失败")?;

        Ok(Self::with_fetcher(config, settings, Arc::new(fetcher)))
    }

    /// 使用指定的图片下载器创建应用
    pub fn with_fetcher(config: Config, settings: Settings, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            config,
            settings,
            fetcher,
            store: QuestionStore::new(),
            page_title: None,
            processing: Arc::new(AtomicBool::new(false)),
            browser: None,
            print_page: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn store(&self) -> &QuestionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut QuestionStore {
        &mut self.store
    }

    /// 读取保存的页面
    pub async fn load_file_page(&self, path: &Path) -> Result<ScrapedPage> {
        let html = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("读取页面文件失败: {}", path.display()))?;
        let page = ScrapedPage::parse(&html, self.config.page_base_url.as_deref())?;
        info!("📄 已读取页面文件: {}", path.display());
        Ok(page)
    }

    /// 附着到浏览器中的试题页面并读取其内容
    pub async fn load_live_page(&mut self) -> Result<ScrapedPage> {
        let (browser, page) = infrastructure::connect_to_browser_and_page(
            self.config.browser_debug_port,
            self.config.target_url.as_deref(),
            self.config.target_title.as_deref(),
        )
        .await?;
        let executor = JsExecutor::new(page);

        let html = executor.content().await?;
        let base = match &self.config.page_base_url {
            Some(base) => Some(base.clone()),
            None => executor.base_uri().await.ok(),
        };
        self.browser = Some(browser);

        Ok(ScrapedPage::parse(&html, base.as_deref())?)
    }

    /// 执行一次解析，完成后整体替换题目存储
    ///
    /// 返回 `None` 表示页面中没有试题内容
    pub async fn extract<D: QuizDocument>(
        &mut self,
        document: &D,
        page_base: Option<&Url>,
    ) -> AppResult<Option<ExtractionSummary>> {
        let _guard = ProcessingGuard::acquire(&self.processing)?;
        info!("🔍 开始解析题目...");

        let pending = match scan(document) {
            ExtractOutcome::NoContent => {
                self.store.set_sections(Vec::new());
                self.page_title = None;
                return Ok(None);
            }
            ExtractOutcome::Pending(pending) => pending,
        };
        self.page_title = document.page_title();

        let resolver = Arc::new(ImageResolver::new(self.fetcher.clone(), page_base.cloned()));
        let extraction = pending
            .resolve_images(resolver, &LogProgress, self.config.max_concurrent_images)
            .await;

        self.store.set_sections(extraction.sections);
        logging::log_extraction_summary(&extraction.summary, &self.store.stats());
        Ok(Some(extraction.summary))
    }

    /// 按方式重建选择集，返回选中数量
    pub fn apply_selection(&mut self, mode: &SelectionMode) -> usize {
        match mode {
            SelectionMode::None => self.store.select_none(),
            SelectionMode::All => self.store.select_all(),
            SelectionMode::Wrong => {
                self.store.select_wrong();
            }
            SelectionMode::Correct => {
                self.store.select_correct();
            }
            SelectionMode::Ids(ids) => {
                self.store.select_none();
                for id in ids {
                    if self.store.toggle_selection(*id, false).is_none() {
                        warn!("题目 {} 不存在，已忽略", id);
                    }
                }
            }
        }
        let count = self.store.selection().len();
        info!("☑️ 已选择 {} 道题目", count);
        count
    }

    /// 为指定题目获取 AI 解答，返回成功数量
    ///
    /// 未设置密钥时直接返回错误；单道题失败只记录日志
    pub async fn request_ai_answers(&mut self, ids: &[QuestionId]) -> AppResult<usize> {
        if self.store.is_empty() {
            return Err(BusinessError::NothingExtracted.into());
        }
        let service = AnswerService::new(&self.settings.ai_settings)?;
        let mut answered = 0;
        for id in ids {
            match service.answer(&mut self.store, *id).await {
                Ok(_) => answered += 1,
                Err(e) => warn!("❌ [{}] 获取AI解答失败: {}", id, e),
            }
        }
        info!("🤖 AI 解答完成: {}/{}", answered, ids.len());
        Ok(answered)
    }

    /// 导出一种格式，返回生成的文件路径
    pub async fn export(&mut self, format: ExportFormat) -> AppResult<PathBuf> {
        let snapshot = self.store.snapshot();
        let context = ProjectionContext {
            page_title: self.page_title.clone(),
            now: chrono::Local::now().naive_local(),
        };
        let projection = project(&snapshot.sections, &snapshot.selection, &self.settings, &context);
        projection.ensure_rows()?;

        let path = Path::new(&self.config.output_dir).join(projection.file_name(format.extension()));
        info!("📦 正在创建{}...", format.label());

        match format {
            ExportFormat::Excel => {
                let sheet = tabular::tabulate(&projection)?;
                tokio::fs::create_dir_all(&self.config.output_dir)
                    .await
                    .map_err(|source| ExportError::WriteFailed {
                        path: self.config.output_dir.clone(),
                        source,
                    })?;
                tabular::write_xlsx(&sheet, &path)?;
            }
            ExportFormat::Word => {
                let html = document::render_document(&projection)?;
                export::write_text_file(&path, &html).await?;
            }
            ExportFormat::Text => {
                let text = self.store.selected_plain_text();
                export::write_text_file(&path, &text).await?;
            }
            ExportFormat::Pdf => {
                let executor = self.print_page().await?;
                tokio::fs::create_dir_all(&self.config.output_dir)
                    .await
                    .map_err(|source| ExportError::WriteFailed {
                        path: self.config.output_dir.clone(),
                        source,
                    })?;
                let pages = pdf::write_pdf(&projection, executor, &path).await?;
                info!("📄 PDF 共 {} 页", pages);
            }
        }

        logging::log_export_done(format.label(), &path.display().to_string(), projection.rows.len());
        Ok(path)
    }

    /// 导出用的空白页；离线模式下按需启动无头浏览器
    async fn print_page(&mut self) -> AppResult<Arc<JsExecutor>> {
        if let Some(page) = &self.print_page {
            return Ok(page.clone());
        }
        let browser = match self.browser.take() {
            Some(browser) => browser,
            None => {
                infrastructure::launch_headless_browser(self.config.chrome_executable.as_deref())
                    .await?
            }
        };
        let browser = self.browser.insert(browser);
        let page = infrastructure::open_scratch_page(browser).await?;
        let executor = Arc::new(JsExecutor::new(page));
        self.print_page = Some(executor.clone());
        Ok(executor)
    }

    /// 保存当前设置
    pub async fn save_settings(&self) -> AppResult<()> {
        self.settings.save(&self.config.settings_file).await?;
        info!("💾 设置已保存: {}", self.config.settings_file);
        Ok(())
    }

    /// 以 JSON 导出当前题目模型
    pub async fn dump_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self.store.sections())?;
        export::write_text_file(path, &json).await?;
        info!("🧾 题目数据已写入: {}", path.display());
        Ok(())
    }
}
