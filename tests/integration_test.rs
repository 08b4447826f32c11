use async_trait::async_trait;
use chrono::NaiveDate;
use quiz_export::config::Config;
use quiz_export::error::{ExportError, ImageError};
use quiz_export::export::print::{render_print, ChunkRasterizer, PageGeometry, PrintChunk, Raster};
use quiz_export::export::{project, ProjectionContext};
use quiz_export::infrastructure::connect_to_browser_and_page;
use quiz_export::models::settings::MATH_PROMPT;
use quiz_export::models::{ApiProvider, Settings};
use quiz_export::services::ImageFetcher;
use quiz_export::{App, ExportFormat, QuestionId, ScrapedPage, SelectionMode};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const PAGE_URL: &str = "https://mooc.example.com/exam/review?id=42";

const PAGE: &str = r#"<html><head><title>作业详情</title></head><body>
<div class="mark_title">期末测验</div>
<div class="mark_item">
  <h2 class="type_tit">一. 单选题（共2题）</h2>
  <div class="questionLi">
    <h3 class="mark_name">下图中三角形的面积是多少？
      <img src="/img/ok.png" alt="三角形">
      <div class="mark_img"><img src="/img/ok.png"></div>
      <img src="//cdn.example.com/broken.png">
    </h3>
    <ul class="mark_letter"><li>A. 6</li><li>B. 12</li></ul>
    <div class="mark_answer"><span class="colorDeep">B</span><span class="colorGreen">A</span></div>
    <div class="mark_explain">底乘高除以二</div>
  </div>
  <div class="questionLi">
    <h3 class="mark_name">What is the past tense of "go"?</h3>
    <ul class="mark_letter"><li>A. went</li><li>B. goed</li></ul>
    <div class="mark_answer"><span class="colorDeep">A</span><span class="colorGreen">A</span></div>
  </div>
</div>
<div class="mark_item">
  <h2 class="type_tit">二. 判断题（共1题）</h2>
  <div class="questionLi">
    <h3 class="mark_name">水在标准大气压下100摄氏度沸腾</h3>
    <div class="mark_answer"><span class="colorDeep">对</span><span class="colorGreen">对</span></div>
  </div>
</div>
</body></html>"#;

/// 只提供 `ok.png`，其他地址一律失败
struct FixtureFetcher {
    calls: AtomicUsize,
}

impl FixtureFetcher {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !url.ends_with("/img/ok.png") {
            return Err(ImageError::fetch_failed(url, "404"));
        }
        let mut bytes = Vec::new();
        image::RgbaImage::new(4, 3)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| ImageError::fetch_failed(url, e))?;
        Ok(bytes)
    }
}

/// 按区块类型给出固定尺寸
struct FixedRasterizer;

#[async_trait]
impl ChunkRasterizer for FixedRasterizer {
    async fn rasterize(&self, _index: usize, chunk: &PrintChunk) -> Result<Raster, ExportError> {
        Ok(Raster {
            data_url: format!("data:image/png;base64,{}", chunk.html.len()),
            width: 800,
            height: 600,
        })
    }
}

fn temp_output(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("quiz_export_it_{}_{}", name, std::process::id()))
}

fn fixture_app(output_dir: &PathBuf, fetcher: Arc<FixtureFetcher>) -> App {
    let config = Config {
        output_dir: output_dir.display().to_string(),
        max_concurrent_images: 2,
        ..Config::default()
    };
    let settings = Settings {
        include_timestamp: false,
        ..Settings::default()
    };
    App::with_fetcher(config, settings, fetcher)
}

#[tokio::test]
async fn test_extract_and_export_fixture_page() {
    let dir = temp_output("pipeline");
    let fetcher = Arc::new(FixtureFetcher::new());
    let mut app = fixture_app(&dir, fetcher.clone());
    let page = ScrapedPage::parse(PAGE, Some(PAGE_URL)).unwrap();

    let summary = app.extract(&page, page.base_url()).await.unwrap().unwrap();
    assert_eq!(summary.sections, 2);
    assert_eq!(summary.questions, 3);
    // ok.png 出现两次只处理一次
    assert_eq!(summary.images, 2);
    assert_eq!(summary.embedded, 1);
    assert_eq!(summary.degraded, 1);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

    let ids: Vec<QuestionId> = app.store().questions().map(|q| q.id).collect();
    assert_eq!(ids, vec![QuestionId(0), QuestionId(1), QuestionId(2)]);

    let first = app.store().question(QuestionId(0)).unwrap();
    assert_eq!(first.images.len(), 2);
    assert_eq!(first.images[0].width, 4);
    assert_eq!(first.images[0].height, 3);
    assert!(first.images[0].render_src().starts_with("data:image/png;base64,"));
    assert!(first.images[1].is_degraded());
    assert_eq!(first.images[1].render_src(), "https://cdn.example.com/broken.png");

    // 未选择时导出全部题目
    assert_eq!(app.apply_selection(&SelectionMode::None), 0);
    let doc = app.export(ExportFormat::Word).await.unwrap();
    assert_eq!(doc.file_name().and_then(|n| n.to_str()), Some("期末测验.doc"));
    let html = tokio::fs::read_to_string(&doc).await.unwrap();
    assert!(html.contains("1. 下图中三角形的面积是多少？"));
    assert!(html.contains("水在标准大气压下100摄氏度沸腾"));
    assert!(html.contains("答案不匹配"));
    assert!(html.contains("底乘高除以二"));

    let xlsx = app.export(ExportFormat::Excel).await.unwrap();
    let bytes = tokio::fs::read(&xlsx).await.unwrap();
    assert!(bytes.starts_with(b"PK"));

    let txt = app.export(ExportFormat::Text).await.unwrap();
    let text = tokio::fs::read_to_string(&txt).await.unwrap();
    assert_eq!(text.lines().next(), Some("一. 单选题（共2题）"));
    assert!(text.lines().any(|line| line == "下图中三角形的面积是多少？"));
    assert!(text.lines().any(|line| line == "底乘高除以二"));

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_wrong_selection_titles_and_filters_export() {
    let dir = temp_output("wrong");
    let mut app = fixture_app(&dir, Arc::new(FixtureFetcher::new()));
    let page = ScrapedPage::parse(PAGE, Some(PAGE_URL)).unwrap();
    app.extract(&page, page.base_url()).await.unwrap();

    assert_eq!(app.apply_selection(&SelectionMode::Wrong), 1);
    let doc = app.export(ExportFormat::Word).await.unwrap();
    assert_eq!(
        doc.file_name().and_then(|n| n.to_str()),
        Some("期末测验_已选1题.doc")
    );
    let html = tokio::fs::read_to_string(&doc).await.unwrap();
    assert!(html.contains("三角形"));
    assert!(!html.contains("past tense"));

    assert_eq!(
        app.apply_selection(&SelectionMode::Ids(vec![QuestionId(1), QuestionId(9)])),
        1
    );

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn test_print_layout_from_fixture_page() {
    let mut app = fixture_app(&temp_output("print"), Arc::new(FixtureFetcher::new()));
    let page = ScrapedPage::parse(PAGE, Some(PAGE_URL)).unwrap();
    app.extract(&page, page.base_url()).await.unwrap();

    let snapshot = app.store().snapshot();
    let context = ProjectionContext {
        page_title: Some("期末测验".to_string()),
        now: NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap(),
    };
    let projection = project(&snapshot.sections, &snapshot.selection, app.settings(), &context);

    // 标题 + 2 个题型标题 + 3 道题，每块 555x416pt，每页放一块
    let (html, pages) = render_print(&projection, &FixedRasterizer, &PageGeometry::A4)
        .await
        .unwrap();
    assert_eq!(pages, 6);
    assert!(html.contains("Page 1"));
    assert!(html.contains("Page 6"));
    assert!(!html.contains("Page 7"));
}

#[test]
fn test_settings_without_custom_prompts() {
    let dir = temp_output("settings");
    let path = dir.join("settings.json");

    let settings = tokio_test::block_on(async {
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            &path,
            r#"{"hideMyAnswers":true,"aiSettings":{"apiType":"deepseek","apiKey":"sk-test"}}"#,
        )
        .await
        .unwrap();
        Settings::load(&path).await
    });

    assert!(settings.hide_my_answers);
    assert!(settings.show_explanation);
    assert_eq!(settings.ai_settings.api_type, ApiProvider::DeepSeek);
    assert_eq!(settings.ai_settings.api_key, "sk-test");
    assert_eq!(settings.ai_settings.custom_prompts.math, MATH_PROMPT);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_browser_connection() {
    let config = Config::from_env();

    let result = connect_to_browser_and_page(
        config.browser_debug_port,
        config.target_url.as_deref(),
        config.target_title.as_deref(),
    )
    .await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_live_page_pdf_export() {
    let mut app = App::initialize(Config::from_env())
        .await
        .expect("初始化失败");
    let page = app.load_live_page().await.expect("读取页面失败");
    let base = page.base_url().cloned();

    app.extract(&page, base.as_ref())
        .await
        .expect("解析失败")
        .expect("页面中没有题目");
    let path = app.export(ExportFormat::Pdf).await.expect("导出 PDF 失败");

    assert!(path.exists());
}
