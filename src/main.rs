use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};

use quiz_export::models::ApiProvider;
use quiz_export::utils::logging;
use quiz_export::{App, Config, ExportFormat, QuestionId, SelectionMode};

/// 解析已批改的测验页面并导出题目
#[derive(Parser, Debug)]
#[command(name = "quiz_export", version, about)]
struct Args {
    /// 保存到本地的测验页面
    #[arg(short, long, conflicts_with = "live")]
    input: Option<PathBuf>,

    /// 附着到浏览器中已打开的测验页面
    #[arg(long)]
    live: bool,

    /// 页面基础地址，用于补全相对图片路径
    #[arg(long)]
    base_url: Option<String>,

    /// 导出格式，可重复：xlsx / doc / pdf / txt
    #[arg(short, long = "format")]
    formats: Vec<ExportFormat>,

    /// 选择方式
    #[arg(long, value_enum, default_value_t = SelectArg::None)]
    select: SelectArg,

    /// 按编号选择（q_3 或 3），逗号分隔
    #[arg(long, value_delimiter = ',', conflicts_with = "select")]
    ids: Vec<QuestionId>,

    /// 为选中的题目（未选择时为全部）获取 AI 解答
    #[arg(long)]
    ai: bool,

    /// AI 服务商，覆盖设置文件
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// AI 密钥，覆盖设置文件
    #[arg(long)]
    api_key: Option<String>,

    /// 导出目录
    #[arg(short, long)]
    out: Option<String>,

    /// 额外写出题目数据 JSON
    #[arg(long)]
    dump_json: Option<PathBuf>,

    /// 结束时保存设置
    #[arg(long)]
    save_settings: bool,

    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SelectArg {
    None,
    All,
    Wrong,
    Correct,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProviderArg {
    Openai,
    Deepseek,
    Gemini,
    Anthropic,
}

impl From<ProviderArg> for ApiProvider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Openai => ApiProvider::OpenAi,
            ProviderArg::Deepseek => ApiProvider::DeepSeek,
            ProviderArg::Gemini => ApiProvider::Gemini,
            ProviderArg::Anthropic => ApiProvider::Anthropic,
        }
    }
}

impl Args {
    fn selection_mode(&self) -> SelectionMode {
        if !self.ids.is_empty() {
            return SelectionMode::Ids(self.ids.clone());
        }
        match self.select {
            SelectArg::None => SelectionMode::None,
            SelectArg::All => SelectionMode::All,
            SelectArg::Wrong => SelectionMode::Wrong,
            SelectArg::Correct => SelectionMode::Correct,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 加载配置
    let mut config = Config::from_env();
    config.verbose_logging |= args.verbose;
    if let Some(out) = &args.out {
        config.output_dir = out.clone();
    }
    if args.base_url.is_some() {
        config.page_base_url = args.base_url.clone();
    }

    // 初始化日志
    logging::init(config.verbose_logging);

    let source = match (&args.input, args.live) {
        (Some(path), false) => path.display().to_string(),
        (None, true) => format!("浏览器调试端口 {}", config.browser_debug_port),
        _ => bail!("请指定 --input <文件> 或 --live"),
    };
    logging::log_startup(&source, config.max_concurrent_images);

    let mut app = App::initialize(config).await?;
    if let Some(provider) = args.provider {
        app.settings_mut().ai_settings.api_type = provider.into();
    }
    if let Some(key) = &args.api_key {
        app.settings_mut().ai_settings.api_key = key.clone();
    }

    let page = match &args.input {
        Some(path) => app.load_file_page(path).await?,
        None => app.load_live_page().await?,
    };
    let base = page.base_url().cloned();
    if app.extract(&page, base.as_ref()).await?.is_none() {
        warn!("⚠️ 未找到题目内容，请确认页面为已批改的测验");
        return Ok(());
    }

    app.apply_selection(&args.selection_mode());

    if args.ai {
        let ids: Vec<QuestionId> = if app.store().selection().is_empty() {
            app.store().questions().map(|q| q.id).collect()
        } else {
            app.store().selection().iter().copied().collect()
        };
        if let Err(e) = app.request_ai_answers(&ids).await {
            warn!("❌ AI 解答不可用: {}", e);
        }
    }

    let mut failed = 0;
    for format in &args.formats {
        if let Err(e) = app.export(*format).await {
            warn!("❌ 导出{}失败: {:#}", format.label(), e);
            failed += 1;
        }
    }

    if let Some(path) = &args.dump_json {
        app.dump_json(path).await?;
    }
    if args.save_settings {
        app.save_settings().await?;
    }

    info!("🏁 完成: 导出 {} 种格式, 失败 {}", args.formats.len() - failed, failed);
    Ok(())
}
