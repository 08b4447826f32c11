/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 在线模式下要附着的页面 URL（为空时按标题查找）
    pub target_url: Option<String>,
    /// 在线模式下要附着的页面标题关键字
    pub target_title: Option<String>,
    /// 页面基础地址，用于补全相对图片路径
    pub page_base_url: Option<String>,
    /// 离线模式导出 PDF 时启动的浏览器可执行文件（为空时自动查找）
    pub chrome_executable: Option<String>,
    /// 导出文件目录
    pub output_dir: String,
    /// 设置文件路径
    pub settings_file: String,
    /// 同时处理的图片数量
    pub max_concurrent_images: usize,
    /// 单张图片下载超时（秒）
    pub image_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: None,
            target_title: None,
            page_base_url: None,
            chrome_executable: None,
            output_dir: "output".to_string(),
            settings_file: "quiz_export_settings.json".to_string(),
            max_concurrent_images: 16,
            image_timeout_secs: 15,
            verbose_logging: false,
            output_log_file: "quiz_export.log".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            target_url: std::env::var("TARGET_URL").ok().filter(|v| !v.trim().is_empty()),
            target_title: std::env::var("TARGET_TITLE").ok().filter(|v| !v.trim().is_empty()),
            page_base_url: std::env::var("PAGE_BASE_URL").ok().filter(|v| !v.trim().is_empty()),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().filter(|v| !v.trim().is_empty()),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(default.output_dir),
            settings_file: std::env::var("SETTINGS_FILE").unwrap_or(default.settings_file),
            max_concurrent_images: std::env::var("MAX_CONCURRENT_IMAGES").ok().and_then(|v| v.parse().ok()).filter(|n: &usize| *n > 0).unwrap_or(default.max_concurrent_images),
            image_timeout_secs: std::env::var("IMAGE_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.image_timeout_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }
}
