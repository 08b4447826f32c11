use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 页面结构读取错误
    #[error("页面解析错误: {0}")]
    Source(#[from] SourceError),
    /// 图片处理错误
    #[error("图片错误: {0}")]
    Image(#[from] ImageError),
    /// 导出错误
    #[error("导出错误: {0}")]
    Export(#[from] ExportError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 设置读写错误
    #[error("设置错误: {0}")]
    Settings(#[from] SettingsError),
    /// 业务流程错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 启动无头浏览器失败
    #[error("启动无头浏览器失败: {reason}")]
    LaunchFailed { reason: String },
    /// 执行页面操作失败
    #[error("页面操作失败 ({action}): {source}")]
    PageOperationFailed {
        action: &'static str,
        #[source]
        source: chromiumoxide::error::CdpError,
    },
    /// 脚本返回值与预期不符
    #[error("脚本返回值无法解析: {reason}")]
    UnexpectedScriptResult { reason: String },
}

/// 页面结构读取错误
///
/// 只影响单个字段，由抽取流程就地降级处理
#[derive(Debug, Error)]
pub enum SourceError {
    /// 选择器无法编译
    #[error("选择器无效: {selector}")]
    InvalidSelector { selector: String },
    /// 节点存在但内容不可用
    #[error("字段 {field} 读取失败: {reason}")]
    FieldUnavailable { field: &'static str, reason: String },
}

/// 图片处理错误
#[derive(Debug, Error)]
pub enum ImageError {
    /// URL 为空或协议不受支持
    #[error("无效的图片URL: {url:?}")]
    InvalidUrl { url: String },
    /// 下载失败
    #[error("加载图片失败 ({url}): {reason}")]
    FetchFailed { url: String, reason: String },
    /// HTTP 状态码非 2xx
    #[error("加载图片失败 ({url}): HTTP {status}")]
    BadStatus { url: String, status: u16 },
    /// 解码或重新编码失败
    #[error("转换图片失败 ({url}): {reason}")]
    DecodeFailed { url: String, reason: String },
}

/// 导出错误
#[derive(Debug, Error)]
pub enum ExportError {
    /// 没有可导出的数据
    #[error("没有数据可供下载")]
    NoData,
    /// 表格写入失败
    #[error("生成Excel失败: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
    /// 写文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 渲染区块失败
    #[error("渲染第 {index} 个区块失败: {reason}")]
    RasterizeFailed { index: usize, reason: String },
    /// 打印 PDF 失败
    #[error("生成PDF失败: {reason}")]
    PrintFailed { reason: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 未配置密钥
    #[error("未设置API密钥")]
    MissingApiKey,
    /// 题目不存在
    #[error("题目 {id} 不存在")]
    UnknownQuestion { id: String },
    /// 网络请求失败
    #[error("网络请求失败 ({provider}): {reason}")]
    RequestFailed { provider: &'static str, reason: String },
    /// 非 2xx 响应
    #[error("请求失败，状态码: {status} ({message})")]
    BadStatus { status: u16, message: String },
    /// 响应结构不符合预期
    #[error("解析响应失败 ({provider}): {reason}")]
    MalformedResponse { provider: &'static str, reason: String },
}

/// 设置读写错误
#[derive(Debug, Error)]
pub enum SettingsError {
    /// 写入设置文件失败
    #[error("保存设置失败 ({path}): {source}")]
    SaveFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("序列化设置失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 业务流程错误
#[derive(Debug, Error)]
pub enum BusinessError {
    /// 上一次解析尚未完成
    #[error("正在处理中，请等待上一次解析完成")]
    ExtractionInProgress,
    /// 尚未解析题目
    #[error("尚未解析题目")]
    NothingExtracted,
}

// ========== 便捷构造函数 ==========

impl ImageError {
    pub fn fetch_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        ImageError::FetchFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn decode_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        ImageError::DecodeFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl BrowserError {
    pub fn page_operation(action: &'static str, source: chromiumoxide::error::CdpError) -> Self {
        BrowserError::PageOperationFailed { action, source }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
