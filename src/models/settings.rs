//! 用户设置
//!
//! 以 JSON 持久化；读取时逐字段回退到默认值，单个字段损坏不影响其余字段

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::SettingsError;

pub const DEFAULT_PROMPT: &str = "你是一位专业的题目解析助手，请根据以下题目给出详细的解答和分析。";
pub const MATH_PROMPT: &str = "你是一位数学专家，请分析以下数学题目，给出详细的解题步骤和思路。";
pub const ENGLISH_PROMPT: &str =
    "你是一位优秀的英语教师，请分析以下英语题目，解释相关语法、词汇知识点和答案依据。";
pub const SCIENCE_PROMPT: &str = "你是一位理科专家，请分析以下科学题目，给出详细的解答并解释相关科学原理。";

/// 显示与导出设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub hide_my_answers: bool,
    pub include_timestamp: bool,
    pub show_explanation: bool,
    pub dark_mode: bool,
    pub custom_title: String,
    pub animations_enabled: bool,
    pub ai_settings: AiSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hide_my_answers: false,
            include_timestamp: true,
            show_explanation: true,
            dark_mode: false,
            custom_title: String::new(),
            animations_enabled: true,
            ai_settings: AiSettings::default(),
        }
    }
}

/// AI 解答服务商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    #[serde(rename = "openai")]
    OpenAi,
    DeepSeek,
    Gemini,
    Anthropic,
}

impl ApiProvider {
    /// 展示名称
    pub fn display_name(self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "OpenAI",
            ApiProvider::DeepSeek => "DeepSeek",
            ApiProvider::Gemini => "Gemini",
            ApiProvider::Anthropic => "Claude",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// AI 解答设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub api_type: ApiProvider,
    pub api_key: String,
    pub temperature: f32,
    pub default_prompt: String,
    pub custom_prompts: CustomPrompts,
    pub show_in_toolbox: bool,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            api_type: ApiProvider::OpenAi,
            api_key: String::new(),
            temperature: 0.7,
            default_prompt: DEFAULT_PROMPT.to_string(),
            custom_prompts: CustomPrompts::default(),
            show_in_toolbox: true,
        }
    }
}

/// 按学科分类的提示词模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomPrompts {
    pub math: String,
    pub english: String,
    pub science: String,
}

impl Default for CustomPrompts {
    fn default() -> Self {
        Self {
            math: MATH_PROMPT.to_string(),
            english: ENGLISH_PROMPT.to_string(),
            science: SCIENCE_PROMPT.to_string(),
        }
    }
}

impl Settings {
    /// 从 JSON 文本读取设置
    ///
    /// 文本无法解析时整体使用默认值；单个字段缺失或类型不对时只回退该字段
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(obj)) => Self::from_object(&obj),
            Ok(other) => {
                warn!("设置内容不是对象，使用默认设置: {}", other);
                Self::default()
            }
            Err(e) => {
                warn!("加载设置失败，使用默认设置: {}", e);
                Self::default()
            }
        }
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let d = Self::default();
        let ai_settings = match obj.get("aiSettings") {
            Some(Value::Object(ai)) => AiSettings::from_object(ai),
            Some(_) => {
                warn!("aiSettings 字段格式错误，使用默认值");
                AiSettings::default()
            }
            None => AiSettings::default(),
        };

        Self {
            hide_my_answers: field(obj, "hideMyAnswers", d.hide_my_answers),
            include_timestamp: field(obj, "includeTimestamp", d.include_timestamp),
            show_explanation: field(obj, "showExplanation", d.show_explanation),
            dark_mode: field(obj, "darkMode", d.dark_mode),
            custom_title: field(obj, "customTitle", d.custom_title),
            animations_enabled: field(obj, "animationsEnabled", d.animations_enabled),
            ai_settings,
        }
    }

    /// 从文件读取设置，文件不存在时返回默认设置
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => {
                debug!("读取设置文件: {}", path.display());
                Self::from_json(&raw)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("设置文件不存在，使用默认设置: {}", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("读取设置文件失败 {}: {}，使用默认设置", path.display(), e);
                Self::default()
            }
        }
    }

    /// 保存全部设置
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| SettingsError::SaveFailed {
                path: path.display().to_string(),
                source,
            })?;
        debug!("设置已保存: {}", path.display());
        Ok(())
    }
}

impl AiSettings {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let d = Self::default();
        let custom_prompts = match obj.get("customPrompts") {
            Some(Value::Object(p)) => CustomPrompts {
                math: prompt_field(p, "math", d.custom_prompts.math),
                english: prompt_field(p, "english", d.custom_prompts.english),
                science: prompt_field(p, "science", d.custom_prompts.science),
            },
            _ => CustomPrompts::default(),
        };

        Self {
            api_type: field(obj, "apiType", d.api_type),
            api_key: field(obj, "apiKey", d.api_key),
            temperature: temperature_field(obj.get("temperature"), d.temperature),
            default_prompt: prompt_field(obj, "defaultPrompt", d.default_prompt),
            custom_prompts,
            show_in_toolbox: field(obj, "showInToolbox", d.show_in_toolbox),
        }
    }
}

fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str, default: T) -> T {
    match obj.get(key) {
        None | Some(Value::Null) => default,
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            warn!("设置字段 {} 无效 ({})，使用默认值", key, e);
            default
        }),
    }
}

/// 提示词为空字符串时同样回退到默认模板
fn prompt_field(obj: &Map<String, Value>, key: &str, default: String) -> String {
    let value: String = field(obj, key, default.clone());
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// 温度既可能是数字也可能是字符串
fn temperature_field(value: Option<&Value>, default: f32) -> f32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as f32),
        Some(Value::String(s)) => s.trim().parse::<f32>().ok(),
        _ => None,
    };
    match parsed {
        Some(t) if t.is_finite() && t != 0.0 => t,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_custom_prompts_yield_defaults() {
        let raw = r#"{"hideMyAnswers": true, "aiSettings": {"apiType": "gemini", "apiKey": "k"}}"#;
        let settings = Settings::from_json(raw);

        assert!(settings.hide_my_answers);
        assert_eq!(settings.ai_settings.api_type, ApiProvider::Gemini);
        let prompts = &settings.ai_settings.custom_prompts;
        assert!(!prompts.math.is_empty());
        assert!(!prompts.english.is_empty());
        assert!(!prompts.science.is_empty());
        assert_eq!(prompts, &CustomPrompts::default());
    }

    #[test]
    fn test_corrupt_fields_fall_back_individually() {
        let raw = r#"{
            "hideMyAnswers": "yes",
            "includeTimestamp": false,
            "customTitle": 42,
            "aiSettings": {"apiType": "unknown", "temperature": "0.3", "customPrompts": {"math": ""}}
        }"#;
        let settings = Settings::from_json(raw);

        assert!(!settings.hide_my_answers);
        assert!(!settings.include_timestamp);
        assert_eq!(settings.custom_title, "");
        assert_eq!(settings.ai_settings.api_type, ApiProvider::OpenAi);
        assert!((settings.ai_settings.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(settings.ai_settings.custom_prompts.math, MATH_PROMPT);
    }

    #[test]
    fn test_unparseable_blob_uses_defaults() {
        assert_eq!(Settings::from_json("{not json"), Settings::default());
        assert_eq!(Settings::from_json("[1,2]"), Settings::default());
    }

    #[test]
    fn test_serialized_shape_round_trips_through_loader() {
        let mut settings = Settings::default();
        settings.custom_title = "期末复习".to_string();
        settings.ai_settings.api_type = ApiProvider::DeepSeek;

        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"customTitle\""));
        assert!(json.contains("\"deepseek\""));
        assert_eq!(Settings::from_json(&json), settings);
    }

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let path = std::env::temp_dir().join("quiz_export_missing_settings_file.json");
        let _ = std::fs::remove_file(&path);
        assert_eq!(Settings::load(&path).await, Settings::default());
    }
}
