pub mod subjects;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub use subjects::SubjectConfig;

pub const SETTINGS_PATH: &str = "config/settings.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub video: VideoConfig,
    pub ocr: OcrConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
}

/// 文本补全服务（DeepSeek 兼容接口）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    /// 题目分析使用更低的温度，输出更稳定
    pub analysis_temperature: f32,
    pub max_tokens: u32,
    /// 0 表示不设置超时
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    pub api_key: String,
    pub api_url: String,
    pub max_results: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OcrConfig {
    pub tesseract_path: String,
    pub pdftoppm_path: String,
    pub language: String,
    pub dpi: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub max_upload_bytes: u64,
    /// 启发式提取时合并重叠模式产生的重复题目
    pub dedupe_questions: bool,
    pub enrich_videos: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_path: String,
}

impl AppConfig {
    /// 默认值 < config/settings.toml < PYQBOT_* 环境变量
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&Self::default()).context("默认配置序列化失败")?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name(SETTINGS_PATH).required(false))
            .add_source(
                Environment::with_prefix("PYQBOT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("加载配置失败")?;

        let app_config: AppConfig = config.try_deserialize().context("配置格式错误")?;
        Ok(app_config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.storage.database_path)
    }
}

impl AiConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && self.api_key != "your-deepseek-api-key"
    }
}

impl VideoConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && self.api_key != "your-youtube-api-key"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai: AiConfig {
                api_key: String::new(),
                api_url: "https://api.deepseek.com/chat/completions".to_string(),
                model: "deepseek-chat".to_string(),
                temperature: 0.2,
                analysis_temperature: 0.1,
                max_tokens: 4000,
                timeout_secs: 0,
            },
            video: VideoConfig {
                api_key: String::new(),
                api_url: "https://www.googleapis.com/youtube/v3/search".to_string(),
                max_results: 3,
                timeout_secs: 0,
            },
            ocr: OcrConfig {
                tesseract_path: "tesseract".to_string(),
                pdftoppm_path: "pdftoppm".to_string(),
                language: "eng".to_string(),
                dpi: 300,
            },
            pipeline: PipelineConfig {
                max_upload_bytes: 10 * 1024 * 1024,
                dedupe_questions: true,
                enrich_videos: true,
            },
            storage: StorageConfig {
                database_path: "./data/questions.db".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.video.max_results, 3);
        assert_eq!(parsed.pipeline.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(parsed.ai.model, "deepseek-chat");
    }

    #[test]
    fn test_placeholder_keys_are_not_configured() {
        let mut config = AppConfig::default();
        assert!(!config.ai.is_configured());
        assert!(!config.video.is_configured());

        config.ai.api_key = "your-deepseek-api-key".to_string();
        assert!(!config.ai.is_configured());

        config.ai.api_key = "sk-123".to_string();
        assert!(config.ai.is_configured());
    }
}
