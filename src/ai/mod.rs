pub mod analyzer;
pub mod enhancer;

pub use analyzer::QuestionAnalyzer;
pub use enhancer::TextEnhancer;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::utils::{PyqError, PyqResult};

/// 文本补全服务。测试中用脚本化实现替换 HTTP 调用。
#[allow(async_fn_in_trait)]
pub trait CompletionClient {
    async fn complete(&self, system_prompt: &str, text: &str, temperature: f32) -> PyqResult<String>;
}

/// DeepSeek 兼容 chat/completions 请求体
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct ChatClient {
    client: reqwest::Client,
    config: AiConfig,
}

impl ChatClient {
    pub fn new(config: AiConfig) -> PyqResult<Self> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }

        let client = builder.build()?;
        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}

impl CompletionClient for ChatClient {
    /// 单次调用，不做重试
    async fn complete(&self, system_prompt: &str, text: &str, temperature: f32) -> PyqResult<String> {
        if !self.is_configured() {
            return Err(PyqError::MissingCredential("ai.api_key"));
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature,
            max_tokens: self.config.max_tokens,
        };

        debug!("请求补全服务: model={}, 输入 {} 字符", self.config.model, text.len());

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                warn!("补全服务拒绝了 API key，请检查 ai.api_key");
            }
            return Err(PyqError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let content = parse_completion(&body)?;
        info!("补全服务返回 {} 字符", content.len());
        Ok(content)
    }
}

/// 取 `choices[0].message.content`，缺失即视为错误
fn parse_completion(body: &str) -> PyqResult<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| PyqError::ParseError(format!("补全响应不是合法JSON: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| PyqError::ParseError("补全响应缺少 choices[0].message.content".to_string()))
}

/// 去掉模型常加的 Markdown 代码块标记
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}
