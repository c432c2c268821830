//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient::complete（非流式，单次调用，不重试）。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("Invalid LLM request: {0}")]
    InvalidRequest(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),
}

/// 单次完成的采样参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// 要求模型输出 JSON 对象
    pub json_response: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            json_response: false,
        }
    }
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        options: CompletionOptions,
    ) -> Result<String, LlmError>;

    /// 指标中记录的 API 名
    fn name(&self) -> &str {
        "LLM"
    }
}
