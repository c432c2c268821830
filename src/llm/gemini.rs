//! Gemini 客户端（OpenAI 兼容端点）
//!
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai/
//! - API Key: `GOOGLE_API_KEY`

use crate::llm::OpenAiClient;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// 创建 Gemini 客户端；model 为 None 时使用 `GEMINI_MODEL` 环境变量或默认模型
pub fn create_gemini_client(
    api_key: &str,
    model: Option<&str>,
    base_url: Option<&str>,
) -> OpenAiClient {
    let model = model
        .map(String::from)
        .or_else(|| std::env::var("GEMINI_MODEL").ok())
        .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string());

    OpenAiClient::new(Some(base_url.unwrap_or(GEMINI_BASE_URL)), &model, Some(api_key))
        .with_name("Gemini")
}
