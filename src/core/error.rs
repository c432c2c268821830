//! 错误分类
//!
//! - 配置错误（缺少凭据）：启动即失败，附带补救说明
//! - 外部服务错误（天气 / 日历 / 远端记忆 / LLM）：在最近的边界捕获并降级
//! - 本地 I/O：读视为空，写只记日志（见 memory::local_store）
//!
//! 任何错误都不会自动重试。

use thiserror::Error;

use crate::calendar::CalendarError;
use crate::llm::LlmError;
use crate::memory::MemoryError;
use crate::weather::WeatherError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Missing required configuration: {}", missing.join(", "))]
    MissingConfig {
        missing: Vec<String>,
        remediation: String,
    },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl AgentError {
    /// 指标中的错误类别名
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::MissingConfig { .. } | AgentError::ConfigError(_) => "ConfigError",
            AgentError::Weather(_) => "WeatherError",
            AgentError::Calendar(_) => "CalendarError",
            AgentError::Memory(_) => "MemoryError",
            AgentError::Llm(_) => "LlmError",
        }
    }

    /// 面向操作者的提示（仅配置错误有补救说明）
    pub fn remediation(&self) -> Option<&str> {
        match self {
            AgentError::MissingConfig { remediation, .. } => Some(remediation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_message() {
        let err = AgentError::MissingConfig {
            missing: vec!["GOOGLE_API_KEY".into(), "OPENWEATHER_API_KEY".into()],
            remediation: "Set them in your environment".into(),
        };
        assert_eq!(
            err.to_string(),
            "Missing required configuration: GOOGLE_API_KEY, OPENWEATHER_API_KEY"
        );
        assert_eq!(err.kind(), "ConfigError");
        assert!(err.remediation().is_some());
    }

    #[test]
    fn test_weather_error_is_transparent() {
        let err: AgentError = WeatherError::InvalidApiKey.into();
        assert_eq!(err.to_string(), "Invalid API key");
        assert_eq!(err.kind(), "WeatherError");
    }
}
