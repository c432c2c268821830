//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ATTIRE__*` 覆盖（双下划线表示嵌套，如 `ATTIRE__LLM__PROVIDER=mock`）。
//! 凭据不放在 TOML 中，只从普通环境变量读取（见 [`Credentials`]）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::AgentError;
use crate::memory::MemoryBankSettings;
use crate::weather::TemperatureUnits;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub weather: WeatherSection,
    pub calendar: CalendarSection,
    pub memory: MemorySection,
    pub metrics: MetricsSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// preferences.json 所在目录
    pub data_dir: PathBuf,
    pub default_location: String,
    /// recommend 未指定城市时是否先尝试 IP 定位
    pub detect_location: bool,
    /// metric / imperial
    pub units: String,
    /// 无法从日历取得邮箱时的 scope id
    pub user_id: Option<String>,
    pub log_level: String,
    pub log_file: PathBuf,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "attire".to_string(),
            data_dir: PathBuf::from("data"),
            default_location: "New York, NY".to_string(),
            detect_location: false,
            units: "metric".to_string(),
            user_id: None,
            log_level: "INFO".to_string(),
            log_file: PathBuf::from("logs/attire.log"),
        }
    }
}

impl AppSection {
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join("preferences.json")
    }

    pub fn temperature_units(&self) -> TemperatureUnits {
        TemperatureUnits::parse_lenient(&self.units)
    }
}

/// [llm] 段：后端选择、采样参数与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// gemini / openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 单次请求超时（秒）
    pub timeout: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            base_url: None,
            temperature: 0.7,
            max_tokens: 2000,
            timeout: 60,
        }
    }
}

/// [weather] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 10,
        }
    }
}

/// [calendar] 段：只读取已授权的 token 文件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    pub enabled: bool,
    pub token_path: PathBuf,
    pub api_base: Option<String>,
    pub userinfo_base: Option<String>,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            enabled: true,
            token_path: PathBuf::from("token.json"),
            api_base: None,
            userinfo_base: None,
        }
    }
}

/// [memory] 段：远端长期记忆；project / location / agent_engine_id 也可由环境变量提供
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    pub enabled: bool,
    pub project: Option<String>,
    pub location: Option<String>,
    pub agent_engine_id: Option<String>,
    pub base_url: Option<String>,
    pub sync_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            enabled: true,
            project: None,
            location: None,
            agent_engine_id: None,
            base_url: None,
            sync_timeout_secs: 5,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// 从 config 目录加载配置，环境变量 ATTIRE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ATTIRE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ATTIRE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

/// 环境变量中的凭据与云端标识
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openweather_api_key: Option<String>,
    pub gcp_project: Option<String>,
    pub gcp_location: Option<String>,
    pub agent_engine_id: Option<String>,
    pub gcp_access_token: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// 空字符串视为未设置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            google_api_key: get("GOOGLE_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            openweather_api_key: get("OPENWEATHER_API_KEY"),
            gcp_project: get("GOOGLE_CLOUD_PROJECT"),
            gcp_location: get("GOOGLE_CLOUD_LOCATION"),
            agent_engine_id: get("AGENT_ENGINE_ID"),
            gcp_access_token: get("GOOGLE_CLOUD_ACCESS_TOKEN"),
        }
    }

    /// 当前 provider 需要的 LLM Key 及其环境变量名；mock 不需要
    pub fn llm_key(&self, provider: &str) -> (Option<&str>, &'static str) {
        match provider {
            "openai" => (self.openai_api_key.as_deref(), "OPENAI_API_KEY"),
            "mock" => (None, ""),
            _ => (self.google_api_key.as_deref(), "GOOGLE_API_KEY"),
        }
    }
}

const REMEDIATION: &str = "Please set these in your environment (or a .env loaded by your shell). \
OPENWEATHER_API_KEY comes from https://openweathermap.org/api; \
GOOGLE_API_KEY from Google AI Studio. \
Set ATTIRE__LLM__PROVIDER=mock to run without an LLM key.";

impl AppConfig {
    /// 启动校验：缺少 LLM Key（provider 非 mock）或天气 Key 为致命错误
    pub fn validate(&self, creds: &Credentials) -> Result<(), AgentError> {
        let mut missing = Vec::new();
        if self.llm.provider != "mock" {
            let (key, var) = creds.llm_key(&self.llm.provider);
            if key.is_none() {
                missing.push(var.to_string());
            }
        }
        if creds.openweather_api_key.is_none() {
            missing.push("OPENWEATHER_API_KEY".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::MissingConfig {
                missing,
                remediation: REMEDIATION.to_string(),
            })
        }
    }

    /// 远端记忆连接参数；关闭或凭据不全时返回 None（不全时记 warning，降级为仅本地）
    pub fn memory_bank_settings(&self, creds: &Credentials) -> Option<MemoryBankSettings> {
        if !self.memory.enabled {
            tracing::info!("Remote memory disabled by configuration");
            return None;
        }
        let project = self.memory.project.clone().or_else(|| creds.gcp_project.clone());
        let engine = self
            .memory
            .agent_engine_id
            .clone()
            .or_else(|| creds.agent_engine_id.clone());
        let location = self
            .memory
            .location
            .clone()
            .or_else(|| creds.gcp_location.clone())
            .unwrap_or_else(|| "us-central1".to_string());
        let token = creds.gcp_access_token.clone();

        match (project, engine, token) {
            (Some(project), Some(agent_engine_id), Some(access_token)) => Some(MemoryBankSettings {
                project,
                location,
                agent_engine_id,
                access_token,
                base_url: self.memory.base_url.clone(),
                request_timeout_secs: self.memory.request_timeout_secs,
            }),
            (None, None, None) => {
                tracing::info!("Remote memory not configured, using local preferences only");
                None
            }
            (p, e, t) => {
                let mut absent = Vec::new();
                if p.is_none() {
                    absent.push("GOOGLE_CLOUD_PROJECT");
                }
                if e.is_none() {
                    absent.push("AGENT_ENGINE_ID");
                }
                if t.is_none() {
                    absent.push("GOOGLE_CLOUD_ACCESS_TOKEN");
                }
                tracing::warn!(
                    "Remote memory credentials incomplete (missing {}), \
                     using local preferences only",
                    absent.join(", ")
                );
                None
            }
        }
    }
}

/// 重新从磁盘与环境变量加载配置
pub fn reload_config() -> Result<AppConfig, config::ConfigError> {
    load_config(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn creds(pairs: &[(&str, &str)]) -> Credentials {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Credentials::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.default_location, "New York, NY");
        assert_eq!(cfg.app.preferences_path(), PathBuf::from("data/preferences.json"));
        assert_eq!(cfg.llm.model, "gemini-2.0-flash-exp");
        assert_eq!(cfg.llm.temperature, 0.7);
        assert_eq!(cfg.weather.timeout_secs, 10);
        assert_eq!(cfg.memory.sync_timeout_secs, 5);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[app]\nunits = \"imperial\"\n\n[llm]\nprovider = \"mock\"\ntemperature = 0.2\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.llm.temperature, 0.2);
        assert_eq!(cfg.app.temperature_units(), TemperatureUnits::Imperial);
    }

    #[test]
    fn test_validate_missing_keys() {
        let cfg = AppConfig::default();
        let err = cfg.validate(&creds(&[])).unwrap_err();
        match &err {
            AgentError::MissingConfig { missing, .. } => {
                assert_eq!(
                    missing,
                    &vec!["GOOGLE_API_KEY".to_string(), "OPENWEATHER_API_KEY".to_string()]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.remediation().is_some());

        assert!(cfg
            .validate(&creds(&[("GOOGLE_API_KEY", "g"), ("OPENWEATHER_API_KEY", "w")]))
            .is_ok());
    }

    #[test]
    fn test_validate_mock_provider_needs_only_weather_key() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        assert!(cfg.validate(&creds(&[("OPENWEATHER_API_KEY", "w")])).is_ok());
        assert!(cfg.validate(&creds(&[("OPENWEATHER_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_memory_bank_settings_resolution() {
        let cfg = AppConfig::default();
        assert!(cfg.memory_bank_settings(&creds(&[])).is_none());
        assert!(cfg
            .memory_bank_settings(&creds(&[("GOOGLE_CLOUD_PROJECT", "p")]))
            .is_none());

        let full = creds(&[
            ("GOOGLE_CLOUD_PROJECT", "p"),
            ("AGENT_ENGINE_ID", "42"),
            ("GOOGLE_CLOUD_ACCESS_TOKEN", "t"),
        ]);
        let settings = cfg.memory_bank_settings(&full).unwrap();
        assert_eq!(settings.location, "us-central1");
        assert_eq!(settings.engine_name(), "projects/p/locations/us-central1/reasoningEngines/42");

        let mut disabled = AppConfig::default();
        disabled.memory.enabled = false;
        assert!(disabled.memory_bank_settings(&full).is_none());
    }
}
