//! Agent 构建器：统一的 Agent 初始化逻辑
//!
//! TUI 与维护类二进制共用同一套解析：LLM 后端、天气、日历、远端记忆能力、scope id。
//! 所有 `with_*` 用于测试或嵌入时替换默认依赖。

use std::sync::Arc;
use std::time::Duration;

use crate::agent::{AgentSettings, OutfitAgent};
use crate::calendar::{CalendarSource, GoogleCalendar};
use crate::config::{AppConfig, Credentials};
use crate::core::AgentError;
use crate::llm::{create_gemini_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{LocalStore, MemoryBankClient, PreferenceStore, RemoteMemory};
use crate::observability::MetricsCollector;
use crate::weather::{WeatherFetcher, WeatherSource};

pub const DEFAULT_SCOPE_ID: &str = "default_user";

/// 根据配置与凭据选择 LLM 后端（Gemini / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(
    cfg: &AppConfig,
    creds: &Credentials,
) -> Result<Arc<dyn LlmClient>, AgentError> {
    let provider = cfg.llm.provider.to_lowercase();
    let base = cfg.llm.base_url.as_deref();
    match provider.as_str() {
        "mock" => {
            tracing::warn!("Using Mock LLM");
            Ok(Arc::new(MockLlmClient::new()))
        }
        "openai" => {
            let key = creds.openai_api_key.as_deref().ok_or_else(|| missing("OPENAI_API_KEY"))?;
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
            Ok(Arc::new(
                OpenAiClient::new(base, &cfg.llm.model, Some(key)).with_timeout(cfg.llm.timeout),
            ))
        }
        "gemini" => {
            let key = creds.google_api_key.as_deref().ok_or_else(|| missing("GOOGLE_API_KEY"))?;
            tracing::info!("Using Gemini LLM ({})", cfg.llm.model);
            Ok(Arc::new(
                create_gemini_client(key, Some(&cfg.llm.model), base).with_timeout(cfg.llm.timeout),
            ))
        }
        other => Err(AgentError::ConfigError(format!(
            "unknown llm.provider '{}' (expected gemini, openai or mock)",
            other
        ))),
    }
}

fn missing(var: &str) -> AgentError {
    AgentError::MissingConfig {
        missing: vec![var.to_string()],
        remediation: format!("Set {} in your environment.", var),
    }
}

/// Agent 构建器：统一配置和初始化 Agent 的各个组件
pub struct AgentBuilder {
    config: AppConfig,
    credentials: Credentials,
    metrics: Option<Arc<MetricsCollector>>,
    llm: Option<Arc<dyn LlmClient>>,
    weather: Option<Arc<dyn WeatherSource>>,
    calendar: Option<Option<Arc<dyn CalendarSource>>>,
    remote: Option<Option<Arc<dyn RemoteMemory>>>,
    scope_id: Option<String>,
}

impl AgentBuilder {
    pub fn new(config: AppConfig, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            metrics: None,
            llm: None,
            weather: None,
            calendar: None,
            remote: None,
            scope_id: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_weather(mut self, weather: Arc<dyn WeatherSource>) -> Self {
        self.weather = Some(weather);
        self
    }

    /// None 表示不接入日历
    pub fn with_calendar(mut self, calendar: Option<Arc<dyn CalendarSource>>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// None 表示仅本地
    pub fn with_remote_memory(mut self, remote: Option<Arc<dyn RemoteMemory>>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_scope_id(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    /// 启动时解析一次远端记忆能力；凭据不全或客户端构建失败时为 None
    pub fn resolve_remote_memory(&self) -> Option<Arc<dyn RemoteMemory>> {
        if let Some(remote) = &self.remote {
            return remote.clone();
        }
        let settings = self.config.memory_bank_settings(&self.credentials)?;
        match MemoryBankClient::new(&settings) {
            Ok(client) => {
                tracing::info!(engine = %settings.engine_name(), "Vertex AI Memory Bank connected");
                Some(Arc::new(client))
            }
            Err(e) => {
                tracing::warn!(
                    "Could not initialize Memory Bank, using local preferences only: {}",
                    e
                );
                None
            }
        }
    }

    /// 日历：关闭或 token 不可用时为 None
    pub fn resolve_calendar(&self) -> Option<Arc<dyn CalendarSource>> {
        if let Some(calendar) = &self.calendar {
            return calendar.clone();
        }
        let cal = &self.config.calendar;
        if !cal.enabled {
            return None;
        }
        match GoogleCalendar::from_token_file(
            &cal.token_path,
            cal.api_base.as_deref(),
            cal.userinfo_base.as_deref(),
        ) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!("Calendar disabled for this session: {}", e);
                None
            }
        }
    }

    /// scope id：日历邮箱 → app.user_id → default_user
    pub async fn resolve_scope_id(&self, calendar: Option<&Arc<dyn CalendarSource>>) -> String {
        if let Some(id) = &self.scope_id {
            return id.clone();
        }
        if let Some(cal) = calendar {
            if let Some(email) = cal.user_email().await {
                tracing::info!("Authenticated as: {}", email);
                return email;
            }
        }
        self.config
            .app
            .user_id
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| {
                tracing::info!("Using default user ID");
                DEFAULT_SCOPE_ID.to_string()
            })
    }

    /// 构建偏好存储（维护类二进制直接使用）
    pub async fn build_store(&self) -> PreferenceStore {
        let calendar = self.resolve_calendar();
        let scope_id = self.resolve_scope_id(calendar.as_ref()).await;
        self.store_for(scope_id)
    }

    fn store_for(&self, scope_id: String) -> PreferenceStore {
        PreferenceStore::new(
            LocalStore::new(self.config.app.preferences_path()),
            self.resolve_remote_memory(),
            scope_id,
        )
        .with_sync_timeout(Duration::from_secs(self.config.memory.sync_timeout_secs))
    }

    fn build_weather(&self) -> Result<Arc<dyn WeatherSource>, AgentError> {
        if let Some(weather) = &self.weather {
            return Ok(Arc::clone(weather));
        }
        let key = self
            .credentials
            .openweather_api_key
            .as_deref()
            .ok_or_else(|| missing("OPENWEATHER_API_KEY"))?;
        Ok(Arc::new(WeatherFetcher::new(
            key,
            self.config.weather.base_url.as_deref(),
            self.config.weather.timeout_secs,
        )))
    }

    pub async fn build(self) -> Result<OutfitAgent, AgentError> {
        let llm = match &self.llm {
            Some(llm) => Arc::clone(llm),
            None => create_llm_from_config(&self.config, &self.credentials)?,
        };
        let weather = self.build_weather()?;
        let calendar = self.resolve_calendar();
        let scope_id = self.resolve_scope_id(calendar.as_ref()).await;
        let store = self.store_for(scope_id);
        let metrics = self
            .metrics
            .clone()
            .unwrap_or_else(|| Arc::new(MetricsCollector::new()));
        let settings = AgentSettings {
            temperature: self.config.llm.temperature,
            max_tokens: (self.config.llm.max_tokens > 0).then_some(self.config.llm.max_tokens),
            units: self.config.app.temperature_units(),
        };
        tracing::info!(
            scope = %store.scope_id(),
            remote = store.has_remote(),
            calendar = calendar.is_some(),
            "Agent built"
        );
        Ok(OutfitAgent::new(llm, weather, calendar, store, metrics, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::calendar::{CalendarError, CalendarEvent};

    struct EmailCalendar(Option<&'static str>);

    #[async_trait]
    impl CalendarSource for EmailCalendar {
        async fn todays_events(&self) -> Result<Vec<CalendarEvent>, CalendarError> {
            Ok(Vec::new())
        }

        async fn user_email(&self) -> Option<String> {
            self.0.map(String::from)
        }
    }

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.app.data_dir = dir.to_path_buf();
        cfg.calendar.enabled = false;
        cfg
    }

    #[tokio::test]
    async fn test_scope_id_fallback_chain() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        let builder = AgentBuilder::new(cfg.clone(), Credentials::default());

        let with_email: Arc<dyn CalendarSource> = Arc::new(EmailCalendar(Some("me@example.com")));
        let without_email: Arc<dyn CalendarSource> = Arc::new(EmailCalendar(None));
        assert_eq!(builder.resolve_scope_id(Some(&with_email)).await, "me@example.com");
        assert_eq!(builder.resolve_scope_id(Some(&without_email)).await, DEFAULT_SCOPE_ID);
        assert_eq!(builder.resolve_scope_id(None).await, DEFAULT_SCOPE_ID);

        cfg.app.user_id = Some("alice".into());
        let builder = AgentBuilder::new(cfg, Credentials::default());
        assert_eq!(builder.resolve_scope_id(Some(&without_email)).await, "alice");
    }

    #[test]
    fn test_llm_provider_selection() {
        let mut cfg = AppConfig::default();
        let creds = Credentials::default();
        assert!(matches!(
            create_llm_from_config(&cfg, &creds),
            Err(AgentError::MissingConfig { .. })
        ));

        cfg.llm.provider = "Mock".into();
        assert_eq!(create_llm_from_config(&cfg, &creds).unwrap().name(), "Mock");

        cfg.llm.provider = "claude".into();
        assert!(matches!(
            create_llm_from_config(&cfg, &creds),
            Err(AgentError::ConfigError(_))
        ));

        cfg.llm.provider = "gemini".into();
        let creds = Credentials {
            google_api_key: Some("g".into()),
            ..Credentials::default()
        };
        assert_eq!(create_llm_from_config(&cfg, &creds).unwrap().name(), "Gemini");
    }

    #[test]
    fn test_remote_memory_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let builder = AgentBuilder::new(config_in(dir.path()), Credentials::default());
        assert!(builder.resolve_remote_memory().is_none());

        let creds = Credentials {
            gcp_project: Some("p".into()),
            agent_engine_id: Some("42".into()),
            gcp_access_token: Some("t".into()),
            ..Credentials::default()
        };
        let builder = AgentBuilder::new(config_in(dir.path()), creds);
        assert_eq!(
            builder.resolve_remote_memory().map(|r| r.name().to_string()),
            Some("vertex_ai_memory_bank".to_string())
        );
    }

    #[tokio::test]
    async fn test_build_requires_weather_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config_in(dir.path());
        cfg.llm.provider = "mock".into();
        let err = AgentBuilder::new(cfg.clone(), Credentials::default())
            .build()
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Missing required configuration: OPENWEATHER_API_KEY");

        let creds = Credentials {
            openweather_api_key: Some("w".into()),
            ..Credentials::default()
        };
        let agent = AgentBuilder::new(cfg, creds).build().await.unwrap();
        assert_eq!(agent.preferences().scope_id(), DEFAULT_SCOPE_ID);
        assert!(!agent.preferences().has_remote());
    }
}
