//! 穿搭推荐 Agent
//!
//! recommend：并发获取天气与今日日程，拼接偏好上下文后交给 LLM 生成建议；
//! chat：用 LLM 判断消息是否表达偏好，是则写入偏好存储（本地同步写入，远端后台写入）。
//! 所有外部依赖以 trait 对象注入，请求与组件调用记录在注入的 MetricsCollector 上。

pub mod chat;
pub mod context;
pub mod prompts;

use std::sync::Arc;

use futures_util::future::join;
use tracing::Instrument;

use crate::calendar::{Activity, ActivityDetector, CalendarSource};
use crate::core::AgentError;
use crate::llm::{CompletionOptions, LlmClient};
use crate::memory::{Message, PreferenceStore, SyncReport, AUTO_KEY_PREFIX};
use crate::observability::{trace_component, MetricsCollector, RequestTrace};
use crate::weather::{TemperatureUnits, WeatherSource};

pub use chat::{parse_extraction, Extraction};
pub use context::build_context;

pub const GENERIC_CHAT_REPLY: &str = "I'm here to help with outfit recommendations! \
Ask for recommendations or tell me your preferences.";

const EXTRACTION_TEMPERATURE: f32 = 0.3;

/// 推荐调用参数（来自 [llm] / [app] 配置）
#[derive(Clone, Copy, Debug)]
pub struct AgentSettings {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub units: TemperatureUnits,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: None,
            units: TemperatureUnits::Metric,
        }
    }
}

pub struct OutfitAgent {
    llm: Arc<dyn LlmClient>,
    weather: Arc<dyn WeatherSource>,
    calendar: Option<Arc<dyn CalendarSource>>,
    store: PreferenceStore,
    metrics: Arc<MetricsCollector>,
    settings: AgentSettings,
}

impl OutfitAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        weather: Arc<dyn WeatherSource>,
        calendar: Option<Arc<dyn CalendarSource>>,
        store: PreferenceStore,
        metrics: Arc<MetricsCollector>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            llm,
            weather,
            calendar,
            store,
            metrics,
            settings,
        }
    }

    /// 会话开始时调用一次：从远端记忆合并偏好
    pub async fn initialize(&mut self) -> SyncReport {
        self.sync_preferences().await
    }

    /// 重新拉取远端偏好（`sync` 命令）
    pub async fn sync_preferences(&mut self) -> SyncReport {
        if self.store.has_remote() {
            self.metrics.record_api_call("Memory Bank");
        }
        let report = self.store.sync().await;
        if report.failed() {
            self.metrics.record_error("MemoryError");
        } else {
            self.metrics.record_component_call("PreferenceAgent");
        }
        report
    }

    pub async fn recommend(&self, location: &str, units: TemperatureUnits) -> String {
        let trace = RequestTrace::start(
            "recommendation",
            &format!("location={} units={}", location, units.as_api_str()),
            &self.metrics,
        );
        match self.recommend_inner(location, units).instrument(trace.span()).await {
            Ok(text) => {
                trace.succeed();
                text
            }
            Err(e) => {
                trace.fail(e.kind(), &e);
                match e {
                    AgentError::Weather(w) => format!("Unable to fetch weather: {}", w),
                    other => format!("Error generating recommendation: {}", other),
                }
            }
        }
    }

    async fn recommend_inner(
        &self,
        location: &str,
        units: TemperatureUnits,
    ) -> Result<String, AgentError> {
        let metrics = &self.metrics;
        let weather_fut = trace_component("WeatherAgent", metrics, async {
            metrics.record_api_call("OpenWeather");
            self.weather.get_weather(location, units).await
        });
        let (weather, activities) = join(weather_fut, self.todays_activities()).await;
        let weather = weather?;

        let preferences = self.store.list();
        metrics.record_component_call("PreferenceAgent");
        let context = build_context(&weather, &activities, &preferences, self.store.source());
        tracing::debug!(
            activities = activities.len(),
            preferences = preferences.len(),
            "Recommendation context built"
        );

        let messages = [
            Message::system(prompts::RECOMMENDATION_SYSTEM),
            Message::user(prompts::recommendation_prompt(&context)),
        ];
        let mut options = CompletionOptions::default().with_temperature(self.settings.temperature);
        if let Some(max_tokens) = self.settings.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        let text = trace_component("RecommendationAgent", metrics, async {
            metrics.record_api_call(self.llm.name());
            self.llm.complete(&messages, options).await
        })
        .await?;
        Ok(text)
    }

    /// 日历不可用或失败时为空
    async fn todays_activities(&self) -> Vec<Activity> {
        let Some(calendar) = &self.calendar else {
            return Vec::new();
        };
        let metrics = &self.metrics;
        let events = trace_component("ActivityAgent", metrics, async {
            metrics.record_api_call("Google Calendar");
            calendar.todays_events().await
        })
        .await;
        match events {
            Ok(events) => events.iter().map(ActivityDetector::analyze_event).collect(),
            Err(e) => {
                tracing::warn!("Calendar unavailable, continuing without activities: {}", e);
                metrics.record_error("CalendarError");
                Vec::new()
            }
        }
    }

    pub async fn chat(&mut self, message: &str) -> String {
        let detail = format!("chars={}", message.chars().count());
        let trace = RequestTrace::start("chat", &detail, &self.metrics);
        let span = trace.span();
        match self.chat_inner(message).instrument(span).await {
            Ok(reply) => {
                trace.succeed();
                reply
            }
            Err(e) => {
                trace.fail(e.kind(), &e);
                format!("Error: {}", e)
            }
        }
    }

    async fn chat_inner(&mut self, message: &str) -> Result<String, AgentError> {
        let options = CompletionOptions::default()
            .with_temperature(EXTRACTION_TEMPERATURE)
            .json();
        let messages = [Message::user(prompts::extraction_prompt(message))];
        self.metrics.record_api_call(self.llm.name());
        let raw = self.llm.complete(&messages, options).await?;

        let extraction = parse_extraction(&raw);
        match extraction.preference() {
            Some(pref) => {
                let pref = pref.to_string();
                self.save_preference(&pref);
                Ok(format!(
                    "✅ Saved preference: \"{}\"\nThis will be used in future recommendations.",
                    pref
                ))
            }
            None => Ok(GENERIC_CHAT_REPLY.to_string()),
        }
    }

    /// 以自动 key 写入本地，远端写入在后台执行；返回使用的 key
    pub fn save_preference(&mut self, value: &str) -> String {
        let key = self.store.add(AUTO_KEY_PREFIX, value);
        tracing::info!(key = %key, "Preference saved locally");
        if let Some(write) = self.store.remote_write(value) {
            self.metrics.record_api_call("Memory Bank");
            tokio::spawn(write.run());
        }
        key
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.store
    }

    pub fn preferences_mut(&mut self) -> &mut PreferenceStore {
        &mut self.store
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn settings(&self) -> AgentSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::calendar::{CalendarError, CalendarEvent};
    use crate::llm::{LlmError, MockLlmClient};
    use crate::memory::{InMemoryRemoteMemory, LocalStore, RemoteMemory, SourceAttribution};
    use crate::weather::{WeatherError, WeatherReport};

    struct FixedWeather(Result<WeatherReport, WeatherError>);

    #[async_trait]
    impl WeatherSource for FixedWeather {
        async fn get_weather(
            &self,
            _city: &str,
            _units: TemperatureUnits,
        ) -> Result<WeatherReport, WeatherError> {
            self.0.clone()
        }
    }

    struct FixedCalendar(Option<Vec<CalendarEvent>>);

    #[async_trait]
    impl CalendarSource for FixedCalendar {
        async fn todays_events(&self) -> Result<Vec<CalendarEvent>, CalendarError> {
            self.0
                .clone()
                .ok_or_else(|| CalendarError::Status { status: 401 })
        }

        async fn user_email(&self) -> Option<String> {
            None
        }
    }

    fn report() -> WeatherReport {
        WeatherReport {
            city: "Manila".into(),
            country: "PH".into(),
            temperature: 28.0,
            feels_like: 31.0,
            conditions: "Clear".into(),
            description: "clear sky".into(),
            humidity: 70.0,
            wind_speed: 3.0,
            wind_direction: None,
            units: "C".into(),
        }
    }

    struct Fixture {
        agent: OutfitAgent,
        llm: Arc<MockLlmClient>,
        remote: Arc<InMemoryRemoteMemory>,
        _dir: tempfile::TempDir,
    }

    fn fixture(
        weather: Result<WeatherReport, WeatherError>,
        events: Option<Vec<CalendarEvent>>,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new());
        let remote = Arc::new(InMemoryRemoteMemory::new(10));
        let remote_dyn: Arc<dyn RemoteMemory> = remote.clone();
        let store = PreferenceStore::new(
            LocalStore::new(dir.path().join("preferences.json")),
            Some(remote_dyn),
            "user@example.com",
        );
        let agent = OutfitAgent::new(
            llm.clone(),
            Arc::new(FixedWeather(weather)),
            Some(Arc::new(FixedCalendar(events))),
            store,
            Arc::new(MetricsCollector::new()),
            AgentSettings::default(),
        );
        Fixture {
            agent,
            llm,
            remote,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_recommend_builds_context_and_records_metrics() {
        let f = fixture(
            Ok(report()),
            Some(vec![CalendarEvent::new("Client Meeting", "Office", "09:00")]),
        );
        f.llm.push_reply("For your client meeting in 28°C clear weather: ...");

        let text = f.agent.recommend("Manila", TemperatureUnits::Metric).await;
        assert!(text.starts_with("For your client meeting"));

        let requests = f.llm.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[1].content;
        assert!(prompt.contains("- Temperature: 28°C"));
        assert!(prompt.contains("### Activity 1: Client Meeting"));
        assert!(prompt.contains("- Formality: formal"));
        assert!(prompt.contains("No preferences set yet"));
        assert_eq!(requests[0].options.temperature, 0.7);

        let snap = f.agent.metrics().snapshot();
        assert_eq!(snap.successful_requests, 1);
        assert_eq!(snap.component_calls.get("WeatherAgent"), Some(&1));
        assert_eq!(snap.component_calls.get("ActivityAgent"), Some(&1));
        assert_eq!(snap.api_calls.get("Mock"), Some(&1));
    }

    #[tokio::test]
    async fn test_recommend_weather_failure() {
        let f = fixture(Err(WeatherError::CityNotFound("Atlantis".into())), Some(vec![]));
        let text = f.agent.recommend("Atlantis", TemperatureUnits::Metric).await;
        assert_eq!(text, "Unable to fetch weather: City 'Atlantis' not found");
        assert!(f.llm.requests().is_empty());
        assert_eq!(f.agent.metrics().snapshot().errors.get("WeatherError"), Some(&1));
    }

    #[tokio::test]
    async fn test_recommend_calendar_failure_degrades() {
        let f = fixture(Ok(report()), None);
        f.llm.push_reply("ok");
        assert_eq!(f.agent.recommend("Manila", TemperatureUnits::Metric).await, "ok");
        let prompt = &f.llm.requests()[0].messages[1].content;
        assert!(prompt.contains("No specific activities scheduled"));
    }

    #[tokio::test]
    async fn test_recommend_llm_failure() {
        let f = fixture(Ok(report()), Some(vec![]));
        f.llm.push_error(LlmError::Request("quota exceeded".into()));
        let text = f.agent.recommend("Manila", TemperatureUnits::Metric).await;
        assert_eq!(
            text,
            "Error generating recommendation: LLM request failed: quota exceeded"
        );
    }

    #[tokio::test]
    async fn test_chat_saves_preference_locally_and_remotely() {
        let mut f = fixture(Ok(report()), Some(vec![]));
        f.llm
            .push_reply(r#"{"is_preference": true, "preference": "dislikes shorts"}"#);

        let reply = f.agent.chat("I don't like shorts").await;
        assert_eq!(
            reply,
            "✅ Saved preference: \"dislikes shorts\"\nThis will be used in future recommendations."
        );
        assert_eq!(f.agent.preferences().all().get("pref_1"), Some("dislikes shorts"));

        let req = &f.llm.requests()[0];
        assert!(req.options.json_response);
        assert_eq!(req.options.temperature, 0.3);

        for _ in 0..50 {
            if f.remote.write_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(f.remote.write_count(), 1);
    }

    #[tokio::test]
    async fn test_chat_non_preference_and_errors() {
        let mut f = fixture(Ok(report()), Some(vec![]));
        f.llm.push_reply(r#"{"is_preference": false, "preference": null}"#);
        f.llm.push_reply("not json at all");
        f.llm.push_error(LlmError::EmptyResponse);

        assert_eq!(f.agent.chat("What should I wear?").await, GENERIC_CHAT_REPLY);
        assert_eq!(f.agent.chat("hello").await, GENERIC_CHAT_REPLY);
        assert_eq!(
            f.agent.chat("hi").await,
            "Error: LLM returned an empty response"
        );
        assert!(f.agent.preferences().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_merges_remote_preferences() {
        let mut f = fixture(Ok(report()), Some(vec![]));
        f.remote.seed("user@example.com", "User prefers casual style on weekends");

        let report = f.agent.initialize().await;
        assert_eq!(report.accepted, 1);
        assert_eq!(f.agent.preferences().source(), SourceAttribution::RemoteMemory);

        f.llm.push_reply("ok");
        f.agent.recommend("Manila", TemperatureUnits::Metric).await;
        let prompt = &f.llm.requests()[0].messages[1].content;
        assert!(prompt.contains("(Loaded from: ☁️ Cloud (Vertex AI))"));
        assert!(prompt.contains("- User prefers casual style on weekends"));
    }
}
