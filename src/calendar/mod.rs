//! 日历：今日事件读取（Google Calendar）与活动分类
//!
//! 只读取已授权的 token 文件，不做授权流程与刷新；任何失败由调用方降级为空列表。

pub mod activity;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use activity::{Activity, ActivityDetector, Formality, LocationType};

pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com";
pub const GOOGLE_USERINFO_BASE: &str = "https://www.googleapis.com";
pub const DEFAULT_TOKEN_PATH: &str = "token.json";

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Calendar token unavailable: {0}")]
    Token(String),

    #[error("Calendar request failed: {0}")]
    Http(String),

    #[error("Calendar API error: {status}")]
    Status { status: u16 },

    #[error("Calendar response decode failed: {0}")]
    Decode(String),
}

/// 今日的一个日历事件（已扁平化）
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub location: String,
    pub start: String,
    pub end: String,
}

impl CalendarEvent {
    pub fn new(
        summary: impl Into<String>,
        location: impl Into<String>,
        start: impl Into<String>,
    ) -> Self {
        Self {
            summary: summary.into(),
            location: location.into(),
            start: start.into(),
            end: String::new(),
        }
    }
}

#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn todays_events(&self) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// 已授权用户的邮箱；取不到时为 None
    async fn user_email(&self) -> Option<String>;
}

/// authorized-user token 文件中关心的字段
#[derive(Deserialize)]
struct TokenFile {
    token: Option<String>,
    access_token: Option<String>,
}

#[derive(Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Deserialize)]
struct ApiEvent {
    summary: Option<String>,
    location: Option<String>,
    #[serde(default)]
    start: ApiEventTime,
    #[serde(default)]
    end: ApiEventTime,
}

#[derive(Deserialize, Default)]
struct ApiEventTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

impl ApiEventTime {
    fn resolve(self) -> String {
        self.date_time.or(self.date).unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// Google Calendar v3 客户端（primary 日历）
pub struct GoogleCalendar {
    client: Client,
    access_token: String,
    api_base: String,
    userinfo_base: String,
}

impl GoogleCalendar {
    pub fn new(
        access_token: impl Into<String>,
        api_base: Option<&str>,
        userinfo_base: Option<&str>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            access_token: access_token.into(),
            api_base: api_base
                .unwrap_or(GOOGLE_CALENDAR_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            userinfo_base: userinfo_base
                .unwrap_or(GOOGLE_USERINFO_BASE)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// 从 token 文件构造；文件缺失、无法解析或没有 token 字段均为 CalendarError::Token
    pub fn from_token_file(
        path: &Path,
        api_base: Option<&str>,
        userinfo_base: Option<&str>,
    ) -> Result<Self, CalendarError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CalendarError::Token(format!("{}: {}", path.display(), e)))?;
        let token: TokenFile =
            serde_json::from_str(&raw).map_err(|e| CalendarError::Token(e.to_string()))?;
        let access_token = token
            .token
            .or(token.access_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CalendarError::Token("no access token in token file".to_string()))?;
        Ok(Self::new(access_token, api_base, userinfo_base))
    }

    /// 本地今日 00:00 与次日 00:00（RFC 3339）
    fn today_window() -> (String, String) {
        let today = Local::now().date_naive();
        let midnight = today.and_hms_opt(0, 0, 0).unwrap_or_default();
        let start = Local
            .from_local_datetime(&midnight)
            .earliest()
            .unwrap_or_else(Local::now);
        let end = start + chrono::Duration::days(1);
        (start.to_rfc3339(), end.to_rfc3339())
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendar {
    async fn todays_events(&self) -> Result<Vec<CalendarEvent>, CalendarError> {
        let (time_min, time_max) = Self::today_window();
        let url = format!("{}/calendar/v3/calendars/primary/events", self.api_base);
        tracing::debug!("API Call: Google Calendar → {} | {}..{}", url, time_min, time_max);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CalendarError::Status {
                status: resp.status().as_u16(),
            });
        }

        let body: EventsResponse = resp
            .json()
            .await
            .map_err(|e| CalendarError::Decode(e.to_string()))?;

        Ok(body
            .items
            .into_iter()
            .map(|item| CalendarEvent {
                summary: item.summary.unwrap_or_else(|| "Untitled Event".to_string()),
                location: item.location.unwrap_or_default(),
                start: item.start.resolve(),
                end: item.end.resolve(),
            })
            .collect())
    }

    async fn user_email(&self) -> Option<String> {
        let url = format!("{}/oauth2/v2/userinfo", self.userinfo_base);
        let resp = match self.client.get(&url).bearer_auth(&self.access_token).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Could not fetch user info: {}", e);
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!("User info API returned status {}", resp.status());
            return None;
        }
        match resp.json::<UserInfo>().await {
            Ok(info) => {
                if info.email.is_none() {
                    tracing::warn!("Email not found in user info response");
                }
                info.email.filter(|e| !e.is_empty())
            }
            Err(e) => {
                tracing::warn!("User info decode failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_todays_events_applies_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(header("authorization", "Bearer tok"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {
                        "summary": "Client Meeting",
                        "location": "Office",
                        "start": { "dateTime": "2026-10-14T09:00:00+08:00" },
                        "end": { "dateTime": "2026-10-14T10:00:00+08:00" }
                    },
                    {
                        "start": { "date": "2026-10-14" },
                        "end": { "date": "2026-10-15" }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let cal = GoogleCalendar::new("tok", Some(&server.uri()), Some(&server.uri()));
        let events = cal.todays_events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].summary, "Client Meeting");
        assert_eq!(events[0].start, "2026-10-14T09:00:00+08:00");
        assert_eq!(events[1].summary, "Untitled Event");
        assert_eq!(events[1].location, "");
        assert_eq!(events[1].start, "2026-10-14");
        assert_eq!(events[1].end, "2026-10-15");
    }

    #[tokio::test]
    async fn test_http_error_is_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let cal = GoogleCalendar::new("tok", Some(&server.uri()), Some(&server.uri()));
        let err = cal.todays_events().await.unwrap_err();
        assert!(matches!(err, CalendarError::Status { status: 403 }));
        assert_eq!(cal.user_email().await, None);
    }

    #[tokio::test]
    async fn test_user_email() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v2/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "email": "a@b.com" })))
            .mount(&server)
            .await;

        let cal = GoogleCalendar::new("tok", None, Some(&server.uri()));
        assert_eq!(cal.user_email().await.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_from_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("token.json");
        std::fs::write(&good, r#"{"token":"abc","refresh_token":"r"}"#).unwrap();
        assert!(GoogleCalendar::from_token_file(&good, None, None).is_ok());

        let alt = dir.path().join("alt.json");
        std::fs::write(&alt, r#"{"access_token":"abc"}"#).unwrap();
        assert!(GoogleCalendar::from_token_file(&alt, None, None).is_ok());

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, r#"{"refresh_token":"r"}"#).unwrap();
        assert!(matches!(
            GoogleCalendar::from_token_file(&empty, None, None),
            Err(CalendarError::Token(_))
        ));

        let missing = dir.path().join("missing.json");
        assert!(GoogleCalendar::from_token_file(&missing, None, None).is_err());
    }
}
